//! The device-specific vendor register bank, addresses `[0x1000, 0x10C4]`
//! (`spec.md` §3, §6; concrete offsets resolved in `SPEC_FULL.md` §3).

use std::collections::HashMap;

/// Start of the vendor register range.
pub const RANGE_START: u32 = 0x1000;
/// Inclusive end of the vendor register range.
pub const RANGE_END: u32 = 0x10C4;

/// Offsets of every enumerated vendor register.
pub mod offset {
    pub const ACQUISITION_START: u32 = 0x1000;
    pub const ACQUISITION_STOP: u32 = 0x1004;
    pub const PIXEL_FORMAT: u32 = 0x1008;
    pub const EXPOSURE_TIME_US: u32 = 0x100C;
    pub const GEV_SCDA: u32 = 0x1010;
    pub const GEV_SCP: u32 = 0x1014;
    pub const GEV_SCPS: u32 = 0x1018;
    pub const GEV_SCPD: u32 = 0x101C;
    pub const DISCOVERY_BROADCAST_ENABLE: u32 = 0x1020;
    pub const DISCOVERY_BROADCAST_INTERVAL_MS: u32 = 0x1024;
    pub const GEV_TIMESTAMP_CONTROL_LATCH: u32 = 0x1028;
    pub const GEV_TIMESTAMP_VALUE_HIGH: u32 = 0x102C;
    pub const GEV_TIMESTAMP_VALUE_LOW: u32 = 0x1030;

    pub const STAT_TOTAL_COMMANDS: u32 = 0x1040;
    pub const STAT_TOTAL_ERRORS: u32 = 0x1044;
    pub const STAT_UNKNOWN_COMMANDS: u32 = 0x1048;
    pub const STAT_PACKETS_SENT: u32 = 0x104C;
    pub const STAT_PACKET_ERRORS: u32 = 0x1050;
    pub const STAT_FRAMES_SENT: u32 = 0x1054;
    pub const STAT_FRAME_ERRORS: u32 = 0x1058;
    pub const STAT_OUT_OF_ORDER_FRAMES: u32 = 0x105C;
    pub const STAT_LOST_FRAMES: u32 = 0x1060;
    pub const STAT_DUPLICATE_FRAMES: u32 = 0x1064;
    pub const STAT_CONNECTION_FAILURES: u32 = 0x1068;
    pub const STAT_CONNECTION_STATUS: u32 = 0x106C;

    pub const DISCOVERY_BROADCASTS_SENT: u32 = 0x1070;
    pub const DISCOVERY_BROADCAST_FAILURES: u32 = 0x1074;
    pub const DISCOVERY_SEQUENCE_NUMBER: u32 = 0x1078;
    pub const DISCOVERY_LAST_BROADCAST_TIME_MS: u32 = 0x107C;
}

/// Registers the wire protocol may never write, even inside the vendor
/// range: statistics counters and status reflectors (`spec.md` §4.2).
const READ_ONLY: &[u32] = &[
    offset::GEV_TIMESTAMP_VALUE_HIGH,
    offset::GEV_TIMESTAMP_VALUE_LOW,
    offset::STAT_TOTAL_COMMANDS,
    offset::STAT_TOTAL_ERRORS,
    offset::STAT_UNKNOWN_COMMANDS,
    offset::STAT_PACKETS_SENT,
    offset::STAT_PACKET_ERRORS,
    offset::STAT_FRAMES_SENT,
    offset::STAT_FRAME_ERRORS,
    offset::STAT_OUT_OF_ORDER_FRAMES,
    offset::STAT_LOST_FRAMES,
    offset::STAT_DUPLICATE_FRAMES,
    offset::STAT_CONNECTION_FAILURES,
    offset::STAT_CONNECTION_STATUS,
    offset::DISCOVERY_BROADCASTS_SENT,
    offset::DISCOVERY_BROADCAST_FAILURES,
    offset::DISCOVERY_SEQUENCE_NUMBER,
    offset::DISCOVERY_LAST_BROADCAST_TIME_MS,
];

/// All enumerated register offsets, in ascending order.
const ALL: &[u32] = &[
    offset::ACQUISITION_START,
    offset::ACQUISITION_STOP,
    offset::PIXEL_FORMAT,
    offset::EXPOSURE_TIME_US,
    offset::GEV_SCDA,
    offset::GEV_SCP,
    offset::GEV_SCPS,
    offset::GEV_SCPD,
    offset::DISCOVERY_BROADCAST_ENABLE,
    offset::DISCOVERY_BROADCAST_INTERVAL_MS,
    offset::GEV_TIMESTAMP_CONTROL_LATCH,
    offset::GEV_TIMESTAMP_VALUE_HIGH,
    offset::GEV_TIMESTAMP_VALUE_LOW,
    offset::STAT_TOTAL_COMMANDS,
    offset::STAT_TOTAL_ERRORS,
    offset::STAT_UNKNOWN_COMMANDS,
    offset::STAT_PACKETS_SENT,
    offset::STAT_PACKET_ERRORS,
    offset::STAT_FRAMES_SENT,
    offset::STAT_FRAME_ERRORS,
    offset::STAT_OUT_OF_ORDER_FRAMES,
    offset::STAT_LOST_FRAMES,
    offset::STAT_DUPLICATE_FRAMES,
    offset::STAT_CONNECTION_FAILURES,
    offset::STAT_CONNECTION_STATUS,
    offset::DISCOVERY_BROADCASTS_SENT,
    offset::DISCOVERY_BROADCAST_FAILURES,
    offset::DISCOVERY_SEQUENCE_NUMBER,
    offset::DISCOVERY_LAST_BROADCAST_TIME_MS,
];

/// Sparse address-indexed device-specific register bank.
#[derive(Debug, Clone)]
pub struct VendorBank {
    cells: HashMap<u32, u32>,
}

impl Default for VendorBank {
    fn default() -> Self {
        let cells = ALL.iter().map(|&addr| (addr, 0u32)).collect();
        Self { cells }
    }
}

impl VendorBank {
    /// Whether `addr` is one of the enumerated vendor cells.
    pub fn is_known(addr: u32) -> bool {
        ALL.contains(&addr)
    }

    /// Whether `addr` is writable from the wire.
    pub fn is_writable(addr: u32) -> bool {
        Self::is_known(addr) && !READ_ONLY.contains(&addr)
    }

    /// Read a cell's current value, host byte order.
    pub fn read_u32(&self, addr: u32) -> Option<u32> {
        self.cells.get(&addr).copied()
    }

    /// Overwrite a cell unconditionally (used internally for read-only
    /// reflectors such as statistics; wire writes must check
    /// [`VendorBank::is_writable`] first).
    pub fn set_u32(&mut self, addr: u32, value: u32) -> Option<()> {
        if !Self::is_known(addr) {
            return None;
        }
        self.cells.insert(addr, value);
        Some(())
    }
}
