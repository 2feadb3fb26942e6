//! Protocol and discovery statistics (`spec.md` §3).
//!
//! Follows the atomic-counter-with-snapshot pattern used throughout the
//! reference workspace's `tl_gige::stats` module: `AtomicU64`/`AtomicU32`
//! fields updated with `Ordering::Relaxed`, read out through an immutable
//! snapshot struct. This lets a secondary streaming thread update
//! `frames_sent`/`packet_errors` without a lock, per `spec.md` §5.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Bit within `connection_status` set once the GVCP socket is bound.
pub const STATUS_GVCP_SOCKET: u32 = 1 << 0;
/// Bit within `connection_status` set once the GVSP socket is bound.
pub const STATUS_GVSP_SOCKET: u32 = 1 << 1;
/// Bit within `connection_status` set once a client is connected.
pub const STATUS_CLIENT_CONNECTED: u32 = 1 << 2;
/// Bit within `connection_status` set while actively streaming.
pub const STATUS_STREAMING: u32 = 1 << 3;

/// Monotonically non-decreasing protocol counters.
#[derive(Debug, Default)]
pub struct Statistics {
    pub total_commands: AtomicU64,
    pub total_errors: AtomicU64,
    pub unknown_commands: AtomicU64,
    pub packets_sent: AtomicU64,
    pub packet_errors: AtomicU64,
    pub frames_sent: AtomicU64,
    pub frame_errors: AtomicU64,
    pub out_of_order_frames: AtomicU64,
    pub lost_frames: AtomicU64,
    pub duplicate_frames: AtomicU64,
    pub connection_failures: AtomicU64,
    pub connection_status: AtomicU32,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_command(&self) {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_command(&self) {
        self.unknown_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_error(&self) {
        self.packet_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_status_bit(&self, bit: u32) {
        self.connection_status.fetch_or(bit, Ordering::Relaxed);
    }

    pub fn clear_status_bit(&self, bit: u32) {
        self.connection_status.fetch_and(!bit, Ordering::Relaxed);
    }

    /// Copy every counter into the vendor bank's statistics cells
    /// (`spec.md` §6 vendor register map); the counters themselves stay
    /// the source of truth.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            total_commands: self.total_commands.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            unknown_commands: self.unknown_commands.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packet_errors: self.packet_errors.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            out_of_order_frames: self.out_of_order_frames.load(Ordering::Relaxed),
            lost_frames: self.lost_frames.load(Ordering::Relaxed),
            duplicate_frames: self.duplicate_frames.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            connection_status: self.connection_status.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of [`Statistics`], truncated to 32 bits per wire register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub total_commands: u64,
    pub total_errors: u64,
    pub unknown_commands: u64,
    pub packets_sent: u64,
    pub packet_errors: u64,
    pub frames_sent: u64,
    pub frame_errors: u64,
    pub out_of_order_frames: u64,
    pub lost_frames: u64,
    pub duplicate_frames: u64,
    pub connection_failures: u64,
    pub connection_status: u32,
}

/// Discovery-specific counters (`spec.md` §3 `DiscoveryStats`).
#[derive(Debug, Default)]
pub struct DiscoveryStats {
    pub broadcasts_sent: AtomicU64,
    pub broadcast_failures: AtomicU64,
    pub sequence_number: AtomicU32,
    pub last_broadcast_time_ms: AtomicU64,
}

impl DiscoveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the sequence number, wrapping to u16 per `spec.md` §4.3.
    pub fn next_sequence(&self) -> u16 {
        let next = self.sequence_number.fetch_add(1, Ordering::Relaxed);
        (next & 0xFFFF) as u16
    }

    pub fn record_broadcast(&self, now_ms: u64) {
        self.broadcasts_sent.fetch_add(1, Ordering::Relaxed);
        self.last_broadcast_time_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn record_failure(&self, now_ms: u64) {
        self.broadcast_failures.fetch_add(1, Ordering::Relaxed);
        self.last_broadcast_time_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiscoverySnapshot {
        DiscoverySnapshot {
            broadcasts_sent: self.broadcasts_sent.load(Ordering::Relaxed),
            broadcast_failures: self.broadcast_failures.load(Ordering::Relaxed),
            sequence_number: self.sequence_number.load(Ordering::Relaxed),
            last_broadcast_time_ms: self.last_broadcast_time_ms.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of [`DiscoveryStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySnapshot {
    pub broadcasts_sent: u64,
    pub broadcast_failures: u64,
    pub sequence_number: u32,
    pub last_broadcast_time_ms: u64,
}
