//! Translates a register address into the bootstrap/vendor/XML region it
//! belongs to, enforces alignment and write-protection, and performs the
//! byte-order conversions at the boundary (`spec.md` §4.2).

use std::net::Ipv4Addr;

use gvcp_wire::StatusCode;

use crate::bootstrap::{self, BootstrapBlock};
use crate::ccp::CcpState;
use crate::config::{ConfigError, DeviceIdentity, NetworkInfo};
use crate::vendor::{self, VendorBank};
use crate::xml::{self, XmlBlob};

/// Which region an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterClass {
    Bootstrap,
    Vendor,
    Xml,
    Invalid,
}

/// Classify an address per `spec.md` §3.
pub fn classify(addr: u32) -> RegisterClass {
    if (addr as usize) < bootstrap::SIZE {
        RegisterClass::Bootstrap
    } else if addr >= vendor::RANGE_START && addr <= vendor::RANGE_END {
        RegisterClass::Vendor
    } else if addr >= xml::BASE_ADDRESS && (addr as usize) < xml::BASE_ADDRESS as usize + xml::SIZE
    {
        RegisterClass::Xml
    } else {
        RegisterClass::Invalid
    }
}

/// A side effect triggered by a vendor register write, to be applied by the
/// engine against the collaborators it owns (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    None,
    TimestampLatch,
    StreamDestination(Ipv4Addr),
    DiscoveryEnable(bool),
    DiscoveryIntervalMs(u32),
    AcquisitionStart,
    AcquisitionStop,
}

const fn word_aligned(addr: u32) -> bool {
    addr % 4 == 0
}

/// READ_MEMORY's hard cap on `length`, per `spec.md` §4.1.
const MAX_READ_MEMORY_LEN: usize = 536;

/// Owns the exclusive read/write path to the register file.
pub struct RegisterRouter {
    bootstrap: BootstrapBlock,
    vendor: VendorBank,
    xml: XmlBlob,
    ccp: CcpState,
}

impl RegisterRouter {
    pub fn new(identity: &DeviceIdentity, network: &NetworkInfo) -> Self {
        Self {
            bootstrap: BootstrapBlock::new(identity, network),
            vendor: VendorBank::default(),
            xml: XmlBlob::standard_descriptor(),
            ccp: CcpState::default(),
        }
    }

    /// Re-derive the bootstrap block after new network info arrives
    /// (`spec.md` §3 lifecycle, §5 "single-writer queue").
    pub fn refresh_network_info(&mut self, identity: &DeviceIdentity, network: &NetworkInfo) {
        self.bootstrap.populate(identity, network);
    }

    pub fn bootstrap(&self) -> &BootstrapBlock {
        &self.bootstrap
    }

    pub fn ccp(&self) -> &CcpState {
        &self.ccp
    }

    pub fn vendor(&self) -> &VendorBank {
        &self.vendor
    }

    /// Mirror a statistics/discovery snapshot value into its read-only
    /// vendor cell so wire reads observe the current counters.
    pub fn reflect_vendor_u32(&mut self, addr: u32, value: u32) {
        self.vendor.set_u32(addr, value);
    }

    /// Read one 32-bit register in host byte order.
    pub fn read_u32(&self, addr: u32) -> Result<u32, StatusCode> {
        if !word_aligned(addr) {
            return Err(StatusCode::BadAlignment);
        }
        match classify(addr) {
            RegisterClass::Bootstrap => {
                if addr == bootstrap::offset::CCP {
                    Ok(self.ccp.privilege_raw())
                } else if addr == bootstrap::offset::CCP_KEY {
                    Ok(self.ccp.key())
                } else {
                    self.bootstrap
                        .read_u32(addr)
                        .ok_or(StatusCode::InvalidAddress)
                }
            }
            RegisterClass::Vendor => self.vendor.read_u32(addr).ok_or(StatusCode::InvalidAddress),
            RegisterClass::Xml => {
                let bytes = self
                    .xml
                    .read_bytes((addr - xml::BASE_ADDRESS) as usize, 4)
                    .ok_or(StatusCode::InvalidAddress)?;
                Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
            }
            RegisterClass::Invalid => Err(StatusCode::InvalidAddress),
        }
    }

    /// Validate that `addr` may be written without mutating anything or
    /// checking the value itself (CCP's value range is still enforced at
    /// apply time). Lets a caller pre-validate a whole WRITEREG/WRITE_MEMORY
    /// batch before any word in it is applied (`spec.md` §4.1 atomicity).
    pub fn validate_write(&self, addr: u32) -> Result<(), StatusCode> {
        if !word_aligned(addr) {
            return Err(StatusCode::BadAlignment);
        }
        match classify(addr) {
            RegisterClass::Bootstrap => {
                if addr == bootstrap::offset::CCP || addr == bootstrap::offset::CCP_KEY {
                    Ok(())
                } else if bootstrap::is_writable(addr) {
                    Ok(())
                } else {
                    Err(StatusCode::WriteProtect)
                }
            }
            RegisterClass::Vendor => {
                if !VendorBank::is_known(addr) {
                    Err(StatusCode::InvalidAddress)
                } else if !VendorBank::is_writable(addr) {
                    Err(StatusCode::WriteProtect)
                } else {
                    Ok(())
                }
            }
            RegisterClass::Xml => Err(StatusCode::WriteProtect),
            RegisterClass::Invalid => Err(StatusCode::InvalidAddress),
        }
    }

    /// Write one 32-bit register, returning any side effect the engine must
    /// apply to its collaborators.
    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<SideEffect, StatusCode> {
        if !word_aligned(addr) {
            return Err(StatusCode::BadAlignment);
        }
        match classify(addr) {
            RegisterClass::Bootstrap => self.write_bootstrap_u32(addr, value),
            RegisterClass::Vendor => self.write_vendor_u32(addr, value),
            RegisterClass::Xml => Err(StatusCode::WriteProtect),
            RegisterClass::Invalid => Err(StatusCode::InvalidAddress),
        }
    }

    fn write_bootstrap_u32(&mut self, addr: u32, value: u32) -> Result<SideEffect, StatusCode> {
        if addr == bootstrap::offset::CCP {
            return match self.ccp.set_privilege(value) {
                Ok(()) => Ok(SideEffect::None),
                Err(ConfigError::InvalidPrivilege(_)) => Err(StatusCode::InvalidParameter),
                Err(ConfigError::InvalidInterval) => unreachable!("CCP never yields this variant"),
            };
        }
        if addr == bootstrap::offset::CCP_KEY {
            self.ccp.set_key(value);
            return Ok(SideEffect::None);
        }
        if !bootstrap::is_writable(addr) {
            return Err(StatusCode::WriteProtect);
        }
        self.bootstrap
            .write_u32(addr, value)
            .ok_or(StatusCode::InvalidAddress)?;
        Ok(SideEffect::None)
    }

    fn write_vendor_u32(&mut self, addr: u32, value: u32) -> Result<SideEffect, StatusCode> {
        if !VendorBank::is_known(addr) {
            return Err(StatusCode::InvalidAddress);
        }
        if !VendorBank::is_writable(addr) {
            return Err(StatusCode::WriteProtect);
        }
        self.vendor.set_u32(addr, value);

        use vendor::offset as v;
        let effect = match addr {
            a if a == v::ACQUISITION_START => {
                if value == 1 {
                    SideEffect::AcquisitionStart
                } else {
                    SideEffect::None
                }
            }
            a if a == v::ACQUISITION_STOP => {
                if value == 1 {
                    SideEffect::AcquisitionStop
                } else {
                    SideEffect::None
                }
            }
            a if a == v::GEV_SCDA => SideEffect::StreamDestination(Ipv4Addr::from(value)),
            a if a == v::DISCOVERY_BROADCAST_ENABLE => SideEffect::DiscoveryEnable(value != 0),
            a if a == v::DISCOVERY_BROADCAST_INTERVAL_MS => {
                SideEffect::DiscoveryIntervalMs(value)
            }
            a if a == v::GEV_TIMESTAMP_CONTROL_LATCH => SideEffect::TimestampLatch,
            _ => SideEffect::None,
        };
        Ok(effect)
    }

    /// Apply a timestamp latch: snapshot `now_ms` into the two latched
    /// registers (`spec.md` §4.2).
    pub fn latch_timestamp(&mut self, now_ms: u64) {
        self.vendor
            .set_u32(vendor::offset::GEV_TIMESTAMP_VALUE_HIGH, (now_ms >> 32) as u32);
        self.vendor
            .set_u32(vendor::offset::GEV_TIMESTAMP_VALUE_LOW, now_ms as u32);
    }

    /// Read a block of memory. Permission rules match [`RegisterRouter::read_u32`];
    /// a range spanning two classification boundaries is rejected.
    pub fn read_memory(&self, addr: u32, len: usize) -> Result<Vec<u8>, StatusCode> {
        if !word_aligned(addr) || len % 4 != 0 {
            return Err(StatusCode::BadAlignment);
        }
        if len > MAX_READ_MEMORY_LEN {
            return Err(StatusCode::BadAlignment);
        }
        let end = addr
            .checked_add(len as u32)
            .ok_or(StatusCode::InvalidAddress)?;
        let last = end.saturating_sub(1).max(addr);
        if len > 0 && classify(addr) != classify(last) {
            return Err(StatusCode::InvalidAddress);
        }
        match classify(addr) {
            RegisterClass::Bootstrap => self
                .bootstrap
                .read_bytes(addr, len)
                .map(|s| s.to_vec())
                .ok_or(StatusCode::InvalidAddress),
            RegisterClass::Xml => self
                .xml
                .read_bytes((addr - xml::BASE_ADDRESS) as usize, len)
                .map(|s| s.to_vec())
                .ok_or(StatusCode::InvalidAddress),
            RegisterClass::Vendor => {
                let mut out = Vec::with_capacity(len);
                let mut cur = addr;
                while cur < end {
                    let word = self.vendor.read_u32(cur).ok_or(StatusCode::InvalidAddress)?;
                    out.extend_from_slice(&word.to_be_bytes());
                    cur += 4;
                }
                Ok(out)
            }
            RegisterClass::Invalid => Err(StatusCode::InvalidAddress),
        }
    }

    /// Write a block of memory. Bootstrap writes must land entirely within a
    /// writable sub-range (there is none wider than a scalar today, so this
    /// only accepts single-register-wide spans there); vendor writes go
    /// through the same permission checks as [`RegisterRouter::write_u32`].
    pub fn write_memory(&mut self, addr: u32, data: &[u8]) -> Result<Vec<SideEffect>, StatusCode> {
        if !word_aligned(addr) || data.len() % 4 != 0 || data.is_empty() {
            return Err(StatusCode::BadAlignment);
        }
        let end = addr
            .checked_add(data.len() as u32)
            .ok_or(StatusCode::InvalidAddress)?;
        let last = end - 1;
        if classify(addr) != classify(last) {
            return Err(StatusCode::InvalidAddress);
        }
        if classify(addr) == RegisterClass::Xml {
            return Err(StatusCode::WriteProtect);
        }

        // Validate every word up front so a partially-invalid request
        // leaves no partial write applied (mirrors WRITEREG's atomicity).
        let mut effects = Vec::with_capacity(data.len() / 4);
        for i in 0..data.len() / 4 {
            let word_addr = addr + (i as u32) * 4;
            self.validate_write(word_addr)?;
        }

        for (i, chunk) in data.chunks_exact(4).enumerate() {
            let word_addr = addr + (i as u32) * 4;
            let value = u32::from_be_bytes(chunk.try_into().unwrap());
            let effect = self.write_u32(word_addr, value)?;
            effects.push(effect);
        }
        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> RegisterRouter {
        let identity = DeviceIdentity::default();
        let network = NetworkInfo {
            mac: [1, 2, 3, 4, 5, 6],
            ip: Ipv4Addr::new(10, 0, 0, 5),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(10, 0, 0, 1),
        };
        RegisterRouter::new(&identity, &network)
    }

    #[test]
    fn classify_covers_all_regions() {
        assert_eq!(classify(0), RegisterClass::Bootstrap);
        assert_eq!(classify(0x937), RegisterClass::Bootstrap);
        assert_eq!(classify(0x1000), RegisterClass::Vendor);
        assert_eq!(classify(0x10C4), RegisterClass::Vendor);
        assert_eq!(classify(0x10000), RegisterClass::Xml);
        assert_eq!(classify(0x10000 + xml::SIZE as u32 - 1), RegisterClass::Xml);
        assert_eq!(classify(0x938), RegisterClass::Invalid);
        assert_eq!(classify(0xFFFF), RegisterClass::Invalid);
    }

    #[test]
    fn ccp_write_then_read_roundtrips_valid_value() {
        let mut router = router();
        router.write_u32(bootstrap::offset::CCP, 0x200).unwrap();
        assert_eq!(router.read_u32(bootstrap::offset::CCP).unwrap(), 0x200);
    }

    #[test]
    fn ccp_write_rejects_invalid_value() {
        let mut router = router();
        let err = router.write_u32(bootstrap::offset::CCP, 0x2).unwrap_err();
        assert_eq!(err, StatusCode::InvalidParameter);
        assert_eq!(router.read_u32(bootstrap::offset::CCP).unwrap(), 0);
    }

    #[test]
    fn identity_register_is_write_protected() {
        let mut router = router();
        let err = router
            .write_u32(bootstrap::offset::VERSION, 1)
            .unwrap_err();
        assert_eq!(err, StatusCode::WriteProtect);
    }

    #[test]
    fn unknown_vendor_address_is_invalid() {
        let mut router = router();
        let err = router.write_u32(0x1002, 1).unwrap_err();
        assert_eq!(err, StatusCode::InvalidAddress);
    }

    #[test]
    fn statistics_cell_is_write_protected() {
        let mut router = router();
        let err = router
            .write_u32(vendor::offset::STAT_TOTAL_COMMANDS, 1)
            .unwrap_err();
        assert_eq!(err, StatusCode::WriteProtect);
    }

    #[test]
    fn scda_write_yields_stream_destination_effect() {
        let mut router = router();
        let ip = Ipv4Addr::new(192, 168, 0, 42);
        let effect = router
            .write_u32(vendor::offset::GEV_SCDA, u32::from(ip))
            .unwrap();
        assert_eq!(effect, SideEffect::StreamDestination(ip));
    }

    #[test]
    fn timestamp_latch_populates_registers() {
        let mut router = router();
        let effect = router
            .write_u32(vendor::offset::GEV_TIMESTAMP_CONTROL_LATCH, 1)
            .unwrap();
        assert_eq!(effect, SideEffect::TimestampLatch);
        router.latch_timestamp(0x0001_0002_0003_0004);
        assert_eq!(
            router
                .read_u32(vendor::offset::GEV_TIMESTAMP_VALUE_HIGH)
                .unwrap(),
            0x0001_0002
        );
        assert_eq!(
            router
                .read_u32(vendor::offset::GEV_TIMESTAMP_VALUE_LOW)
                .unwrap(),
            0x0003_0004
        );
    }

    #[test]
    fn read_memory_rejects_span_across_boundary() {
        let router = router();
        let len = (bootstrap::SIZE - 4) + 8;
        let err = router.read_memory(4, len).unwrap_err();
        assert_eq!(err, StatusCode::InvalidAddress);
    }

    #[test]
    fn read_memory_xml_returns_requested_length() {
        let router = router();
        let bytes = router.read_memory(xml::BASE_ADDRESS, 256).unwrap();
        assert_eq!(bytes.len(), 256);
    }

    #[test]
    fn write_memory_is_atomic_on_failure() {
        let mut router = router();
        // First word valid and writable (latch trigger), second word
        // read-only (the latched value). The whole batch must be rejected
        // before either word is applied.
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&0xAAAA_BBBBu32.to_be_bytes());
        let err = router
            .write_memory(vendor::offset::GEV_TIMESTAMP_CONTROL_LATCH, &data)
            .unwrap_err();
        assert_eq!(err, StatusCode::WriteProtect);
        assert_eq!(
            router
                .read_u32(vendor::offset::GEV_TIMESTAMP_CONTROL_LATCH)
                .unwrap(),
            0
        );
    }

    #[test]
    fn read_memory_rejects_oversized_length() {
        let router = router();
        let err = router
            .read_memory(xml::BASE_ADDRESS, MAX_READ_MEMORY_LEN + 4)
            .unwrap_err();
        assert_eq!(err, StatusCode::BadAlignment);
    }

    #[test]
    fn bad_alignment_rejected() {
        let router = router();
        let err = router.read_memory(5, 4).unwrap_err();
        assert_eq!(err, StatusCode::BadAlignment);
    }
}
