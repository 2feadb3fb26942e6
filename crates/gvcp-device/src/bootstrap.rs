//! The GigE Vision Bootstrap (GVBS) register block (`spec.md` §3, §6).

use std::net::Ipv4Addr;

use crate::config::{DeviceIdentity, NetworkInfo};
use crate::uuid::derive_uuid;

/// Size of the bootstrap register block in bytes.
pub const SIZE: usize = 0x938;

/// Default heartbeat timeout, in milliseconds.
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u32 = 3000;

/// Offsets into the bootstrap block (`spec.md` §6).
pub mod offset {
    pub const VERSION: u32 = 0x0000;
    pub const DEVICE_MODE: u32 = 0x0004;
    pub const MAC_HIGH: u32 = 0x0008;
    pub const MAC_LOW: u32 = 0x000C;
    pub const DEVICE_CAPABILITIES: u32 = 0x0010;
    pub const SUBNET_MASK: u32 = 0x0014;
    pub const GATEWAY: u32 = 0x0018;
    pub const CURRENT_IP_CONFIG: u32 = 0x001C;
    pub const SUPPORTED_IP_CONFIG: u32 = 0x0020;
    pub const CURRENT_IP: u32 = 0x0024;
    pub const LINK_SPEED: u32 = 0x002C;
    pub const MANUFACTURER_NAME: u32 = 0x0048;
    pub const MANUFACTURER_NAME_LEN: usize = 32;
    pub const MODEL_NAME: u32 = 0x0068;
    pub const MODEL_NAME_LEN: usize = 32;
    pub const DEVICE_VERSION: u32 = 0x0088;
    pub const DEVICE_VERSION_LEN: usize = 32;
    pub const SERIAL_NUMBER: u32 = 0x00D8;
    pub const SERIAL_NUMBER_LEN: usize = 16;
    pub const USER_DEFINED_NAME: u32 = 0x00E8;
    pub const USER_DEFINED_NAME_LEN: usize = 16;
    /// Device UUID slot. Per the GigE Vision standard layout (`spec.md` §9
    /// Open Questions) this does not overlap with `GATEWAY`.
    pub const UUID: u32 = 0x00F8;
    pub const CCP: u32 = 0x0200;
    pub const CCP_KEY: u32 = 0x0204;
    pub const XML_URL: u32 = 0x0220;
    pub const XML_URL_LEN: usize = 512;
    pub const HEARTBEAT_TIMEOUT: u32 = 0x0934;
}

const fn word_aligned(offset: u32) -> bool {
    offset % 4 == 0
}

fn write_string(buf: &mut [u8], offset: u32, max_len: usize, value: &str) {
    let start = offset as usize;
    let bytes = value.as_bytes();
    let n = bytes.len().min(max_len.saturating_sub(1));
    buf[start..start + n].copy_from_slice(&bytes[..n]);
    for b in &mut buf[start + n..start + max_len] {
        *b = 0;
    }
}

/// Fixed-size byte buffer encoding the standard bootstrap registers.
///
/// Invariant: every scalar field is stored in network (big-endian) byte
/// order; IP/mask/gateway are copied verbatim from [`NetworkInfo`] (already
/// network order); string slots are zero-padded and null-terminated.
#[derive(Debug, Clone)]
pub struct BootstrapBlock {
    bytes: [u8; SIZE],
}

impl BootstrapBlock {
    /// Build a fresh bootstrap block from identity and network info.
    pub fn new(identity: &DeviceIdentity, network: &NetworkInfo) -> Self {
        let mut block = Self {
            bytes: [0u8; SIZE],
        };
        block.populate(identity, network);
        block
    }

    /// Re-derive the block after the platform reports new network info
    /// (`spec.md` §3 lifecycle: "repopulated if the platform provides new
    /// network info").
    pub fn populate(&mut self, identity: &DeviceIdentity, network: &NetworkInfo) {
        self.write_raw_u32(offset::VERSION, 0x0001_0000);
        self.write_raw_u32(offset::DEVICE_MODE, 0x8000_0000);
        self.write_raw_u32(offset::MAC_HIGH, mac_high(network.mac));
        self.write_raw_u32(offset::MAC_LOW, mac_low(network.mac));
        self.write_raw_u32(offset::DEVICE_CAPABILITIES, 0x0000_0001);
        self.write_octets(offset::SUBNET_MASK, network.mask.octets());
        self.write_octets(offset::GATEWAY, network.gateway.octets());
        self.write_raw_u32(offset::CURRENT_IP_CONFIG, 0x0000_0002); // DHCP
        self.write_raw_u32(offset::SUPPORTED_IP_CONFIG, 0x0000_0007); // manual+DHCP+autoIP
        self.write_octets(offset::CURRENT_IP, network.ip.octets());
        self.write_raw_u32(offset::LINK_SPEED, 1_000); // 1 Gbps, in Mbps units

        write_string(
            &mut self.bytes,
            offset::MANUFACTURER_NAME,
            offset::MANUFACTURER_NAME_LEN,
            &identity.manufacturer,
        );
        write_string(
            &mut self.bytes,
            offset::MODEL_NAME,
            offset::MODEL_NAME_LEN,
            &identity.model,
        );
        write_string(
            &mut self.bytes,
            offset::DEVICE_VERSION,
            offset::DEVICE_VERSION_LEN,
            &identity.version,
        );
        write_string(
            &mut self.bytes,
            offset::SERIAL_NUMBER,
            offset::SERIAL_NUMBER_LEN,
            &identity.serial,
        );
        write_string(
            &mut self.bytes,
            offset::USER_DEFINED_NAME,
            offset::USER_DEFINED_NAME_LEN,
            &identity.user_name,
        );

        let uuid = derive_uuid(
            network.mac,
            &identity.model,
            &identity.version,
            &identity.serial,
        );
        self.bytes[offset::UUID as usize..offset::UUID as usize + 16].copy_from_slice(&uuid);

        self.write_raw_u32(offset::CCP, 0);
        self.write_raw_u32(offset::CCP_KEY, 0);

        let url = format!(
            "Local:camera.xml;{:#x};{:#x}",
            crate::xml::BASE_ADDRESS,
            crate::xml::SIZE
        );
        write_string(&mut self.bytes, offset::XML_URL, offset::XML_URL_LEN, &url);

        self.write_raw_u32(offset::HEARTBEAT_TIMEOUT, DEFAULT_HEARTBEAT_TIMEOUT_MS);
    }

    /// Raw byte access to the first `len` bytes (used for discovery data and
    /// `READ_MEMORY`/`WRITE_MEMORY` spanning the bootstrap region).
    pub fn as_bytes(&self) -> &[u8; SIZE] {
        &self.bytes
    }

    /// Read a scalar register in host byte order.
    pub fn read_u32(&self, offset: u32) -> Option<u32> {
        if !word_aligned(offset) || offset as usize + 4 > SIZE {
            return None;
        }
        let start = offset as usize;
        Some(u32::from_be_bytes(
            self.bytes[start..start + 4].try_into().unwrap(),
        ))
    }

    /// Write a scalar register, converting host order to network order.
    pub fn write_u32(&mut self, offset: u32, value: u32) -> Option<()> {
        if !word_aligned(offset) || offset as usize + 4 > SIZE {
            return None;
        }
        self.write_raw_u32(offset, value);
        Some(())
    }

    /// Read an arbitrary byte range (used by `READ_MEMORY`).
    pub fn read_bytes(&self, offset: u32, len: usize) -> Option<&[u8]> {
        let start = offset as usize;
        let end = start.checked_add(len)?;
        self.bytes.get(start..end)
    }

    /// Write an arbitrary byte range (used by `WRITE_MEMORY`), caller is
    /// responsible for write-protection checks.
    pub fn write_bytes(&mut self, offset: u32, data: &[u8]) -> Option<()> {
        let start = offset as usize;
        let end = start.checked_add(data.len())?;
        self.bytes.get_mut(start..end)?.copy_from_slice(data);
        Some(())
    }

    fn write_raw_u32(&mut self, offset: u32, value: u32) {
        let start = offset as usize;
        self.bytes[start..start + 4].copy_from_slice(&value.to_be_bytes());
    }

    fn write_octets(&mut self, offset: u32, octets: [u8; 4]) {
        let start = offset as usize;
        self.bytes[start..start + 4].copy_from_slice(&octets);
    }
}

fn mac_high(mac: [u8; 6]) -> u32 {
    u32::from_be_bytes([0, 0, mac[0], mac[1]])
}

fn mac_low(mac: [u8; 6]) -> u32 {
    u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]])
}

/// Classify a bootstrap offset by write permission (`spec.md` §4.2).
pub fn is_writable(offset: u32) -> bool {
    matches!(
        offset,
        offset::CCP | offset::CCP_KEY | offset::HEARTBEAT_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DeviceIdentity, NetworkInfo) {
        let identity = DeviceIdentity {
            manufacturer: "Acme".into(),
            model: "Cam1".into(),
            version: "2.0".into(),
            serial: "SN42".into(),
            user_name: "bench".into(),
        };
        let network = NetworkInfo {
            mac: [0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x33],
            ip: Ipv4Addr::new(192, 168, 1, 10),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
        };
        (identity, network)
    }

    #[test]
    fn version_is_fixed() {
        let (identity, network) = sample();
        let block = BootstrapBlock::new(&identity, &network);
        assert_eq!(block.read_u32(offset::VERSION), Some(0x0001_0000));
    }

    #[test]
    fn scalar_matches_raw_bytes_big_endian() {
        let (identity, network) = sample();
        let block = BootstrapBlock::new(&identity, &network);
        let raw = &block.as_bytes()[offset::VERSION as usize..offset::VERSION as usize + 4];
        assert_eq!(block.read_u32(offset::VERSION).unwrap(), u32::from_be_bytes(raw.try_into().unwrap()));
    }

    #[test]
    fn ip_fields_are_verbatim_network_order() {
        let (identity, network) = sample();
        let block = BootstrapBlock::new(&identity, &network);
        let bytes = block
            .read_bytes(offset::CURRENT_IP, 4)
            .expect("current ip bytes");
        assert_eq!(bytes, &network.ip.octets());
    }

    #[test]
    fn uuid_is_deterministic() {
        let (identity, network) = sample();
        let a = BootstrapBlock::new(&identity, &network);
        let b = BootstrapBlock::new(&identity, &network);
        let ua = a.read_bytes(offset::UUID, 16).unwrap();
        let ub = b.read_bytes(offset::UUID, 16).unwrap();
        assert_eq!(ua, ub);
    }

    #[test]
    fn strings_are_null_terminated_and_padded() {
        let (identity, network) = sample();
        let block = BootstrapBlock::new(&identity, &network);
        let slot = block
            .read_bytes(offset::MODEL_NAME, offset::MODEL_NAME_LEN)
            .unwrap();
        assert!(slot.starts_with(b"Cam1\0"));
        assert!(slot[identity.model.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn write_u32_roundtrips_on_writable_offset() {
        let (identity, network) = sample();
        let mut block = BootstrapBlock::new(&identity, &network);
        assert!(is_writable(offset::HEARTBEAT_TIMEOUT));
        block.write_u32(offset::HEARTBEAT_TIMEOUT, 5000).unwrap();
        assert_eq!(block.read_u32(offset::HEARTBEAT_TIMEOUT), Some(5000));
    }

    #[test]
    fn identity_registers_are_read_only() {
        assert!(!is_writable(offset::VERSION));
        assert!(!is_writable(offset::MAC_HIGH));
        assert!(!is_writable(offset::UUID));
        assert!(!is_writable(offset::XML_URL));
    }

    #[test]
    fn misaligned_access_is_rejected() {
        let (identity, network) = sample();
        let block = BootstrapBlock::new(&identity, &network);
        assert_eq!(block.read_u32(offset::VERSION + 1), None);
    }
}
