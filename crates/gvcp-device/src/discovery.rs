//! Discovery handshake and periodic presence broadcast (`spec.md` §4.3).
//!
//! Builds the reply/broadcast payloads; the engine owns the actual socket
//! I/O and retry bookkeeping against [`crate::stats::DiscoveryStats`].

use bytes::Bytes;

use gvcp_wire::{GvcpHeader, OpCode, PacketType};

use crate::bootstrap::BootstrapBlock;
use crate::config::DiscoveryConfig;

/// Bytes of the bootstrap block copied into a discovery reply (`spec.md`
/// §4.3, scenario S1): header (8) + payload (0xF8) = 256-byte datagram.
pub const DISCOVERY_PAYLOAD_LEN: usize = 0xF8;

/// Magic prefix of the legacy raw broadcast format, retained emit-only for
/// older GigE Vision discovery clients that never sent a structured ACK
/// request.
const LEGACY_MAGIC: [u8; 2] = *b"BE";

/// Timer and configuration state for the discovery service. Payload
/// construction is exposed as associated functions so the engine can build
/// a solicited reply without needing a live `DiscoveryService` in hand.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryService {
    config: DiscoveryConfig,
}

impl DiscoveryService {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn interval_ms(&self) -> u32 {
        self.config.interval_ms
    }

    pub fn set_interval_ms(&mut self, interval_ms: u32) {
        if interval_ms > 0 {
            self.config.interval_ms = interval_ms;
        }
    }

    pub fn retries(&self) -> u32 {
        self.config.retries
    }

    /// Whether a broadcast is due, given the last successful/attempted
    /// broadcast time. `spec.md` §4.3: "ticks at `interval_ms` when enabled".
    pub fn due(&self, now_ms: u64, last_broadcast_ms: u64) -> bool {
        self.config.enabled
            && now_ms.saturating_sub(last_broadcast_ms) >= self.config.interval_ms as u64
    }

    /// Build the structured solicited discovery ACK (scenario S1):
    /// type=ACK, flags=0x01, command=`DISCOVERY_ACK` (0x0003), `id` echoed
    /// from the request, payload the first [`DISCOVERY_PAYLOAD_LEN`] bytes
    /// of the bootstrap block.
    pub fn build_solicited_reply(bootstrap: &BootstrapBlock, request_id: u16) -> Bytes {
        Self::build_reply(bootstrap, request_id, 0x01)
    }

    /// Build an unsolicited periodic broadcast, same framing as
    /// [`DiscoveryService::build_solicited_reply`] but with `id` set to the
    /// wrapping sequence number and `flags=0` (`spec.md` §4.3: a solicited
    /// reply sets flags=0x01, the unsolicited broadcast does not).
    pub fn build_unsolicited_broadcast(bootstrap: &BootstrapBlock, sequence: u16) -> Bytes {
        Self::build_reply(bootstrap, sequence, 0x00)
    }

    fn build_reply(bootstrap: &BootstrapBlock, id: u16, packet_flags: u8) -> Bytes {
        let payload = &bootstrap.as_bytes()[..DISCOVERY_PAYLOAD_LEN];
        let header = GvcpHeader {
            packet_type: PacketType::Ack,
            packet_flags,
            command: OpCode::Discovery.ack_code(),
            size: (DISCOVERY_PAYLOAD_LEN / 4) as u16,
            id,
        };
        header.encode(payload)
    }

    /// Build the legacy raw broadcast: `"BE"` magic, big-endian sequence
    /// number, then the same bootstrap payload as the structured form.
    /// Emit-only — this crate never parses an incoming datagram in this
    /// format.
    pub fn build_legacy_broadcast(bootstrap: &BootstrapBlock, sequence: u16) -> Bytes {
        let mut buf = Vec::with_capacity(4 + DISCOVERY_PAYLOAD_LEN);
        buf.extend_from_slice(&LEGACY_MAGIC);
        buf.extend_from_slice(&sequence.to_be_bytes());
        buf.extend_from_slice(&bootstrap.as_bytes()[..DISCOVERY_PAYLOAD_LEN]);
        Bytes::from(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceIdentity, NetworkInfo};
    use gvcp_wire::decode_header;
    use std::net::Ipv4Addr;

    fn bootstrap() -> BootstrapBlock {
        let identity = DeviceIdentity::default();
        let network = NetworkInfo {
            mac: [1, 2, 3, 4, 5, 6],
            ip: Ipv4Addr::new(10, 0, 0, 5),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(10, 0, 0, 1),
        };
        BootstrapBlock::new(&identity, &network)
    }

    #[test]
    fn solicited_reply_is_256_bytes() {
        let block = bootstrap();
        let reply = DiscoveryService::build_solicited_reply(&block, 0x1234);
        assert_eq!(reply.len(), 8 + DISCOVERY_PAYLOAD_LEN);
        let (header, payload) = decode_header(&reply).unwrap();
        assert_eq!(header.packet_type, PacketType::Ack);
        assert_eq!(header.packet_flags, 0x01);
        assert_eq!(header.command, OpCode::Discovery.ack_code());
        assert_eq!(header.id, 0x1234);
        assert_eq!(payload, &block.as_bytes()[..DISCOVERY_PAYLOAD_LEN]);
    }

    #[test]
    fn unsolicited_broadcast_uses_sequence_as_id() {
        let block = bootstrap();
        let reply = DiscoveryService::build_unsolicited_broadcast(&block, 0xFFFF);
        let (header, _) = decode_header(&reply).unwrap();
        assert_eq!(header.id, 0xFFFF);
    }

    #[test]
    fn unsolicited_broadcast_clears_ack_flag() {
        let block = bootstrap();
        let reply = DiscoveryService::build_unsolicited_broadcast(&block, 1);
        let (header, _) = decode_header(&reply).unwrap();
        assert_eq!(header.packet_flags, 0x00);
    }

    #[test]
    fn legacy_broadcast_carries_magic_and_sequence() {
        let block = bootstrap();
        let raw = DiscoveryService::build_legacy_broadcast(&block, 7);
        assert_eq!(&raw[0..2], b"BE");
        assert_eq!(u16::from_be_bytes([raw[2], raw[3]]), 7);
        assert_eq!(raw.len(), 4 + DISCOVERY_PAYLOAD_LEN);
    }

    #[test]
    fn due_respects_enabled_flag() {
        let service = DiscoveryService::new(DiscoveryConfig {
            enabled: false,
            interval_ms: 100,
            retries: 1,
        });
        assert!(!service.due(1_000, 0));
    }

    #[test]
    fn due_respects_interval() {
        let service = DiscoveryService::new(DiscoveryConfig {
            enabled: true,
            interval_ms: 100,
            retries: 1,
        });
        assert!(!service.due(50, 0));
        assert!(service.due(100, 0));
    }

    #[test]
    fn set_interval_ignores_zero() {
        let mut service = DiscoveryService::new(DiscoveryConfig {
            enabled: true,
            interval_ms: 100,
            retries: 1,
        });
        service.set_interval_ms(0);
        assert_eq!(service.interval_ms(), 100);
        service.set_interval_ms(250);
        assert_eq!(service.interval_ms(), 250);
    }
}
