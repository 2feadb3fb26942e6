//! The GVCP engine: dispatch, CCP gating, statistics, and discovery tying
//! together every other module (`spec.md` §4, §5).
//!
//! `process` is pure and synchronous — it never touches a socket — so it is
//! exercised directly in this module's tests via [`crate::platform::test_support::RecordingPlatform`].
//! `handle_datagram`/`tick` are the thin, `Platform`-calling wrappers a real
//! runtime (`gvcp-sim`) drives.

use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use gvcp_wire::{decode_header, GvcpHeader, OpCode, PacketType, StatusCode};

use crate::collaborator::StreamCollaborator;
use crate::config::EngineConfig;
use crate::discovery::DiscoveryService;
use crate::platform::Platform;
use crate::router::{RegisterRouter, SideEffect};
use crate::stats::{DiscoveryStats, Statistics, STATUS_CLIENT_CONNECTED};
use crate::vendor::offset as vendor_offset;

/// Ties the register file, CCP gate, discovery service, and statistics to a
/// [`Platform`] and a [`StreamCollaborator`].
pub struct GvcpEngine<P: Platform, S: StreamCollaborator> {
    config: EngineConfig,
    router: RegisterRouter,
    discovery: DiscoveryService,
    stats: Statistics,
    discovery_stats: DiscoveryStats,
    platform: P,
    collaborator: S,
    consecutive_send_errors: u32,
    should_recreate_socket: bool,
}

impl<P: Platform, S: StreamCollaborator> GvcpEngine<P, S> {
    pub fn new(config: EngineConfig, platform: P, collaborator: S) -> Self {
        let router = RegisterRouter::new(&config.identity, &config.network);
        let discovery = DiscoveryService::new(config.discovery);
        Self {
            config,
            router,
            discovery,
            stats: Statistics::new(),
            discovery_stats: DiscoveryStats::new(),
            platform,
            collaborator,
            consecutive_send_errors: 0,
            should_recreate_socket: false,
        }
    }

    /// The platform this engine was constructed with, so a runtime can
    /// drive its own receive loop against the same socket.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn discovery_stats(&self) -> &DiscoveryStats {
        &self.discovery_stats
    }

    pub fn should_recreate_socket(&self) -> bool {
        self.should_recreate_socket
    }

    /// Re-read network info from the platform and rebuild the bootstrap
    /// block (`spec.md` §3 lifecycle).
    pub fn refresh_network_info(&mut self) {
        let network = self.platform.network_info();
        self.config.network = network;
        self.router.refresh_network_info(&self.config.identity, &network);
    }

    /// Process one inbound datagram and return the reply to send, if any.
    /// Pure: performs no I/O. `from` is the requester's address, needed to
    /// register the default streaming destination on a solicited discovery
    /// (`spec.md` §4.3).
    pub fn process(&mut self, datagram: &[u8], from: SocketAddr) -> Option<Bytes> {
        let (header, payload) = match decode_header(datagram) {
            Ok(pair) => pair,
            Err(err) => {
                trace!(?err, "dropping malformed datagram");
                return None;
            }
        };

        if header.packet_type != PacketType::Command {
            trace!(packet_type = ?header.packet_type, "ignoring non-command datagram");
            return None;
        }

        self.sync_stat_reflectors();
        self.stats.record_command();

        let Some(opcode) = OpCode::from_command(header.command) else {
            self.stats.record_unknown_command();
            return self.maybe_nack(header, StatusCode::NotImplemented);
        };

        let result = match opcode {
            OpCode::Discovery => return Some(self.handle_discovery(header, from)),
            OpCode::PacketResend => self.handle_packet_resend(payload),
            OpCode::ReadReg => self.handle_read_reg(payload),
            OpCode::WriteReg => self.handle_write_reg(payload),
            OpCode::ReadMem => self.handle_read_mem(payload),
            OpCode::WriteMem => self.handle_write_mem(payload),
        };

        match result {
            Ok(reply_payload) => {
                Some(self.ack(header, opcode, &reply_payload))
            }
            Err(status) => {
                self.stats.record_error();
                self.maybe_nack(header, status)
            }
        }
    }

    fn maybe_nack(&mut self, header: GvcpHeader, status: StatusCode) -> Option<Bytes> {
        if !header.ack_required() {
            return None;
        }
        // Status fields are word-padded (2 reserved bytes) so `size` (a word
        // count) stays consistent with the encoded payload length.
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&status.to_raw().to_be_bytes());
        payload.extend_from_slice(&[0, 0]);
        let reply = GvcpHeader {
            packet_type: PacketType::Error,
            packet_flags: 0,
            command: header.command + 1,
            size: 1,
            id: header.id,
        }
        .encode(&payload);
        Some(reply)
    }

    fn ack(&mut self, header: GvcpHeader, opcode: OpCode, payload: &[u8]) -> Bytes {
        GvcpHeader {
            packet_type: PacketType::Ack,
            packet_flags: 0,
            command: opcode.ack_code(),
            size: (payload.len() / 4) as u16,
            id: header.id,
        }
        .encode(payload)
    }

    /// On a successful solicited discovery, register the requester as the
    /// default streaming destination and mark a client connected
    /// (`spec.md` §4.3).
    fn handle_discovery(&mut self, header: GvcpHeader, from: SocketAddr) -> Bytes {
        if let IpAddr::V4(ip) = from.ip() {
            self.collaborator.set_destination(ip);
        }
        self.stats.set_status_bit(STATUS_CLIENT_CONNECTED);
        DiscoveryService::build_solicited_reply(self.router.bootstrap(), header.id)
    }

    fn handle_packet_resend(&mut self, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
        if payload.len() != 8 {
            return Err(StatusCode::InvalidParameter);
        }
        let block_id = u16::from_be_bytes([payload[2], payload[3]]);
        let first_packet = u16::from_be_bytes([payload[4], payload[5]]);
        let last_packet = u16::from_be_bytes([payload[6], payload[7]]);
        if self
            .collaborator
            .packet_resend(block_id, first_packet, last_packet)
        {
            Ok(Vec::new())
        } else {
            Err(StatusCode::NotImplemented)
        }
    }

    fn handle_read_reg(&mut self, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
        if payload.is_empty() || payload.len() % 4 != 0 {
            return Err(StatusCode::InvalidParameter);
        }
        let mut out = Vec::with_capacity(payload.len());
        for chunk in payload.chunks_exact(4) {
            let addr = u32::from_be_bytes(chunk.try_into().unwrap());
            let value = self.router.read_u32(addr)?;
            out.extend_from_slice(&value.to_be_bytes());
        }
        Ok(out)
    }

    fn handle_write_reg(&mut self, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
        if payload.is_empty() || payload.len() % 8 != 0 {
            return Err(StatusCode::InvalidParameter);
        }
        let entries: Vec<(u32, u32)> = payload
            .chunks_exact(8)
            .map(|chunk| {
                let addr = u32::from_be_bytes(chunk[0..4].try_into().unwrap());
                let value = u32::from_be_bytes(chunk[4..8].try_into().unwrap());
                (addr, value)
            })
            .collect();

        // Validate every address and write-permission before applying any
        // of them: a batch that fails partway through must leave no prior
        // entry written (`spec.md` §4.1).
        for &(addr, _) in &entries {
            if !self.is_ccp_exempt(addr) && !self.router.ccp().writes_permitted() {
                return Err(StatusCode::AccessDenied);
            }
            self.router.validate_write(addr)?;
        }

        let mut effects = Vec::with_capacity(entries.len());
        for &(addr, value) in &entries {
            effects.push(self.router.write_u32(addr, value)?);
        }
        for effect in effects {
            self.apply_side_effect(effect);
        }
        // Word-padded status field: 2 reserved bytes, 2-byte status (0 on
        // success), per `spec.md` §4.1.
        Ok(vec![0, 0, 0, 0])
    }

    fn handle_read_mem(&mut self, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
        if payload.len() != 8 {
            return Err(StatusCode::InvalidParameter);
        }
        let addr = u32::from_be_bytes(payload[0..4].try_into().unwrap());
        let length = u16::from_be_bytes(payload[4..6].try_into().unwrap()) as usize;
        let data = self.router.read_memory(addr, length)?;
        let mut out = Vec::with_capacity(4 + data.len());
        out.extend_from_slice(&addr.to_be_bytes());
        out.extend_from_slice(&data);
        Ok(out)
    }

    fn handle_write_mem(&mut self, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
        if payload.len() < 8 || (payload.len() - 4) % 4 != 0 {
            return Err(StatusCode::InvalidParameter);
        }
        let addr = u32::from_be_bytes(payload[0..4].try_into().unwrap());
        let data = &payload[4..];
        if !self.is_ccp_exempt(addr) && !self.router.ccp().writes_permitted() {
            return Err(StatusCode::AccessDenied);
        }
        let effects = self.router.write_memory(addr, data)?;
        for effect in effects {
            self.apply_side_effect(effect);
        }
        let mut out = Vec::with_capacity(8);
        out.extend_from_slice(&addr.to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        Ok(out)
    }

    fn is_ccp_exempt(&self, addr: u32) -> bool {
        addr == crate::bootstrap::offset::CCP || addr == crate::bootstrap::offset::CCP_KEY
    }

    fn apply_side_effect(&mut self, effect: SideEffect) {
        match effect {
            SideEffect::None => {}
            SideEffect::TimestampLatch => {
                let now = self.platform.monotonic_ms();
                self.router.latch_timestamp(now);
            }
            SideEffect::StreamDestination(ip) => {
                self.collaborator.set_destination(ip);
            }
            SideEffect::DiscoveryEnable(enabled) => {
                self.discovery.set_enabled(enabled);
            }
            SideEffect::DiscoveryIntervalMs(ms) => {
                self.discovery.set_interval_ms(ms);
            }
            SideEffect::AcquisitionStart => {
                self.collaborator.acquisition_start();
            }
            SideEffect::AcquisitionStop => {
                self.collaborator.acquisition_stop();
            }
        }
    }

    /// Mirror live statistics/discovery counters into their read-only
    /// vendor cells so a subsequent `READREG` observes current values
    /// (`spec.md` §3).
    fn sync_stat_reflectors(&mut self) {
        let snap = self.stats.snapshot();
        let disc = self.discovery_stats.snapshot();
        self.router
            .reflect_vendor_u32(vendor_offset::STAT_TOTAL_COMMANDS, snap.total_commands as u32);
        self.router
            .reflect_vendor_u32(vendor_offset::STAT_TOTAL_ERRORS, snap.total_errors as u32);
        self.router.reflect_vendor_u32(
            vendor_offset::STAT_UNKNOWN_COMMANDS,
            snap.unknown_commands as u32,
        );
        self.router
            .reflect_vendor_u32(vendor_offset::STAT_PACKETS_SENT, snap.packets_sent as u32);
        self.router
            .reflect_vendor_u32(vendor_offset::STAT_PACKET_ERRORS, snap.packet_errors as u32);
        self.router
            .reflect_vendor_u32(vendor_offset::STAT_FRAMES_SENT, snap.frames_sent as u32);
        self.router
            .reflect_vendor_u32(vendor_offset::STAT_FRAME_ERRORS, snap.frame_errors as u32);
        self.router.reflect_vendor_u32(
            vendor_offset::STAT_OUT_OF_ORDER_FRAMES,
            snap.out_of_order_frames as u32,
        );
        self.router
            .reflect_vendor_u32(vendor_offset::STAT_LOST_FRAMES, snap.lost_frames as u32);
        self.router.reflect_vendor_u32(
            vendor_offset::STAT_DUPLICATE_FRAMES,
            snap.duplicate_frames as u32,
        );
        self.router.reflect_vendor_u32(
            vendor_offset::STAT_CONNECTION_FAILURES,
            snap.connection_failures as u32,
        );
        self.router
            .reflect_vendor_u32(vendor_offset::STAT_CONNECTION_STATUS, snap.connection_status);

        self.router.reflect_vendor_u32(
            vendor_offset::DISCOVERY_BROADCASTS_SENT,
            disc.broadcasts_sent as u32,
        );
        self.router.reflect_vendor_u32(
            vendor_offset::DISCOVERY_BROADCAST_FAILURES,
            disc.broadcast_failures as u32,
        );
        self.router
            .reflect_vendor_u32(vendor_offset::DISCOVERY_SEQUENCE_NUMBER, disc.sequence_number);
        self.router.reflect_vendor_u32(
            vendor_offset::DISCOVERY_LAST_BROADCAST_TIME_MS,
            disc.last_broadcast_time_ms as u32,
        );
    }

    /// Full receive path: process the datagram and, if it produced a reply,
    /// send it. Tracks consecutive send failures against
    /// `config.max_socket_errors` (`spec.md` §5).
    pub fn handle_datagram(&mut self, datagram: &[u8], from: SocketAddr) {
        let Some(reply) = self.process(datagram, from) else {
            return;
        };
        self.stats.record_packet_sent();
        match self.platform.send_to(&reply, from) {
            Ok(()) => {
                self.consecutive_send_errors = 0;
            }
            Err(err) => {
                warn!(%err, "failed to send GVCP reply");
                self.stats.record_packet_error();
                self.consecutive_send_errors += 1;
                if self.consecutive_send_errors >= self.config.max_socket_errors {
                    self.should_recreate_socket = true;
                }
            }
        }
    }

    /// Periodic tick: fire an unsolicited discovery broadcast if due,
    /// retrying up to `discovery.retries` times before giving up for this
    /// tick (`spec.md` §4.3).
    pub fn tick(&mut self, now_ms: u64, broadcast_addr: SocketAddr) {
        if !self.discovery.due(now_ms, self.discovery_stats.snapshot().last_broadcast_time_ms) {
            return;
        }
        let sequence = self.discovery_stats.next_sequence();
        let datagram = DiscoveryService::build_unsolicited_broadcast(self.router.bootstrap(), sequence);

        let attempts = self.discovery.retries().max(1);
        for attempt in 0..attempts {
            match self.platform.send_to(&datagram, broadcast_addr) {
                Ok(()) => {
                    self.discovery_stats.record_broadcast(now_ms);
                    debug!(attempt, "sent discovery broadcast");
                    return;
                }
                Err(err) => {
                    warn!(%err, attempt, "discovery broadcast attempt failed");
                }
            }
        }
        self.discovery_stats.record_failure(now_ms);
    }
}
