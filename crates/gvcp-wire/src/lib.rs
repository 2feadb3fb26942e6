//! GVCP wire codec: header framing, opcodes, and status mapping.
//!
//! Transport-agnostic: this crate only knows how to turn bytes into typed
//! headers and back. It does not open sockets and does not know about
//! registers.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the GVCP header (in bytes).
pub const HEADER_SIZE: usize = 8;

/// Bit within `packet_flags` requesting an acknowledgement.
pub const FLAG_ACK_REQUIRED: u8 = 0x01;

/// The three packet types a GVCP datagram can carry in its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Command sent by a controlling application.
    Command,
    /// Successful acknowledgement.
    Ack,
    /// Error / NACK reply.
    Error,
}

impl PacketType {
    /// Raw byte value as defined by the GigE Vision Control Protocol.
    pub const fn raw(self) -> u8 {
        match self {
            PacketType::Command => 0x42,
            PacketType::Ack => 0x00,
            PacketType::Error => 0x80,
        }
    }

    fn from_raw(raw: u8) -> Result<Self, GvcpWireError> {
        match raw {
            0x42 => Ok(PacketType::Command),
            0x00 => Ok(PacketType::Ack),
            0x80 => Ok(PacketType::Error),
            other => Err(GvcpWireError::UnknownPacketType(other)),
        }
    }
}

/// GVCP operation codes understood by this crate (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Discovery handshake.
    Discovery,
    /// Request a resend of lost streaming packets.
    PacketResend,
    /// Read one or more 32-bit registers.
    ReadReg,
    /// Write one or more 32-bit registers.
    WriteReg,
    /// Read a block of memory.
    ReadMem,
    /// Write a block of memory.
    WriteMem,
}

impl OpCode {
    /// Raw command value as defined by the GigE Vision Control Protocol.
    pub const fn command_code(self) -> u16 {
        match self {
            OpCode::Discovery => 0x0002,
            OpCode::PacketResend => 0x0040,
            OpCode::ReadReg => 0x0080,
            OpCode::WriteReg => 0x0082,
            OpCode::ReadMem => 0x0084,
            OpCode::WriteMem => 0x0086,
        }
    }

    /// Raw acknowledgement value. Every pair in `spec.md` §6 is `command + 1`.
    pub const fn ack_code(self) -> u16 {
        self.command_code() + 1
    }

    /// Resolve an `OpCode` from a raw command field.
    pub fn from_command(code: u16) -> Option<Self> {
        match code {
            0x0002 => Some(OpCode::Discovery),
            0x0040 => Some(OpCode::PacketResend),
            0x0080 => Some(OpCode::ReadReg),
            0x0082 => Some(OpCode::WriteReg),
            0x0084 => Some(OpCode::ReadMem),
            0x0086 => Some(OpCode::WriteMem),
            _ => None,
        }
    }
}

/// Status codes carried in NACK payloads (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    NotImplemented,
    InvalidParameter,
    InvalidAddress,
    WriteProtect,
    BadAlignment,
    AccessDenied,
    Busy,
    MsgTimeout,
    InvalidHeader,
    WrongConfig,
    /// A status code not known to this implementation.
    Unknown(u16),
}

impl StatusCode {
    /// Convert from the raw status field in a reply header.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x0000 => StatusCode::Success,
            0x8001 => StatusCode::NotImplemented,
            0x8002 => StatusCode::InvalidParameter,
            0x8003 => StatusCode::InvalidAddress,
            0x8004 => StatusCode::WriteProtect,
            0x8005 => StatusCode::BadAlignment,
            0x8006 => StatusCode::AccessDenied,
            0x8007 => StatusCode::Busy,
            0x800B => StatusCode::MsgTimeout,
            0x800E => StatusCode::InvalidHeader,
            0x800F => StatusCode::WrongConfig,
            other => StatusCode::Unknown(other),
        }
    }

    /// Convert to the raw value stored on the wire.
    pub const fn to_raw(self) -> u16 {
        match self {
            StatusCode::Success => 0x0000,
            StatusCode::NotImplemented => 0x8001,
            StatusCode::InvalidParameter => 0x8002,
            StatusCode::InvalidAddress => 0x8003,
            StatusCode::WriteProtect => 0x8004,
            StatusCode::BadAlignment => 0x8005,
            StatusCode::AccessDenied => 0x8006,
            StatusCode::Busy => 0x8007,
            StatusCode::MsgTimeout => 0x800B,
            StatusCode::InvalidHeader => 0x800E,
            StatusCode::WrongConfig => 0x800F,
            StatusCode::Unknown(code) => code,
        }
    }

    /// Whether this status represents a successful reply.
    pub const fn is_success(self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

/// Errors raised while decoding a GVCP header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GvcpWireError {
    #[error("packet shorter than the {HEADER_SIZE}-byte GVCP header")]
    TooShort,
    #[error("declared size does not match payload length")]
    SizeMismatch,
    #[error("unknown packet type byte {0:#04x}")]
    UnknownPacketType(u8),
}

/// Decoded GVCP header, independent of `packet_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GvcpHeader {
    /// Command, acknowledgement, or error framing.
    pub packet_type: PacketType,
    /// Raw flags byte; bit 0 is `FLAG_ACK_REQUIRED`.
    pub packet_flags: u8,
    /// Raw command or acknowledgement code.
    pub command: u16,
    /// Payload length in 32-bit words.
    pub size: u16,
    /// Packet identifier, echoed verbatim in replies.
    pub id: u16,
}

impl GvcpHeader {
    /// Whether the sender asked for an acknowledgement.
    pub const fn ack_required(self) -> bool {
        self.packet_flags & FLAG_ACK_REQUIRED != 0
    }

    /// Encode the header followed by `payload` into a wire-ready buffer.
    ///
    /// Fields are written byte-by-byte in network order; there is no packed
    /// struct and therefore no alignment or padding hazard.
    pub fn encode(self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_u8(self.packet_type.raw());
        buf.put_u8(self.packet_flags);
        buf.put_u16(self.command);
        buf.put_u16(self.size);
        buf.put_u16(self.id);
        buf.extend_from_slice(payload);
        buf.freeze()
    }
}

/// Parse a datagram into its header and payload slice.
///
/// Returns `Err` for anything shorter than [`HEADER_SIZE`], an unrecognised
/// `packet_type` byte, or a `size` field that disagrees with the actual
/// payload length. Per `spec.md` §4.1 these are framing errors: the caller
/// must drop the datagram silently rather than reply.
pub fn decode_header(buf: &[u8]) -> Result<(GvcpHeader, &[u8]), GvcpWireError> {
    if buf.len() < HEADER_SIZE {
        return Err(GvcpWireError::TooShort);
    }
    let packet_type = PacketType::from_raw(buf[0])?;
    let packet_flags = buf[1];
    let command = u16::from_be_bytes([buf[2], buf[3]]);
    let size = u16::from_be_bytes([buf[4], buf[5]]);
    let id = u16::from_be_bytes([buf[6], buf[7]]);

    let expected_len = HEADER_SIZE + 4 * size as usize;
    if buf.len() != expected_len {
        return Err(GvcpWireError::SizeMismatch);
    }

    let header = GvcpHeader {
        packet_type,
        packet_flags,
        command,
        size,
        id,
    };
    Ok((header, &buf[HEADER_SIZE..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = GvcpHeader {
            packet_type: PacketType::Command,
            packet_flags: FLAG_ACK_REQUIRED,
            command: OpCode::ReadReg.command_code(),
            size: 1,
            id: 0x0005,
        };
        let payload = [0u8, 0, 0, 0];
        let encoded = header.encode(&payload);
        assert_eq!(encoded.len(), HEADER_SIZE + payload.len());

        let (decoded, rest) = decode_header(&encoded).expect("decode");
        assert_eq!(decoded, header);
        assert_eq!(rest, &payload);
        assert!(decoded.ack_required());
    }

    #[test]
    fn rejects_short_packet() {
        let err = decode_header(&[0x42, 0x01, 0x00]).unwrap_err();
        assert_eq!(err, GvcpWireError::TooShort);
    }

    #[test]
    fn rejects_size_mismatch() {
        let header = GvcpHeader {
            packet_type: PacketType::Command,
            packet_flags: 0,
            command: OpCode::ReadReg.command_code(),
            size: 2, // claims 8 bytes of payload
            id: 1,
        };
        let encoded = header.encode(&[0u8; 4]); // only 4 supplied
        let err = decode_header(&encoded).unwrap_err();
        assert_eq!(err, GvcpWireError::SizeMismatch);
    }

    #[test]
    fn rejects_unknown_packet_type() {
        let mut bytes = vec![0x99, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01];
        bytes.resize(HEADER_SIZE, 0);
        let err = decode_header(&bytes).unwrap_err();
        assert_eq!(err, GvcpWireError::UnknownPacketType(0x99));
    }

    #[test]
    fn opcode_ack_codes_match_spec_table() {
        assert_eq!(OpCode::Discovery.ack_code(), 0x0003);
        assert_eq!(OpCode::PacketResend.ack_code(), 0x0041);
        assert_eq!(OpCode::ReadReg.ack_code(), 0x0081);
        assert_eq!(OpCode::WriteReg.ack_code(), 0x0083);
        assert_eq!(OpCode::ReadMem.ack_code(), 0x0085);
        assert_eq!(OpCode::WriteMem.ack_code(), 0x0087);
    }

    #[test]
    fn status_code_raw_roundtrip() {
        for code in [
            StatusCode::Success,
            StatusCode::NotImplemented,
            StatusCode::InvalidParameter,
            StatusCode::InvalidAddress,
            StatusCode::WriteProtect,
            StatusCode::BadAlignment,
            StatusCode::AccessDenied,
            StatusCode::Busy,
            StatusCode::MsgTimeout,
            StatusCode::InvalidHeader,
            StatusCode::WrongConfig,
        ] {
            assert_eq!(StatusCode::from_raw(code.to_raw()), code);
        }
    }
}
