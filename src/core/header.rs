//! Fixed EIGRP packet header.
//!
//! ```text
//! [Version(1)] [Opcode(1)] [Checksum(2)] [Flags(4)]
//! [Sequence(4)] [Ack(4)] [VRID(2)] [AS(2)]
//! ```
//!
//! All multi-byte fields are big-endian.

use crate::error::{Result, RtpError};
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes};
use std::fmt;

/// Protocol version carried in every header
pub const EIGRP_VERSION: u8 = 2;

/// Length of the fixed header
pub const HEADER_LEN: usize = 20;

/// Byte offset of the checksum field
pub const CHECKSUM_OFFSET: usize = 2;

/// Byte offset of the sequence number field
pub const SEQUENCE_OFFSET: usize = 8;

/// Packet opcodes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Update = 1,
    Request = 2,
    Query = 3,
    Reply = 4,
    Hello = 5,
    Probe = 7,
    SiaQuery = 10,
    SiaReply = 11,
}

impl Opcode {
    /// Short name used in log records
    pub fn as_str(self) -> &'static str {
        match self {
            Opcode::Update => "UPDATE",
            Opcode::Request => "REQUEST",
            Opcode::Query => "QUERY",
            Opcode::Reply => "REPLY",
            Opcode::Hello => "HELLO",
            Opcode::Probe => "PROBE",
            Opcode::SiaQuery => "SIA_QUERY",
            Opcode::SiaReply => "SIA_REPLY",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = RtpError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Opcode::Update),
            2 => Ok(Opcode::Request),
            3 => Ok(Opcode::Query),
            4 => Ok(Opcode::Reply),
            5 => Ok(Opcode::Hello),
            7 => Ok(Opcode::Probe),
            10 => Ok(Opcode::SiaQuery),
            11 => Ok(Opcode::SiaReply),
            other => Err(RtpError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Header flag bits
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct HeaderFlags: u32 {
        const INIT = 0x01;
        const CONDITIONAL_RECEIVE = 0x02;
        const RESTART = 0x04;
        const END_OF_TABLE = 0x08;
    }
}

/// Decoded fixed header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub version: u8,
    pub opcode: Opcode,
    pub checksum: u16,
    pub flags: HeaderFlags,
    pub sequence: u32,
    pub ack: u32,
    pub vrid: u16,
    pub asn: u16,
}

impl PacketHeader {
    /// Header for an outbound packet. Checksum and sequence are filled in at finalize.
    pub fn new(opcode: Opcode, asn: u16, sequence: u32, ack: u32) -> Self {
        Self {
            version: EIGRP_VERSION,
            opcode,
            checksum: 0,
            flags: HeaderFlags::empty(),
            sequence,
            ack,
            vrid: 0,
            asn,
        }
    }

    /// Append the header to `buf`
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.version);
        buf.put_u8(self.opcode as u8);
        buf.put_u16(self.checksum);
        buf.put_u32(self.flags.bits());
        buf.put_u32(self.sequence);
        buf.put_u32(self.ack);
        buf.put_u16(self.vrid);
        buf.put_u16(self.asn);
    }

    /// Consume a header from the front of `buf`, leaving the TLV region
    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        if buf.remaining() < HEADER_LEN {
            return Err(RtpError::TruncatedHeader(buf.remaining()));
        }

        let version = buf.get_u8();
        if version != EIGRP_VERSION {
            return Err(RtpError::UnsupportedVersion(version));
        }
        let opcode = Opcode::try_from(buf.get_u8())?;

        Ok(Self {
            version,
            opcode,
            checksum: buf.get_u16(),
            flags: HeaderFlags::from_bits_retain(buf.get_u32()),
            sequence: buf.get_u32(),
            ack: buf.get_u32(),
            vrid: buf.get_u16(),
            asn: buf.get_u16(),
        })
    }
}
