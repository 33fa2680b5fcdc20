//! TLV records carried after the fixed header.
//!
//! Every TLV starts with a 16-bit type and a 16-bit length that counts the
//! 4-byte TLV header itself. This module knows two payloads in detail: the
//! MD5 authentication TLV and the internal IPv4 route record. Anything else
//! is skipped by its declared length.

use crate::error::{Result, RtpError};
use bytes::{Buf, BufMut, Bytes};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// TLV type + length
pub const TLV_HDR_LEN: usize = 4;

/// Internal IPv4 TLV up to and including the prefix length byte
pub const IPV4_INTERNAL_FIXED_LEN: usize = 25;

/// Largest internal IPv4 TLV (a /25../32 destination)
pub const IPV4_INTERNAL_MAX_LEN: usize = IPV4_INTERNAL_FIXED_LEN + 4;

/// MD5 authentication TLV length
pub const AUTH_MD5_TLV_LEN: usize = 40;

/// Offset of the digest inside the MD5 authentication TLV
pub const AUTH_MD5_DIGEST_OFFSET: usize = 24;

/// MD5 digest length
pub const MD5_DIGEST_LEN: usize = 16;

/// Authentication type code for keyed MD5
pub const AUTH_TYPE_MD5: u16 = 2;

/// Delay value that marks a destination unreachable
pub const MAX_METRIC: u32 = u32::MAX;

/// Largest value of the 24-bit MTU metric field
const METRIC_MTU_MASK: u32 = 0x00FF_FFFF;

/// TLV type codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TlvType {
    Parameter,
    Authentication,
    Sequence,
    SoftwareVersion,
    NextMulticastSequence,
    PeerTermination,
    Ipv4Internal,
    Ipv4External,
    Unknown(u16),
}

impl TlvType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0001 => TlvType::Parameter,
            0x0002 => TlvType::Authentication,
            0x0003 => TlvType::Sequence,
            0x0004 => TlvType::SoftwareVersion,
            0x0005 => TlvType::NextMulticastSequence,
            0x0007 => TlvType::PeerTermination,
            0x0102 => TlvType::Ipv4Internal,
            0x0103 => TlvType::Ipv4External,
            other => TlvType::Unknown(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            TlvType::Parameter => 0x0001,
            TlvType::Authentication => 0x0002,
            TlvType::Sequence => 0x0003,
            TlvType::SoftwareVersion => 0x0004,
            TlvType::NextMulticastSequence => 0x0005,
            TlvType::PeerTermination => 0x0007,
            TlvType::Ipv4Internal => 0x0102,
            TlvType::Ipv4External => 0x0103,
            TlvType::Unknown(other) => other,
        }
    }
}

/// Composite metric vector as carried on the wire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub delay: u32,
    pub bandwidth: u32,
    /// 24 bits on the wire
    pub mtu: u32,
    pub hop_count: u8,
    pub reliability: u8,
    pub load: u8,
    pub tag: u8,
    pub flags: u8,
}

impl Metric {
    /// Metric advertising an unreachable destination
    pub fn unreachable() -> Self {
        Self {
            delay: MAX_METRIC,
            ..Self::default()
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.delay == MAX_METRIC
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.delay);
        buf.put_u32(self.bandwidth);
        buf.put_uint((self.mtu & METRIC_MTU_MASK) as u64, 3);
        buf.put_u8(self.hop_count);
        buf.put_u8(self.reliability);
        buf.put_u8(self.load);
        buf.put_u8(self.tag);
        buf.put_u8(self.flags);
    }

    fn decode(buf: &mut Bytes) -> Self {
        Self {
            delay: buf.get_u32(),
            bandwidth: buf.get_u32(),
            mtu: buf.get_uint(3) as u32,
            hop_count: buf.get_u8(),
            reliability: buf.get_u8(),
            load: buf.get_u8(),
            tag: buf.get_u8(),
            flags: buf.get_u8(),
        }
    }
}

/// One internal IPv4 prefix/metric record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteRecord {
    pub destination: Ipv4Network,
    pub next_hop: Ipv4Addr,
    pub metric: Metric,
}

impl RouteRecord {
    /// Number of destination bytes for a prefix length; never less than one
    fn destination_bytes(prefix_len: u8) -> usize {
        (prefix_len as usize).div_ceil(8).max(1)
    }

    /// Encoded size including the TLV header
    pub fn encoded_len(&self) -> usize {
        IPV4_INTERNAL_FIXED_LEN + Self::destination_bytes(self.destination.prefix())
    }

    /// Append the record as an internal IPv4 TLV; returns bytes written
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> usize {
        let len = self.encoded_len();
        let dest_bytes = Self::destination_bytes(self.destination.prefix());

        buf.put_u16(TlvType::Ipv4Internal.as_u16());
        buf.put_u16(len as u16);
        buf.put_slice(&self.next_hop.octets());
        self.metric.encode(buf);
        buf.put_u8(self.destination.prefix());
        buf.put_slice(&self.destination.network().octets()[..dest_bytes]);

        len
    }

    /// Decode the value part of an internal IPv4 TLV.
    ///
    /// `value` must hold exactly the bytes after the TLV header.
    pub fn decode_value(mut value: Bytes, offset: usize) -> Result<Self> {
        const VALUE_FIXED: usize = IPV4_INTERNAL_FIXED_LEN - TLV_HDR_LEN;

        if value.len() < VALUE_FIXED + 1 {
            return Err(RtpError::MalformedTlv {
                offset,
                reason: "internal route TLV shorter than its fixed fields",
            });
        }
        let dest_bytes = value.len() - VALUE_FIXED;
        if dest_bytes > 4 {
            return Err(RtpError::MalformedTlv {
                offset,
                reason: "internal route TLV destination longer than 4 bytes",
            });
        }

        let mut next_hop = [0u8; 4];
        value.copy_to_slice(&mut next_hop);
        let metric = Metric::decode(&mut value);
        let prefix_len = value.get_u8();
        if prefix_len > 32 || dest_bytes * 8 < prefix_len as usize {
            return Err(RtpError::MalformedTlv {
                offset,
                reason: "prefix length inconsistent with destination bytes",
            });
        }

        let mut octets = [0u8; 4];
        value.copy_to_slice(&mut octets[..dest_bytes]);
        let destination = Ipv4Network::new(Ipv4Addr::from(octets), prefix_len)
            .and_then(|net| Ipv4Network::new(net.network(), prefix_len))
            .map_err(|_| RtpError::MalformedTlv {
                offset,
                reason: "invalid destination prefix",
            })?;

        Ok(Self {
            destination,
            next_hop: Ipv4Addr::from(next_hop),
            metric,
        })
    }
}

/// Keyed MD5 authentication TLV. The digest is written at finalize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Md5AuthTlv {
    pub key_id: u32,
    pub key_sequence: u32,
    pub digest: [u8; MD5_DIGEST_LEN],
}

impl Md5AuthTlv {
    pub fn new(key_id: u32) -> Self {
        Self {
            key_id,
            key_sequence: 0,
            digest: [0; MD5_DIGEST_LEN],
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) -> usize {
        buf.put_u16(TlvType::Authentication.as_u16());
        buf.put_u16(AUTH_MD5_TLV_LEN as u16);
        buf.put_u16(AUTH_TYPE_MD5);
        buf.put_u16(MD5_DIGEST_LEN as u16);
        buf.put_u32(self.key_id);
        buf.put_u32(self.key_sequence);
        buf.put_bytes(0, 8);
        buf.put_slice(&self.digest);
        AUTH_MD5_TLV_LEN
    }

    pub fn decode_value(mut value: Bytes, offset: usize) -> Result<Self> {
        if value.len() != AUTH_MD5_TLV_LEN - TLV_HDR_LEN {
            return Err(RtpError::MalformedTlv {
                offset,
                reason: "authentication TLV has wrong length",
            });
        }
        let auth_type = value.get_u16();
        let auth_len = value.get_u16();
        if auth_type != AUTH_TYPE_MD5 || auth_len as usize != MD5_DIGEST_LEN {
            return Err(RtpError::MalformedTlv {
                offset,
                reason: "authentication TLV is not keyed MD5",
            });
        }
        let key_id = value.get_u32();
        let key_sequence = value.get_u32();
        value.advance(8);
        let mut digest = [0u8; MD5_DIGEST_LEN];
        value.copy_to_slice(&mut digest);

        Ok(Self {
            key_id,
            key_sequence,
            digest,
        })
    }
}

/// One TLV split off the stream
#[derive(Clone, Debug)]
pub struct RawTlv {
    pub tlv_type: TlvType,
    /// Offset of the TLV header within the TLV region
    pub offset: usize,
    /// Bytes after the TLV header
    pub value: Bytes,
}

/// Forward-only reader over the TLV region of a packet.
///
/// Never reads past the end of the buffer it was given. A malformed TLV
/// empties the reader so that every decode loop terminates.
#[derive(Clone, Debug)]
pub struct TlvReader {
    buf: Bytes,
    consumed: usize,
}

impl TlvReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, consumed: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.buf.is_empty()
    }

    /// Offset of the next TLV within the region
    pub fn position(&self) -> usize {
        self.consumed
    }

    /// Look at the next TLV's type and declared length without consuming it
    pub fn peek_header(&self) -> Option<(TlvType, usize)> {
        if self.buf.len() < TLV_HDR_LEN {
            return None;
        }
        let ty = u16::from_be_bytes([self.buf[0], self.buf[1]]);
        let len = u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize;
        Some((TlvType::from_u16(ty), len))
    }

    /// Split off the next TLV.
    ///
    /// Returns `None` once the region is exhausted.
    pub fn next_tlv(&mut self) -> Option<Result<RawTlv>> {
        if self.buf.is_empty() {
            return None;
        }

        let offset = self.consumed;
        let Some((tlv_type, len)) = self.peek_header() else {
            return Some(Err(self.flush(offset, "trailing bytes shorter than a TLV header")));
        };
        if len < TLV_HDR_LEN {
            return Some(Err(self.flush(offset, "TLV length smaller than its header")));
        }
        if len > self.buf.len() {
            return Some(Err(self.flush(offset, "TLV length exceeds remaining packet")));
        }

        let mut tlv = self.buf.split_to(len);
        tlv.advance(TLV_HDR_LEN);
        self.consumed += len;

        Some(Ok(RawTlv {
            tlv_type,
            offset,
            value: tlv,
        }))
    }

    /// Skip the next TLV by its declared length
    pub fn skip_tlv(&mut self) -> Option<Result<TlvType>> {
        self.next_tlv().map(|res| res.map(|raw| raw.tlv_type))
    }

    /// Drop whatever is left of the region
    pub fn discard(&mut self) {
        self.consumed += self.buf.len();
        self.buf.clear();
    }

    fn flush(&mut self, offset: usize, reason: &'static str) -> RtpError {
        self.discard();
        RtpError::MalformedTlv { offset, reason }
    }
}
