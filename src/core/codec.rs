//! Route TLV codecs selected per neighbor.
//!
//! The codec a neighbor uses depends on its negotiated address family and
//! TLV version. Only the internal IPv4 encoding exists today; new encodings
//! (IPv6, wide metrics) slot in as further `CodecKind` variants.

use crate::core::tlv::{RouteRecord, TlvReader, TlvType};
use crate::error::Result;
use tracing::trace;

/// Encoder/decoder pair for route TLVs
pub trait TlvCodec {
    /// TLV type this codec produces and consumes
    fn tlv_type(&self) -> TlvType;

    /// Bytes `encode_route` would write for `route`
    fn encoded_len(&self, route: &RouteRecord) -> usize;

    /// Append `route` to `buf`; returns bytes written
    fn encode_route(&self, buf: &mut Vec<u8>, route: &RouteRecord) -> usize;

    /// Decode the next route TLV, skipping well-formed TLVs of other types.
    ///
    /// `None` means the region is exhausted; `Some(Err(_))` means the packet is
    /// malformed and the reader has been flushed.
    fn decode_route(&self, reader: &mut TlvReader) -> Option<Result<RouteRecord>>;
}

/// Codec tag stored on each neighbor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CodecKind {
    #[default]
    Ipv4Internal,
}

impl CodecKind {
    pub fn codec(self) -> &'static dyn TlvCodec {
        match self {
            CodecKind::Ipv4Internal => &Ipv4InternalCodec,
        }
    }
}

/// Classic internal IPv4 route TLV (type 0x0102)
#[derive(Clone, Copy, Debug, Default)]
pub struct Ipv4InternalCodec;

impl TlvCodec for Ipv4InternalCodec {
    fn tlv_type(&self) -> TlvType {
        TlvType::Ipv4Internal
    }

    fn encoded_len(&self, route: &RouteRecord) -> usize {
        route.encoded_len()
    }

    fn encode_route(&self, buf: &mut Vec<u8>, route: &RouteRecord) -> usize {
        route.encode(buf)
    }

    fn decode_route(&self, reader: &mut TlvReader) -> Option<Result<RouteRecord>> {
        loop {
            let (tlv_type, _) = reader.peek_header().unwrap_or((self.tlv_type(), 0));
            if tlv_type != self.tlv_type() {
                match reader.skip_tlv()? {
                    Ok(skipped) => {
                        trace!(tlv_type = ?skipped, "Skipping non-route TLV");
                        continue;
                    }
                    Err(e) => return Some(Err(e)),
                }
            }

            let decoded = reader
                .next_tlv()?
                .and_then(|raw| RouteRecord::decode_value(raw.value, raw.offset));
            if decoded.is_err() {
                reader.discard();
            }
            return Some(decoded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tlv::{Md5AuthTlv, Metric};
    use bytes::Bytes;
    use std::net::Ipv4Addr;

    fn route(dest: &str, delay: u32) -> RouteRecord {
        RouteRecord {
            destination: dest.parse().expect("valid prefix"),
            next_hop: Ipv4Addr::UNSPECIFIED,
            metric: Metric {
                delay,
                ..Metric::default()
            },
        }
    }

    #[test]
    fn test_decode_skips_auth_and_unknown_tlvs() {
        let codec = CodecKind::Ipv4Internal.codec();
        let mut buf = Vec::new();
        Md5AuthTlv::new(1).encode(&mut buf);
        // Unknown TLV with a 2-byte value
        buf.extend_from_slice(&[0x00, 0x99, 0x00, 0x06, 0xAB, 0xCD]);
        codec.encode_route(&mut buf, &route("10.0.0.0/8", 10));
        codec.encode_route(&mut buf, &route("172.16.0.0/12", 20));

        let mut reader = TlvReader::new(Bytes::from(buf));
        let first = codec.decode_route(&mut reader).expect("route").expect("ok");
        let second = codec.decode_route(&mut reader).expect("route").expect("ok");
        assert_eq!(first.metric.delay, 10);
        assert_eq!(second.destination.to_string(), "172.16.0.0/12");
        assert!(codec.decode_route(&mut reader).is_none());
    }

    #[test]
    fn test_truncated_trailer_is_reported_once() {
        let codec = CodecKind::Ipv4Internal.codec();
        let mut buf = Vec::new();
        codec.encode_route(&mut buf, &route("10.0.0.0/8", 10));
        buf.extend_from_slice(&[0x01, 0x02]);

        let mut reader = TlvReader::new(Bytes::from(buf));
        assert!(matches!(codec.decode_route(&mut reader), Some(Ok(_))));
        assert!(matches!(codec.decode_route(&mut reader), Some(Err(_))));
        assert!(codec.decode_route(&mut reader).is_none());
    }

    #[test]
    fn test_bad_route_value_flushes_rest_of_packet() {
        let codec = CodecKind::Ipv4Internal.codec();
        // Route TLV whose declared length leaves no room for the metric
        let mut buf = vec![0x01, 0x02, 0x00, 0x08, 0, 0, 0, 0];
        codec.encode_route(&mut buf, &route("10.0.0.0/8", 10));

        let mut reader = TlvReader::new(Bytes::from(buf));
        assert!(matches!(codec.decode_route(&mut reader), Some(Err(_))));
        assert!(reader.is_exhausted());
        assert!(codec.decode_route(&mut reader).is_none());
    }
}
