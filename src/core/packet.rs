//! Packet construction, finalization and the queued packet envelope.
//!
//! A packet is built once per batch by [`PacketBuilder`], finalized into an
//! [`Envelope`] (sequence number, digest, checksum), and then duplicated into
//! each neighbor's retransmission queue. Every queued copy owns its bytes so it
//! can be released the moment that neighbor acknowledges it.

use crate::core::codec::TlvCodec;
use crate::core::header::{Opcode, PacketHeader, CHECKSUM_OFFSET, HEADER_LEN, SEQUENCE_OFFSET};
use crate::core::integrity::{internet_checksum, md5_digest};
use crate::core::tlv::{
    Md5AuthTlv, RouteRecord, TlvType, AUTH_MD5_DIGEST_OFFSET, AUTH_MD5_TLV_LEN, MD5_DIGEST_LEN,
};
use crate::error::{Result, RtpError};
use crate::protocol::neighbor::NeighborId;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Instant;

/// All-EIGRP-routers multicast group
pub const EIGRP_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 10);

/// IPv4 header bytes subtracted from the interface MTU
pub const IP_HEADER_LEN: usize = 20;

/// Largest packet an IPv4 datagram can carry
pub const MAX_PACKET_LEN: usize = 65_535;

/// Byte range of the digest within a packet that carries an MD5 TLV
const DIGEST_RANGE: std::ops::Range<usize> =
    HEADER_LEN + AUTH_MD5_DIGEST_OFFSET..HEADER_LEN + AUTH_MD5_DIGEST_OFFSET + MD5_DIGEST_LEN;

/// Usable packet size for an interface MTU
pub fn packet_mtu(physical_mtu: u32) -> usize {
    (physical_mtu as usize).saturating_sub(IP_HEADER_LEN)
}

/// Interface authentication key
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey {
    pub key_id: u32,
    secret: Vec<u8>,
}

impl AuthKey {
    pub fn new(key_id: u32, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id,
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKey")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Append one route TLV using the neighbor's codec
pub fn encode_prefix_tlv(buf: &mut Vec<u8>, codec: &dyn TlvCodec, route: &RouteRecord) -> usize {
    codec.encode_route(buf, route)
}

/// Append the authentication TLV; writes nothing when authentication is off
pub fn encode_auth_tlv(buf: &mut Vec<u8>, auth: Option<&AuthKey>) -> usize {
    match auth {
        Some(key) => Md5AuthTlv::new(key.key_id).encode(buf),
        None => 0,
    }
}

/// Write the digest (when keyed) and then the checksum over `buf[..length]`.
///
/// The digest covers the TLV region `[HEADER_LEN, length)` with the digest
/// bytes zeroed. The checksum covers the whole packet with the checksum field
/// zeroed.
pub fn finalize(buf: &mut [u8], length: usize, auth: Option<&AuthKey>) {
    let length = length.min(buf.len());

    if let Some(key) = auth {
        if length >= HEADER_LEN + AUTH_MD5_TLV_LEN {
            buf[DIGEST_RANGE].fill(0);
            let digest = md5_digest(key.secret(), &buf[HEADER_LEN..length]);
            buf[DIGEST_RANGE].copy_from_slice(&digest);
        }
    }

    buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].fill(0);
    let checksum = internet_checksum(&buf[..length]);
    buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&checksum.to_be_bytes());
}

/// Check the checksum and, when `auth` is set, the keyed digest of a received packet
pub fn verify(packet: &[u8], auth: Option<&AuthKey>) -> Result<()> {
    if packet.len() < HEADER_LEN {
        return Err(RtpError::TruncatedHeader(packet.len()));
    }

    let mut scratch = packet.to_vec();
    let expected = u16::from_be_bytes([packet[CHECKSUM_OFFSET], packet[CHECKSUM_OFFSET + 1]]);
    scratch[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].fill(0);
    let computed = internet_checksum(&scratch);
    if computed != expected {
        return Err(RtpError::ChecksumMismatch { expected, computed });
    }

    let Some(key) = auth else {
        return Ok(());
    };
    if packet.len() < HEADER_LEN + AUTH_MD5_TLV_LEN {
        return Err(RtpError::AuthenticationFailure("packet too short for authentication TLV"));
    }
    let tlv_type = u16::from_be_bytes([packet[HEADER_LEN], packet[HEADER_LEN + 1]]);
    if TlvType::from_u16(tlv_type) != TlvType::Authentication {
        return Err(RtpError::AuthenticationFailure("authentication TLV missing"));
    }
    let key_id = u32::from_be_bytes([
        packet[HEADER_LEN + 8],
        packet[HEADER_LEN + 9],
        packet[HEADER_LEN + 10],
        packet[HEADER_LEN + 11],
    ]);
    if key_id != key.key_id {
        return Err(RtpError::AuthenticationFailure("key id mismatch"));
    }

    scratch[DIGEST_RANGE].fill(0);
    let digest = md5_digest(key.secret(), &scratch[HEADER_LEN..]);
    if digest[..] != packet[DIGEST_RANGE] {
        return Err(RtpError::AuthenticationFailure("digest mismatch"));
    }
    Ok(())
}

/// A finalized packet queued for one neighbor, with retransmission bookkeeping
#[derive(Debug, Clone)]
pub struct Envelope {
    data: Vec<u8>,
    opcode: Opcode,
    dst: Ipv4Addr,
    sequence: u32,
    owner: Option<NeighborId>,
    retrans_count: u32,
    last_sent: Option<Instant>,
}

impl Envelope {
    /// Allocate an empty envelope able to hold `capacity` bytes
    pub fn new(opcode: Opcode, capacity: usize, owner: Option<NeighborId>) -> Result<Self> {
        if !(HEADER_LEN..=MAX_PACKET_LEN).contains(&capacity) {
            return Err(RtpError::BufferAllocation {
                requested: capacity,
            });
        }

        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| RtpError::BufferAllocation {
                requested: capacity,
            })?;

        Ok(Self {
            data,
            opcode,
            dst: Ipv4Addr::UNSPECIFIED,
            sequence: 0,
            owner,
            retrans_count: 0,
            last_sent: None,
        })
    }

    /// Independent copy of the finalized bytes owned by `for_neighbor`
    pub fn duplicate(&self, for_neighbor: NeighborId) -> Self {
        Self {
            data: self.data.clone(),
            opcode: self.opcode,
            dst: self.dst,
            sequence: self.sequence,
            owner: Some(for_neighbor),
            retrans_count: 0,
            last_sent: None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn dst(&self) -> Ipv4Addr {
        self.dst
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn owner(&self) -> Option<NeighborId> {
        self.owner
    }

    /// Number of times this envelope has been handed to the transport
    pub fn retrans_count(&self) -> u32 {
        self.retrans_count
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    pub(crate) fn record_transmission(&mut self, now: Instant) {
        self.retrans_count += 1;
        self.last_sent = Some(now);
    }
}

/// Incrementally builds one packet no larger than an MTU bound
#[derive(Debug)]
pub struct PacketBuilder {
    envelope: Envelope,
    auth: Option<AuthKey>,
    mtu_bound: usize,
    tlv_count: usize,
}

impl PacketBuilder {
    /// Allocate a buffer and write the header and, if keyed, the authentication TLV.
    ///
    /// A bound too small to hold the header and authentication TLV is refused.
    pub fn open(
        opcode: Opcode,
        asn: u16,
        mtu_bound: usize,
        auth: Option<&AuthKey>,
        owner: Option<NeighborId>,
    ) -> Result<Self> {
        let preamble = HEADER_LEN + auth.map_or(0, |_| AUTH_MD5_TLV_LEN);
        if mtu_bound < preamble {
            return Err(RtpError::BufferAllocation {
                requested: preamble,
            });
        }

        let mut envelope = Envelope::new(opcode, mtu_bound, owner)?;
        PacketHeader::new(opcode, asn, 0, 0).encode(&mut envelope.data);
        encode_auth_tlv(&mut envelope.data, auth);

        Ok(Self {
            envelope,
            auth: auth.cloned(),
            mtu_bound,
            tlv_count: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.envelope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tlv_count == 0
    }

    pub fn tlv_count(&self) -> usize {
        self.tlv_count
    }

    pub fn mtu_bound(&self) -> usize {
        self.mtu_bound
    }

    /// Whether `additional` more bytes stay within the MTU bound
    pub fn fits(&self, additional: usize) -> bool {
        self.len() + additional <= self.mtu_bound
    }

    pub fn push_route(&mut self, codec: &dyn TlvCodec, route: &RouteRecord) -> usize {
        self.tlv_count += 1;
        encode_prefix_tlv(&mut self.envelope.data, codec, route)
    }

    /// Stamp the sequence number, digest and checksum
    pub fn finalize(mut self, sequence: u32, dst: Ipv4Addr) -> Envelope {
        let length = self.envelope.data.len();
        self.envelope.data[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4]
            .copy_from_slice(&sequence.to_be_bytes());
        finalize(&mut self.envelope.data, length, self.auth.as_ref());

        self.envelope.sequence = sequence;
        self.envelope.dst = dst;
        self.envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::CodecKind;
    use crate::core::tlv::Metric;

    fn route(dest: &str) -> RouteRecord {
        RouteRecord {
            destination: dest.parse().expect("valid prefix"),
            next_hop: Ipv4Addr::UNSPECIFIED,
            metric: Metric::default(),
        }
    }

    #[test]
    fn test_packet_mtu_subtracts_ip_header() {
        assert_eq!(packet_mtu(1500), 1480);
        assert_eq!(packet_mtu(10), 0);
    }

    #[test]
    fn test_envelope_rejects_impossible_capacity() {
        assert!(matches!(
            Envelope::new(Opcode::Query, 4, None),
            Err(RtpError::BufferAllocation { requested: 4 })
        ));
        assert!(Envelope::new(Opcode::Query, MAX_PACKET_LEN + 1, None).is_err());
    }

    #[test]
    fn test_builder_rejects_bound_below_preamble() {
        let key = AuthKey::new(1, "k");
        assert!(matches!(
            PacketBuilder::open(Opcode::Query, 1, HEADER_LEN + 10, Some(&key), None),
            Err(RtpError::BufferAllocation { requested }) if requested == HEADER_LEN + AUTH_MD5_TLV_LEN
        ));
        assert!(PacketBuilder::open(Opcode::Query, 1, packet_mtu(30), None, None).is_err());
        assert!(PacketBuilder::open(Opcode::Query, 1, HEADER_LEN + 10, None, None).is_ok());
    }

    #[test]
    fn test_finalized_packet_verifies() {
        let key = AuthKey::new(3, "s3cr3t");
        let codec = CodecKind::Ipv4Internal.codec();
        let mut builder =
            PacketBuilder::open(Opcode::Query, 10, 1480, Some(&key), None).expect("open");
        builder.push_route(codec, &route("10.0.0.0/8"));
        let env = builder.finalize(42, EIGRP_MULTICAST);

        assert_eq!(env.sequence(), 42);
        assert_eq!(&env.as_bytes()[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4], &42u32.to_be_bytes());
        verify(env.as_bytes(), Some(&key)).expect("verifies");
        assert!(matches!(
            verify(env.as_bytes(), Some(&AuthKey::new(3, "other"))),
            Err(RtpError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_corruption_breaks_checksum() {
        let codec = CodecKind::Ipv4Internal.codec();
        let mut builder = PacketBuilder::open(Opcode::Reply, 1, 1480, None, None).expect("open");
        builder.push_route(codec, &route("10.0.0.0/8"));
        let env = builder.finalize(1, Ipv4Addr::new(10, 0, 0, 2));

        let mut bytes = env.as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(
            verify(&bytes, None),
            Err(RtpError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_auth_tlv_written_only_when_keyed() {
        let mut buf = Vec::new();
        assert_eq!(encode_auth_tlv(&mut buf, None), 0);
        assert!(buf.is_empty());
        assert_eq!(
            encode_auth_tlv(&mut buf, Some(&AuthKey::new(1, "k"))),
            AUTH_MD5_TLV_LEN
        );
    }

    #[test]
    fn test_duplicate_is_independent() {
        let codec = CodecKind::Ipv4Internal.codec();
        let mut builder = PacketBuilder::open(Opcode::Query, 1, 1480, None, None).expect("open");
        builder.push_route(codec, &route("10.0.0.0/8"));
        let mut canonical = builder.finalize(5, EIGRP_MULTICAST);
        canonical.record_transmission(Instant::now());

        let owner = NeighborId::new(1, Ipv4Addr::new(10, 0, 0, 2));
        let dup = canonical.duplicate(owner);
        assert_eq!(dup.as_bytes(), canonical.as_bytes());
        assert_eq!(dup.owner(), Some(owner));
        assert_eq!(dup.retrans_count(), 0);
        assert!(dup.last_sent().is_none());
    }
}
