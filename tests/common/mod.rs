//! Shared fixtures for integration tests
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use eigrp_rtp::core::codec::CodecKind;
use eigrp_rtp::core::header::{PacketHeader, HEADER_LEN};
use eigrp_rtp::core::packet::{self, AuthKey, Envelope};
use eigrp_rtp::core::tlv::{Metric, RouteRecord};
use eigrp_rtp::protocol::interface::Interface;
use eigrp_rtp::protocol::topology::{PrefixDescriptor, RequiredAction};
use eigrp_rtp::{FilterDirection, FsmEvent, Neighbor, NeighborId, NeighborState, Opcode, Process};
use eigrp_rtp::{ProtocolHooks, Transport};
use ipnetwork::Ipv4Network;
use std::collections::HashSet;
use std::net::Ipv4Addr;

pub const ASN: u16 = 100;

/// Owned copy of what an FSM event carried
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub packet_type: Opcode,
    pub neighbor: NeighborId,
    pub prefix: Ipv4Network,
    pub delay: u32,
    pub had_route: bool,
}

/// Collaborator stand-in that records every call
#[derive(Default)]
pub struct RecordingHooks {
    pub transmissions: Vec<(NeighborId, Opcode, u32)>,
    pub acks: Vec<NeighborId>,
    pub update_runs: Vec<u32>,
    pub events: Vec<RecordedEvent>,
    pub deny_in: HashSet<Ipv4Network>,
    pub deny_out: HashSet<Ipv4Network>,
}

impl RecordingHooks {
    pub fn transmissions_to(&self, neighbor: NeighborId) -> usize {
        self.transmissions.iter().filter(|t| t.0 == neighbor).count()
    }
}

impl Transport for RecordingHooks {
    fn transmit(&mut self, neighbor: NeighborId, envelope: &Envelope) -> std::io::Result<()> {
        self.transmissions
            .push((neighbor, envelope.opcode(), envelope.sequence()));
        Ok(())
    }
}

impl ProtocolHooks for RecordingHooks {
    fn send_ack(&mut self, neighbor: &Neighbor) {
        self.acks.push(neighbor.id());
    }

    fn send_updates(&mut self, interface: &Interface) {
        self.update_runs.push(interface.ifindex());
    }

    fn filter_denies(
        &self,
        _asn: u16,
        _interface: &Interface,
        direction: FilterDirection,
        prefix: &Ipv4Network,
    ) -> bool {
        match direction {
            FilterDirection::In => self.deny_in.contains(prefix),
            FilterDirection::Out => self.deny_out.contains(prefix),
        }
    }

    fn fsm_event(&mut self, event: &FsmEvent<'_>) {
        self.events.push(RecordedEvent {
            packet_type: event.packet_type,
            neighbor: event.adv_router.id(),
            prefix: event.prefix.destination(),
            delay: event.metrics.delay,
            had_route: event.route.is_some(),
        });
    }
}

pub fn net(s: &str) -> Ipv4Network {
    s.parse().expect("valid prefix")
}

pub fn addr(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

pub fn nbr_id(last: u8) -> NeighborId {
    NeighborId::new(1, addr(last))
}

pub fn route(dest: &str, delay: u32) -> RouteRecord {
    RouteRecord {
        destination: net(dest),
        next_hop: Ipv4Addr::UNSPECIFIED,
        metric: Metric {
            delay,
            bandwidth: 256,
            mtu: 1500,
            hop_count: 1,
            reliability: 255,
            load: 1,
            ..Metric::default()
        },
    }
}

/// Process with interface 1 and the given neighbors on it
pub fn process_with(mtu: u32, neighbors: &[(u8, NeighborState)], auth: Option<AuthKey>) -> Process {
    let mut process = Process::new(ASN, Ipv4Addr::new(10, 0, 0, 1));
    let mut iface = Interface::new(1, "eth0", mtu);
    if let Some(key) = auth {
        iface = iface.with_auth(key);
    }
    for (last, state) in neighbors {
        iface.add_neighbor(Neighbor::new(nbr_id(*last)).with_state(*state));
    }
    process.add_interface(iface);
    process
}

/// Insert known destinations and flag them for a Query flood
pub fn flag_for_query(process: &mut Process, dests: &[&str]) {
    for dest in dests {
        let dest = net(dest);
        process
            .topology_mut()
            .insert(PrefixDescriptor::new(dest, Metric::default()));
        process.topology_mut().flag(&dest, RequiredAction::NEED_QUERY);
    }
}

/// Finalized packet bytes carrying `routes`, keyed when `auth` is set
pub fn wire_packet(opcode: Opcode, sequence: u32, ack: u32, routes: &[RouteRecord], auth: Option<&AuthKey>) -> Vec<u8> {
    let codec = CodecKind::Ipv4Internal.codec();
    let mut buf = Vec::new();
    PacketHeader::new(opcode, ASN, sequence, ack).encode(&mut buf);
    packet::encode_auth_tlv(&mut buf, auth);
    for r in routes {
        packet::encode_prefix_tlv(&mut buf, codec, r);
    }
    let len = buf.len();
    packet::finalize(&mut buf, len, auth);
    buf
}

/// TLV region of a packet
pub fn body(packet: &[u8]) -> bytes::Bytes {
    bytes::Bytes::copy_from_slice(&packet[HEADER_LEN..])
}
