//! Fragmenting sender for Query floods, Replies and SIA-Queries.
//!
//! A flood decides packet content once per interface and then fans each
//! finalized packet out as independent per-neighbor copies. Reliability is
//! tracked per neighbor from there on.

use crate::core::codec::TlvCodec;
use crate::core::header::Opcode;
use crate::core::packet::{Envelope, PacketBuilder, EIGRP_MULTICAST};
use crate::core::tlv::{RouteRecord, MAX_METRIC};
use crate::error::{constants, Result, RtpError};
use crate::protocol::hooks::{FilterDirection, ProtocolHooks, Transport};
use crate::protocol::interface::Interface;
use crate::protocol::neighbor::NeighborId;
use crate::protocol::process::{take_sequence, Process};
use crate::protocol::topology::{RequiredAction, TopologyTable};
use ipnetwork::Ipv4Network;
use tracing::{debug, info, warn};

/// Outcome of one interface's Query pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FloodReport {
    /// Packets finalized
    pub packets: usize,
    /// Route TLVs written across those packets
    pub tlvs: usize,
    /// Per-neighbor copies queued
    pub enqueued: usize,
}

impl Process {
    /// Flood every prefix flagged `NEED_QUERY` out of every interface.
    ///
    /// Returns the number of interfaces processed. The flag is cleared once
    /// the pass completes, whether or not any neighbor was eligible.
    ///
    /// An interface that cannot allocate a packet does not stop the others.
    /// In that case only prefixes that went out on some interface are
    /// cleared and the first error is returned.
    pub fn flood_query<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize> {
        let pending = self.topology.pending(RequiredAction::NEED_QUERY);
        let asn = self.asn();

        let mut total = FloodReport::default();
        let mut encoded = Vec::with_capacity(pending.len());
        let mut first_error = None;
        for iface in self.interfaces.iter_mut() {
            match query_pass(
                asn,
                iface,
                &mut self.topology,
                &mut self.sequence_number,
                &pending,
                &mut encoded,
                transport,
            ) {
                Ok(report) => {
                    total.packets += report.packets;
                    total.tlvs += report.tlvs;
                    total.enqueued += report.enqueued;
                }
                Err(e) => {
                    warn!(interface = iface.name(), error = %e, "Query flood failed on interface");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        let cleared: &[Ipv4Network] = if first_error.is_some() { &encoded } else { &pending };
        for dest in cleared {
            self.topology.clear_flag(dest, RequiredAction::NEED_QUERY);
        }

        debug!(
            interfaces = self.interfaces.len(),
            prefixes = pending.len(),
            packets = total.packets,
            enqueued = total.enqueued,
            "Query flood complete"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(self.interfaces.len()),
        }
    }

    /// Send a Reply for `destination` to one neighbor.
    ///
    /// A prefix the outbound filter denies is advertised as unreachable.
    /// Returns the sequence number of the queued packet.
    pub fn send_reply<H: ProtocolHooks + ?Sized>(
        &mut self,
        neighbor: NeighborId,
        destination: &Ipv4Network,
        hooks: &mut H,
    ) -> Result<u32> {
        self.send_unicast(Opcode::Reply, neighbor, destination, hooks)
    }

    /// Send an SIA-Query for `destination` to one neighbor
    pub fn send_sia_query<H: ProtocolHooks + ?Sized>(
        &mut self,
        neighbor: NeighborId,
        destination: &Ipv4Network,
        hooks: &mut H,
    ) -> Result<u32> {
        self.send_unicast(Opcode::SiaQuery, neighbor, destination, hooks)
    }

    fn send_unicast<H: ProtocolHooks + ?Sized>(
        &mut self,
        opcode: Opcode,
        id: NeighborId,
        destination: &Ipv4Network,
        hooks: &mut H,
    ) -> Result<u32> {
        let asn = self.asn();
        let pos = self.interface_position(id.ifindex)?;
        let iface = &self.interfaces[pos];
        let codec = iface
            .neighbor(id.addr)
            .ok_or(RtpError::UnknownNeighbor(id.addr))?
            .codec()
            .codec();

        let prefix = self
            .topology
            .lookup(destination)
            .ok_or(RtpError::UnknownDestination(*destination))?;
        let mut record = prefix.advertisement();
        if opcode == Opcode::Reply
            && hooks.filter_denies(asn, iface, FilterDirection::Out, destination)
        {
            info!(prefix = %destination, neighbor = %id, "{}", constants::MSG_FILTER_MAX_METRIC);
            record.metric.delay = MAX_METRIC;
        }

        let mut builder =
            PacketBuilder::open(opcode, asn, iface.packet_mtu(), iface.auth(), Some(id))?;
        builder.push_route(codec, &record);
        let sequence = take_sequence(&mut self.sequence_number);
        let envelope = builder.finalize(sequence, id.addr);

        let iface = &mut self.interfaces[pos];
        debug!(
            opcode = %opcode,
            neighbor = %id,
            prefix = %destination,
            seq = sequence,
            len = envelope.len(),
            "Built packet"
        );

        let Some(neighbor) = iface.neighbor_mut(id.addr) else {
            return Err(RtpError::UnknownNeighbor(id.addr));
        };
        match neighbor.enqueue(envelope) {
            Ok(1) => {
                neighbor.send_reliably(hooks);
            }
            Ok(_) => {}
            Err(e) => {
                iface.counters().rejected_enqueue();
                return Err(e);
            }
        }
        iface.counters().packet_sent(opcode);
        Ok(sequence)
    }
}

/// One interface's share of a Query flood. Every prefix written to a packet
/// is appended to `encoded`, even when a later allocation fails.
fn query_pass<T: Transport + ?Sized>(
    asn: u16,
    iface: &mut Interface,
    topology: &mut TopologyTable,
    sequence: &mut u32,
    pending: &[Ipv4Network],
    encoded: &mut Vec<Ipv4Network>,
    transport: &mut T,
) -> Result<FloodReport> {
    let codec = iface.codec().codec();
    let mtu = iface.packet_mtu();
    let up: Vec<NeighborId> = iface.up_neighbors().map(|n| n.id()).collect();

    let mut report = FloodReport::default();
    let mut open: Option<PacketBuilder> = None;

    for dest in pending {
        let Some(prefix) = topology.lookup_mut(dest) else {
            continue;
        };
        if !prefix.needs(RequiredAction::NEED_QUERY) {
            continue;
        }

        let record = prefix.advertisement();
        let tlv_len = codec.encoded_len(&record);
        if open.as_ref().is_some_and(|b| !b.is_empty() && !b.fits(tlv_len)) {
            if let Some(full) = open.take() {
                report.enqueued += distribute(iface, full, sequence, transport);
                report.packets += 1;
            }
        }

        let mut builder = match open.take() {
            Some(builder) => builder,
            None => PacketBuilder::open(Opcode::Query, asn, mtu, iface.auth(), None)?,
        };
        push(&mut builder, codec, &record);
        open = Some(builder);
        report.tlvs += 1;
        encoded.push(*dest);

        for id in &up {
            prefix.add_jeopardy(*id);
        }
    }

    match open {
        Some(builder) if !builder.is_empty() => {
            report.enqueued += distribute(iface, builder, sequence, transport);
            report.packets += 1;
        }
        _ => {}
    }

    Ok(report)
}

fn push(builder: &mut PacketBuilder, codec: &dyn TlvCodec, record: &RouteRecord) {
    let written = builder.push_route(codec, record);
    debug!(
        prefix = %record.destination,
        written,
        len = builder.len(),
        "Encoded route TLV"
    );
}

/// Finalize a multicast packet and queue a copy for every up neighbor
fn distribute<T: Transport + ?Sized>(
    iface: &mut Interface,
    builder: PacketBuilder,
    sequence: &mut u32,
    transport: &mut T,
) -> usize {
    let canonical: Envelope = builder.finalize(take_sequence(sequence), EIGRP_MULTICAST);
    iface.counters().packet_sent(canonical.opcode());
    debug!(
        interface = iface.name(),
        seq = canonical.sequence(),
        len = canonical.len(),
        "Finalized multicast packet"
    );

    let mut queued = 0;
    let mut rejected = 0;
    for neighbor in iface.neighbors_mut().iter_mut().filter(|n| n.is_up()) {
        match neighbor.enqueue(canonical.duplicate(neighbor.id())) {
            Ok(1) => {
                neighbor.send_reliably(transport);
                queued += 1;
            }
            Ok(_) => queued += 1,
            Err(_) => rejected += 1,
        }
    }
    for _ in 0..rejected {
        iface.counters().rejected_enqueue();
    }
    queued
}
