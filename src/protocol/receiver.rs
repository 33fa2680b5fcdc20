//! Receive paths for Query, Reply and SIA-Query packets.
//!
//! Route TLVs are decoded one at a time, in wire order. A malformed TLV stops
//! processing of the rest of the packet but keeps everything decoded before
//! it; the adjacency is left alone. Every resolved record becomes exactly one
//! FSM event, and the sender is acknowledged once the packet is done.

use crate::core::header::{Opcode, PacketHeader};
use crate::core::tlv::{Metric, TlvReader, MAX_METRIC};
use crate::error::{constants, Result, RtpError};
use crate::protocol::fsm;
use crate::protocol::hooks::{FilterDirection, ProtocolHooks};
use crate::protocol::neighbor::NeighborId;
use crate::protocol::process::Process;
use crate::protocol::topology::PrefixDescriptor;
use bytes::Bytes;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

/// What one received packet produced
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceiveSummary {
    /// FSM events dispatched
    pub events: usize,
    /// Records dropped because their destination is not in the topology table
    pub unknown_destinations: usize,
    /// Whether decoding stopped early on a malformed TLV
    pub malformed: bool,
}

impl Process {
    /// Process a Query from a known neighbor.
    ///
    /// `body` is the TLV region following the fixed header. After the events
    /// are dispatched the neighbor is acknowledged and the Query flood and
    /// Update sender run to propagate any new pending work.
    pub fn handle_query<H: ProtocolHooks + ?Sized>(
        &mut self,
        neighbor: NeighborId,
        header: &PacketHeader,
        body: Bytes,
        hooks: &mut H,
    ) -> Result<ReceiveSummary> {
        let pos = self.interface_position(neighbor.ifindex)?;
        let summary = self.process_records(Opcode::Query, pos, neighbor, header, body, hooks)?;
        self.acknowledge(pos, neighbor, hooks);
        self.propagate(pos, hooks);
        Ok(summary)
    }

    /// Process a Reply. The neighbor is looked up by source address and
    /// created if this is the first packet seen from it.
    pub fn handle_reply<H: ProtocolHooks + ?Sized>(
        &mut self,
        ifindex: u32,
        source: Ipv4Addr,
        header: &PacketHeader,
        body: Bytes,
        hooks: &mut H,
    ) -> Result<ReceiveSummary> {
        let pos = self.interface_position(ifindex)?;
        let neighbor = self.interfaces[pos].neighbor_get_or_insert(source).id();
        let summary = self.process_records(Opcode::Reply, pos, neighbor, header, body, hooks)?;
        self.acknowledge(pos, neighbor, hooks);
        Ok(summary)
    }

    /// Process an SIA-Query from a known neighbor
    pub fn handle_sia_query<H: ProtocolHooks + ?Sized>(
        &mut self,
        neighbor: NeighborId,
        header: &PacketHeader,
        body: Bytes,
        hooks: &mut H,
    ) -> Result<ReceiveSummary> {
        let pos = self.interface_position(neighbor.ifindex)?;
        let summary =
            self.process_records(Opcode::SiaQuery, pos, neighbor, header, body, hooks)?;
        self.acknowledge(pos, neighbor, hooks);
        self.propagate(pos, hooks);
        Ok(summary)
    }

    fn process_records<H: ProtocolHooks + ?Sized>(
        &mut self,
        opcode: Opcode,
        pos: usize,
        id: NeighborId,
        header: &PacketHeader,
        body: Bytes,
        hooks: &mut H,
    ) -> Result<ReceiveSummary> {
        let asn = self.asn();
        let codec = {
            let iface = &mut self.interfaces[pos];
            iface.counters().packet_received(opcode);
            let neighbor = iface
                .neighbor_mut(id.addr)
                .ok_or(RtpError::UnknownNeighbor(id.addr))?;
            neighbor.set_recv_sequence(header.sequence);
            neighbor.codec().codec()
        };

        let iface = &self.interfaces[pos];
        let Some(neighbor) = iface.neighbor(id.addr) else {
            return Err(RtpError::UnknownNeighbor(id.addr));
        };

        let mut summary = ReceiveSummary::default();
        let mut reader = TlvReader::new(body);
        loop {
            let record = match codec.decode_route(&mut reader) {
                None => break,
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    warn!(
                        neighbor = %id,
                        opcode = %opcode,
                        error = %e,
                        "{}",
                        constants::ERR_MALFORMED_PACKET
                    );
                    iface.counters().decode_error();
                    summary.malformed = true;
                    break;
                }
            };

            let dest = record.destination;
            if self.topology.lookup(&dest).is_none() {
                if opcode != Opcode::Query {
                    error!(
                        prefix = %dest,
                        neighbor = %id,
                        opcode = %opcode,
                        "{}",
                        constants::ERR_UNKNOWN_DESTINATION
                    );
                    iface.counters().unknown_destination();
                    summary.unknown_destinations += 1;
                    continue;
                }
                debug!(prefix = %dest, neighbor = %id, "Query for new destination");
                self.topology
                    .insert(PrefixDescriptor::new(dest, Metric::unreachable()));
            }
            let Some(prefix) = self.topology.lookup(&dest) else {
                continue;
            };

            let mut metrics = record.metric;
            if hooks.filter_denies(asn, iface, FilterDirection::In, &dest) {
                info!(prefix = %dest, neighbor = %id, "{}", constants::MSG_FILTER_MAX_METRIC);
                metrics.delay = MAX_METRIC;
            }

            fsm::dispatch(hooks, opcode, asn, neighbor, prefix, metrics);
            summary.events += 1;
        }

        debug!(
            opcode = %opcode,
            neighbor = %id,
            seq = header.sequence,
            events = summary.events,
            unknown = summary.unknown_destinations,
            malformed = summary.malformed,
            "Packet processed"
        );
        Ok(summary)
    }

    fn acknowledge<H: ProtocolHooks + ?Sized>(&self, pos: usize, id: NeighborId, hooks: &mut H) {
        if let Some(neighbor) = self.interfaces[pos].neighbor(id.addr) {
            hooks.send_ack(neighbor);
        }
    }

    fn propagate<H: ProtocolHooks + ?Sized>(&mut self, pos: usize, hooks: &mut H) {
        if let Err(e) = self.flood_query(hooks) {
            warn!(error = %e, "Query flood aborted");
        }
        hooks.send_updates(&self.interfaces[pos]);
    }
}
