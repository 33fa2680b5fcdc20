//! Bridge from decoded route records to DUAL finite-state machine events.
//!
//! One event is built per resolved record and delivered synchronously, in the
//! order the TLVs appeared on the wire. Nothing is batched or reordered.

use crate::core::header::Opcode;
use crate::core::tlv::Metric;
use crate::protocol::hooks::ProtocolHooks;
use crate::protocol::neighbor::Neighbor;
use crate::protocol::topology::{PrefixDescriptor, RouteDescriptor};
use tracing::trace;

/// Route origin carried in an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Internal,
    External,
}

/// Input to the DUAL finite-state machine. Lives only for the dispatch call.
#[derive(Debug)]
pub struct FsmEvent<'a> {
    pub packet_type: Opcode,
    /// Autonomous system of the owning process. Stands in for a process
    /// reference, which the event cannot hold while the process is borrowed.
    pub asn: u16,
    pub data_type: DataType,
    pub adv_router: &'a Neighbor,
    /// Absent the first time the neighbor reports the destination
    pub route: Option<&'a RouteDescriptor>,
    pub metrics: Metric,
    pub prefix: &'a PrefixDescriptor,
}

pub(crate) fn dispatch<H: ProtocolHooks + ?Sized>(
    hooks: &mut H,
    packet_type: Opcode,
    asn: u16,
    neighbor: &Neighbor,
    prefix: &PrefixDescriptor,
    metrics: Metric,
) {
    let event = FsmEvent {
        packet_type,
        asn,
        data_type: DataType::Internal,
        adv_router: neighbor,
        route: prefix.route(neighbor.id()),
        metrics,
        prefix,
    };

    trace!(
        packet_type = %packet_type,
        neighbor = %neighbor.id(),
        prefix = %prefix.destination(),
        delay = metrics.delay,
        has_route = event.route.is_some(),
        "Dispatching FSM event"
    );
    hooks.fsm_event(&event);
}
