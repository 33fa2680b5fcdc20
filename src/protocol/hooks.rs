//! Collaborator interfaces.
//!
//! The transport core does not own sockets, the Hello/Ack subsystem, the
//! Update sender, route filters or the DUAL finite-state machine. The daemon
//! supplies them through these traits.

use crate::core::packet::Envelope;
use crate::protocol::fsm::FsmEvent;
use crate::protocol::interface::Interface;
use crate::protocol::neighbor::{Neighbor, NeighborId};
use ipnetwork::Ipv4Network;
use std::io;

/// Direction a route filter is applied in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterDirection {
    In,
    Out,
}

/// Puts a queued packet on the wire
pub trait Transport {
    /// Transmit `envelope` to `neighbor`. The envelope stays queued either way;
    /// a failed transmission is retried by the retransmission timer.
    fn transmit(&mut self, neighbor: NeighborId, envelope: &Envelope) -> io::Result<()>;
}

/// Everything the receive and send paths call out to
pub trait ProtocolHooks: Transport {
    /// Acknowledge the packets received from `neighbor`
    fn send_ack(&mut self, neighbor: &Neighbor);

    /// Run the Update sender for `interface`
    fn send_updates(&mut self, interface: &Interface);

    /// Whether the process or interface filters deny `prefix` in `direction`
    fn filter_denies(
        &self,
        _asn: u16,
        _interface: &Interface,
        _direction: FilterDirection,
        _prefix: &Ipv4Network,
    ) -> bool {
        false
    }

    /// Hand one event to the DUAL finite-state machine
    fn fsm_event(&mut self, event: &FsmEvent<'_>);
}
