//! The routing process context.
//!
//! Every send and receive entry point is a method on [`Process`]; it owns the
//! interfaces (and through them the neighbors), the topology table and the
//! outbound sequence counter. Independent processes share nothing.

use crate::config::{ReliableConfig, RtpConfig};
use crate::error::{Result, RtpError};
use crate::protocol::hooks::Transport;
use crate::protocol::interface::Interface;
use crate::protocol::neighbor::{Neighbor, NeighborId};
use crate::protocol::topology::TopologyTable;
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Process {
    asn: u16,
    router_id: Ipv4Addr,
    pub(crate) sequence_number: u32,
    pub(crate) interfaces: Vec<Interface>,
    pub(crate) topology: TopologyTable,
    reliable: ReliableConfig,
}

impl Process {
    pub fn new(asn: u16, router_id: Ipv4Addr) -> Self {
        Self {
            asn,
            router_id,
            sequence_number: 1,
            interfaces: Vec::new(),
            topology: TopologyTable::new(),
            reliable: ReliableConfig::default(),
        }
    }

    /// Build a process and its interfaces from validated configuration
    pub fn from_config(config: &RtpConfig) -> Result<Self> {
        config.validate_strict()?;

        let mut process = Self::new(config.process.asn, config.process.router_id);
        process.sequence_number = config.process.initial_sequence;
        process.reliable = config.reliable.clone();
        for iface in &config.interfaces {
            process.add_interface(Interface::from_config(iface));
        }

        info!(
            asn = process.asn,
            router_id = %process.router_id,
            interfaces = process.interfaces.len(),
            "Routing process configured"
        );
        Ok(process)
    }

    pub fn with_reliable(mut self, reliable: ReliableConfig) -> Self {
        self.reliable = reliable;
        self
    }

    pub fn asn(&self) -> u16 {
        self.asn
    }

    pub fn router_id(&self) -> Ipv4Addr {
        self.router_id
    }

    pub fn reliable(&self) -> &ReliableConfig {
        &self.reliable
    }

    /// Sequence number the next outbound packet will carry
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Take the next outbound sequence number. Zero is never handed out.
    pub fn next_sequence(&mut self) -> u32 {
        take_sequence(&mut self.sequence_number)
    }

    /// Add an interface, replacing any previous one with the same index
    pub fn add_interface(&mut self, interface: Interface) {
        self.interfaces.retain(|i| i.ifindex() != interface.ifindex());
        debug!(ifindex = interface.ifindex(), name = interface.name(), "Interface added");
        self.interfaces.push(interface);
    }

    pub fn interface(&self, ifindex: u32) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.ifindex() == ifindex)
    }

    pub fn interface_mut(&mut self, ifindex: u32) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.ifindex() == ifindex)
    }

    pub(crate) fn interface_position(&self, ifindex: u32) -> Result<usize> {
        self.interfaces
            .iter()
            .position(|i| i.ifindex() == ifindex)
            .ok_or(RtpError::UnknownInterface(ifindex))
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn topology(&self) -> &TopologyTable {
        &self.topology
    }

    pub fn topology_mut(&mut self) -> &mut TopologyTable {
        &mut self.topology
    }

    pub fn neighbor(&self, id: NeighborId) -> Option<&Neighbor> {
        self.interface(id.ifindex)?.neighbor(id.addr)
    }

    pub fn neighbor_mut(&mut self, id: NeighborId) -> Option<&mut Neighbor> {
        self.interface_mut(id.ifindex)?.neighbor_mut(id.addr)
    }

    /// Remove a neighbor: its queue is drained in one step, then every route
    /// and pending Reply it held is dropped from the topology.
    pub fn teardown_neighbor(&mut self, id: NeighborId) -> Result<usize> {
        let iface = self
            .interface_mut(id.ifindex)
            .ok_or(RtpError::UnknownInterface(id.ifindex))?;
        let dropped = iface
            .remove_neighbor(id.addr)
            .ok_or(RtpError::UnknownNeighbor(id.addr))?;

        self.topology.forget_neighbor(id);
        info!(neighbor = %id, dropped, "Neighbor removed");
        Ok(dropped)
    }

    /// Retransmission timer for one neighbor.
    ///
    /// Returns whether a packet was resent. When the retry limit is hit the
    /// neighbor is torn down and the `RetransmitLimit` error is returned.
    pub fn on_retransmit_timer<T: Transport + ?Sized>(
        &mut self,
        id: NeighborId,
        now: Instant,
        transport: &mut T,
    ) -> Result<bool> {
        let policy = self.reliable.clone();
        let iface = self
            .interfaces
            .iter_mut()
            .find(|i| i.ifindex() == id.ifindex)
            .ok_or(RtpError::UnknownInterface(id.ifindex))?;
        let neighbor = iface
            .neighbors_mut()
            .iter_mut()
            .find(|n| n.addr() == id.addr)
            .ok_or(RtpError::UnknownNeighbor(id.addr))?;

        match neighbor.retransmit_if_due(now, &policy, transport) {
            Ok(true) => {
                // First transmission is not a retransmission
                if neighbor.queue().head().is_some_and(|h| h.retrans_count() > 1) {
                    iface.counters().retransmission();
                }
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e @ RtpError::RetransmitLimit { .. }) => {
                self.teardown_neighbor(id)?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Hand out `counter` and advance it, wrapping past zero
pub(crate) fn take_sequence(counter: &mut u32) -> u32 {
    let seq = *counter;
    *counter = match seq.wrapping_add(1) {
        0 => 1,
        next => next,
    };
    seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterfaceConfig;

    #[test]
    fn test_sequence_skips_zero_on_wrap() {
        let mut process = Process::new(1, Ipv4Addr::new(10, 0, 0, 1));
        process.sequence_number = u32::MAX;
        assert_eq!(process.next_sequence(), u32::MAX);
        assert_eq!(process.next_sequence(), 1);
        assert_eq!(process.next_sequence(), 2);
    }

    #[test]
    fn test_from_config_builds_interfaces() {
        let config = RtpConfig::default_with_overrides(|c| {
            c.process.asn = 100;
            c.process.initial_sequence = 50;
            c.interfaces.push(InterfaceConfig::default());
            c.interfaces.push(InterfaceConfig {
                ifindex: 2,
                name: "eth1".into(),
                ..InterfaceConfig::default()
            });
        });

        let process = Process::from_config(&config).expect("valid config");
        assert_eq!(process.asn(), 100);
        assert_eq!(process.sequence_number(), 50);
        assert_eq!(process.interfaces().len(), 2);
        assert_eq!(process.interface(2).map(|i| i.name()), Some("eth1"));
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = RtpConfig::default_with_overrides(|c| c.process.asn = 0);
        assert!(matches!(
            Process::from_config(&config),
            Err(RtpError::ConfigError(_))
        ));
    }

    #[test]
    fn test_teardown_unknown_neighbor() {
        let mut process = Process::new(1, Ipv4Addr::new(10, 0, 0, 1));
        process.add_interface(Interface::new(1, "eth0", 1500));
        let id = NeighborId::new(1, Ipv4Addr::new(10, 0, 0, 9));
        assert!(matches!(
            process.teardown_neighbor(id),
            Err(RtpError::UnknownNeighbor(_))
        ));
        assert!(matches!(
            process.teardown_neighbor(NeighborId::new(7, id.addr)),
            Err(RtpError::UnknownInterface(7))
        ));
    }
}
