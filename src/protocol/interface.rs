//! EIGRP-enabled interfaces and the neighbors reached over them.

use crate::config::InterfaceConfig;
use crate::core::codec::CodecKind;
use crate::core::packet::{packet_mtu, AuthKey};
use crate::protocol::neighbor::{Neighbor, NeighborId};
use crate::utils::metrics::PacketCounters;
use std::net::Ipv4Addr;
use tracing::debug;

#[derive(Debug)]
pub struct Interface {
    ifindex: u32,
    name: String,
    mtu: u32,
    auth: Option<AuthKey>,
    neighbors: Vec<Neighbor>,
    counters: PacketCounters,
}

impl Interface {
    pub fn new(ifindex: u32, name: impl Into<String>, mtu: u32) -> Self {
        Self {
            ifindex,
            name: name.into(),
            mtu,
            auth: None,
            neighbors: Vec::new(),
            counters: PacketCounters::new(),
        }
    }

    pub fn from_config(config: &InterfaceConfig) -> Self {
        let mut iface = Self::new(config.ifindex, config.name.clone(), config.mtu);
        iface.auth = config.auth.key();
        iface
    }

    pub fn with_auth(mut self, auth: AuthKey) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical MTU
    pub fn mtu(&self) -> u32 {
        self.mtu
    }

    /// Largest EIGRP packet this interface can carry
    pub fn packet_mtu(&self) -> usize {
        packet_mtu(self.mtu)
    }

    /// Key used when keyed MD5 authentication is active
    pub fn auth(&self) -> Option<&AuthKey> {
        self.auth.as_ref()
    }

    pub fn counters(&self) -> &PacketCounters {
        &self.counters
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub(crate) fn neighbors_mut(&mut self) -> &mut [Neighbor] {
        &mut self.neighbors
    }

    pub fn up_neighbors(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter().filter(|n| n.is_up())
    }

    pub fn neighbor(&self, addr: Ipv4Addr) -> Option<&Neighbor> {
        self.neighbors.iter().find(|n| n.addr() == addr)
    }

    pub fn neighbor_mut(&mut self, addr: Ipv4Addr) -> Option<&mut Neighbor> {
        self.neighbors.iter_mut().find(|n| n.addr() == addr)
    }

    /// Add a neighbor, replacing any previous one with the same address
    pub fn add_neighbor(&mut self, neighbor: Neighbor) -> NeighborId {
        let id = neighbor.id();
        self.neighbors.retain(|n| n.addr() != id.addr);
        self.neighbors.push(neighbor);
        id
    }

    /// Find the neighbor at `addr`, creating a pending one if none exists
    pub fn neighbor_get_or_insert(&mut self, addr: Ipv4Addr) -> &mut Neighbor {
        let idx = match self.neighbors.iter().position(|n| n.addr() == addr) {
            Some(idx) => idx,
            None => {
                debug!(interface = %self.name, neighbor = %addr, "Creating neighbor");
                self.neighbors
                    .push(Neighbor::new(NeighborId::new(self.ifindex, addr)));
                self.neighbors.len() - 1
            }
        };
        &mut self.neighbors[idx]
    }

    /// Tear down and remove a neighbor; returns how many queued packets were released
    pub fn remove_neighbor(&mut self, addr: Ipv4Addr) -> Option<usize> {
        let idx = self.neighbors.iter().position(|n| n.addr() == addr)?;
        let mut neighbor = self.neighbors.remove(idx);
        Some(neighbor.teardown())
    }

    /// Codec used for multicast packets on this interface
    pub fn codec(&self) -> CodecKind {
        self.up_neighbors()
            .next()
            .map(|n| n.codec())
            .unwrap_or_default()
    }
}
