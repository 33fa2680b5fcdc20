//! Topology table of destination prefixes and the routes neighbors report for them.

use crate::core::tlv::{Metric, RouteRecord};
use crate::protocol::neighbor::NeighborId;
use bitflags::bitflags;
use ipnetwork::Ipv4Network;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

bitflags! {
    /// Work still owed for a prefix
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RequiredAction: u8 {
        const NEED_UPDATE = 0x01;
        const NEED_QUERY = 0x02;
    }
}

/// One neighbor's report of a destination
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub neighbor: NeighborId,
    pub next_hop: Ipv4Addr,
    /// Metric as advertised by the neighbor
    pub reported_metric: Metric,
    /// Metric including the local link
    pub total_metric: Metric,
}

/// Topology entry for one destination
#[derive(Clone, Debug)]
pub struct PrefixDescriptor {
    destination: Ipv4Network,
    reported_metric: Metric,
    entries: BTreeMap<NeighborId, RouteDescriptor>,
    req_action: RequiredAction,
    rij: BTreeSet<NeighborId>,
}

impl PrefixDescriptor {
    pub fn new(destination: Ipv4Network, reported_metric: Metric) -> Self {
        Self {
            destination,
            reported_metric,
            entries: BTreeMap::new(),
            req_action: RequiredAction::empty(),
            rij: BTreeSet::new(),
        }
    }

    pub fn destination(&self) -> Ipv4Network {
        self.destination
    }

    /// Metric this router advertises for the destination
    pub fn reported_metric(&self) -> Metric {
        self.reported_metric
    }

    pub fn set_reported_metric(&mut self, metric: Metric) {
        self.reported_metric = metric;
    }

    /// Record advertised to neighbors in Query/Reply/SIA-Query packets
    pub fn advertisement(&self) -> RouteRecord {
        RouteRecord {
            destination: self.destination,
            next_hop: Ipv4Addr::UNSPECIFIED,
            metric: self.reported_metric,
        }
    }

    pub fn route(&self, neighbor: NeighborId) -> Option<&RouteDescriptor> {
        self.entries.get(&neighbor)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.entries.values()
    }

    /// Insert or replace the route reported by `route.neighbor`
    pub fn insert_route(&mut self, route: RouteDescriptor) -> Option<RouteDescriptor> {
        self.entries.insert(route.neighbor, route)
    }

    pub fn remove_route(&mut self, neighbor: NeighborId) -> Option<RouteDescriptor> {
        self.entries.remove(&neighbor)
    }

    pub fn required_action(&self) -> RequiredAction {
        self.req_action
    }

    pub fn needs(&self, action: RequiredAction) -> bool {
        self.req_action.contains(action)
    }

    /// Neighbors a Query went to that still owe a Reply
    pub fn routers_in_jeopardy(&self) -> &BTreeSet<NeighborId> {
        &self.rij
    }

    pub fn add_jeopardy(&mut self, neighbor: NeighborId) -> bool {
        self.rij.insert(neighbor)
    }

    /// Returns whether the neighbor was still owed a Reply
    pub fn clear_jeopardy(&mut self, neighbor: NeighborId) -> bool {
        self.rij.remove(&neighbor)
    }
}

/// Per-process topology table with an ordered list of changed prefixes
#[derive(Debug, Default)]
pub struct TopologyTable {
    prefixes: BTreeMap<Ipv4Network, PrefixDescriptor>,
    changes: Vec<Ipv4Network>,
}

impl TopologyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn lookup(&self, destination: &Ipv4Network) -> Option<&PrefixDescriptor> {
        self.prefixes.get(destination)
    }

    pub fn lookup_mut(&mut self, destination: &Ipv4Network) -> Option<&mut PrefixDescriptor> {
        self.prefixes.get_mut(destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrefixDescriptor> {
        self.prefixes.values()
    }

    /// Insert a descriptor, returning the one it replaced
    pub fn insert(&mut self, prefix: PrefixDescriptor) -> Option<PrefixDescriptor> {
        self.prefixes.insert(prefix.destination(), prefix)
    }

    /// Remove a destination once no neighbor reports it any more
    pub fn remove(&mut self, destination: &Ipv4Network) -> Option<PrefixDescriptor> {
        if self.prefixes.get(destination)?.entries.is_empty() {
            self.changes.retain(|d| d != destination);
            return self.prefixes.remove(destination);
        }
        None
    }

    /// Flag work for a destination and place it on the change list
    pub fn flag(&mut self, destination: &Ipv4Network, action: RequiredAction) -> bool {
        let Some(prefix) = self.prefixes.get_mut(destination) else {
            return false;
        };
        prefix.req_action.insert(action);
        if !self.changes.contains(destination) {
            self.changes.push(*destination);
        }
        true
    }

    /// Clear `action` on a destination; drops it from the change list once nothing is owed
    pub fn clear_flag(&mut self, destination: &Ipv4Network, action: RequiredAction) {
        if let Some(prefix) = self.prefixes.get_mut(destination) {
            prefix.req_action.remove(action);
            if prefix.req_action.is_empty() {
                self.changes.retain(|d| d != destination);
            }
        }
    }

    /// Changed destinations in the order they were flagged
    pub fn changes(&self) -> &[Ipv4Network] {
        &self.changes
    }

    /// Changed destinations currently flagged with `action`
    pub fn pending(&self, action: RequiredAction) -> Vec<Ipv4Network> {
        self.changes
            .iter()
            .filter(|d| self.prefixes.get(*d).is_some_and(|p| p.needs(action)))
            .copied()
            .collect()
    }

    /// Drop every trace of a neighbor that went away
    pub fn forget_neighbor(&mut self, neighbor: NeighborId) {
        for prefix in self.prefixes.values_mut() {
            prefix.entries.remove(&neighbor);
            prefix.rij.remove(&neighbor);
        }
    }
}
