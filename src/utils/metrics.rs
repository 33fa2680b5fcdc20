//! Packet counters
//!
//! Per-interface statistics for the Query/Reply/SIA-Query transport.
//!
//! Uses atomic counters so receive handlers can record through a shared
//! reference while they hold other borrows of the interface.

use crate::core::header::Opcode;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Counters for one interface
#[derive(Debug, Default)]
pub struct PacketCounters {
    /// Query packets received
    pub queries_received: AtomicU64,
    /// Reply packets received
    pub replies_received: AtomicU64,
    /// SIA-Query packets received
    pub sia_queries_received: AtomicU64,
    /// Query packets built
    pub queries_sent: AtomicU64,
    /// Reply packets built
    pub replies_sent: AtomicU64,
    /// SIA-Query packets built
    pub sia_queries_sent: AtomicU64,
    /// Packets whose TLV stream was cut short by a decode failure
    pub decode_errors: AtomicU64,
    /// Records naming a destination missing from the topology table
    pub unknown_destinations: AtomicU64,
    /// Envelopes refused because the neighbor was not up
    pub rejected_enqueues: AtomicU64,
    /// Timer-driven resends
    pub retransmissions: AtomicU64,
}

impl PacketCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received packet
    pub fn packet_received(&self, opcode: Opcode) {
        match opcode {
            Opcode::Query => self.queries_received.fetch_add(1, Ordering::Relaxed),
            Opcode::Reply => self.replies_received.fetch_add(1, Ordering::Relaxed),
            Opcode::SiaQuery => self.sia_queries_received.fetch_add(1, Ordering::Relaxed),
            _ => return,
        };
    }

    /// Record a finalized outbound packet
    pub fn packet_sent(&self, opcode: Opcode) {
        match opcode {
            Opcode::Query => self.queries_sent.fetch_add(1, Ordering::Relaxed),
            Opcode::Reply => self.replies_sent.fetch_add(1, Ordering::Relaxed),
            Opcode::SiaQuery => self.sia_queries_sent.fetch_add(1, Ordering::Relaxed),
            _ => return,
        };
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_destination(&self) {
        self.unknown_destinations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected_enqueue(&self) {
        self.rejected_enqueues.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retransmission(&self) {
        self.retransmissions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current counter values
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            queries_received: self.queries_received.load(Ordering::Relaxed),
            replies_received: self.replies_received.load(Ordering::Relaxed),
            sia_queries_received: self.sia_queries_received.load(Ordering::Relaxed),
            queries_sent: self.queries_sent.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            sia_queries_sent: self.sia_queries_sent.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unknown_destinations: self.unknown_destinations.load(Ordering::Relaxed),
            rejected_enqueues: self.rejected_enqueues.load(Ordering::Relaxed),
            retransmissions: self.retransmissions.load(Ordering::Relaxed),
        }
    }

    /// Log current counters
    pub fn log_counters(&self, interface: &str) {
        let snapshot = self.snapshot();
        info!(
            interface,
            queries_received = snapshot.queries_received,
            replies_received = snapshot.replies_received,
            sia_queries_received = snapshot.sia_queries_received,
            queries_sent = snapshot.queries_sent,
            replies_sent = snapshot.replies_sent,
            sia_queries_sent = snapshot.sia_queries_sent,
            decode_errors = snapshot.decode_errors,
            unknown_destinations = snapshot.unknown_destinations,
            rejected_enqueues = snapshot.rejected_enqueues,
            retransmissions = snapshot.retransmissions,
            "Interface packet counters"
        );
    }
}

/// Snapshot of counters at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub queries_received: u64,
    pub replies_received: u64,
    pub sia_queries_received: u64,
    pub queries_sent: u64,
    pub replies_sent: u64,
    pub sia_queries_sent: u64,
    pub decode_errors: u64,
    pub unknown_destinations: u64,
    pub rejected_enqueues: u64,
    pub retransmissions: u64,
}
