//! Per-neighbor retransmission queue.
//!
//! Packets wait here until the neighbor acknowledges them. Only the head is
//! ever on the wire: a send cycle starts when a push turns an empty queue
//! non-empty, and every acknowledgement that pops the head starts the next one.

use crate::core::packet::Envelope;
use std::collections::VecDeque;

/// FIFO of unacknowledged envelopes for one neighbor
#[derive(Debug, Default)]
pub struct RetransQueue {
    entries: VecDeque<Envelope>,
}

impl RetransQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail and return the new length.
    ///
    /// A return value of 1 means the queue was empty and the caller must start
    /// a reliable send for this neighbor.
    pub fn push(&mut self, envelope: Envelope) -> usize {
        self.entries.push_back(envelope);
        self.entries.len()
    }

    /// The packet currently being transmitted
    pub fn head(&self) -> Option<&Envelope> {
        self.entries.front()
    }

    pub(crate) fn head_mut(&mut self) -> Option<&mut Envelope> {
        self.entries.front_mut()
    }

    /// Remove the head once it has been acknowledged
    pub fn pop_head(&mut self) -> Option<Envelope> {
        self.entries.pop_front()
    }

    /// Release every queued envelope in one step; returns how many were dropped
    pub fn drain(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.entries.iter()
    }
}
