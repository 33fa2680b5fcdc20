//! Adjacent routers and their reliable-delivery state.

use crate::config::ReliableConfig;
use crate::core::codec::CodecKind;
use crate::core::packet::Envelope;
use crate::error::{constants, Result, RtpError};
use crate::protocol::hooks::Transport;
use crate::protocol::retrans::RetransQueue;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::{debug, warn};

/// Neighbor identity: interface plus the neighbor's address on it
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NeighborId {
    pub ifindex: u32,
    pub addr: Ipv4Addr,
}

impl NeighborId {
    pub const fn new(ifindex: u32, addr: Ipv4Addr) -> Self {
        Self { ifindex, addr }
    }
}

impl fmt::Display for NeighborId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{}", self.addr, self.ifindex)
    }
}

/// Adjacency state. Only `Up` neighbors take part in flooding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborState {
    Down,
    Pending,
    Up,
}

#[derive(Debug)]
pub struct Neighbor {
    id: NeighborId,
    state: NeighborState,
    recv_sequence: u32,
    retrans_queue: RetransQueue,
    codec: CodecKind,
}

impl Neighbor {
    /// A freshly discovered neighbor, not yet up
    pub fn new(id: NeighborId) -> Self {
        Self {
            id,
            state: NeighborState::Pending,
            recv_sequence: 0,
            retrans_queue: RetransQueue::new(),
            codec: CodecKind::default(),
        }
    }

    pub fn with_state(mut self, state: NeighborState) -> Self {
        self.state = state;
        self
    }

    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    pub fn id(&self) -> NeighborId {
        self.id
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.id.addr
    }

    pub fn state(&self) -> NeighborState {
        self.state
    }

    pub fn set_state(&mut self, state: NeighborState) {
        self.state = state;
    }

    pub fn is_up(&self) -> bool {
        self.state == NeighborState::Up
    }

    /// Last sequence number received from this neighbor
    pub fn recv_sequence(&self) -> u32 {
        self.recv_sequence
    }

    pub(crate) fn set_recv_sequence(&mut self, sequence: u32) {
        self.recv_sequence = sequence;
    }

    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    pub fn queue(&self) -> &RetransQueue {
        &self.retrans_queue
    }

    /// Queue an envelope for this neighbor and return the new queue length.
    ///
    /// Neighbors that are not up are refused; the envelope is released here.
    pub fn enqueue(&mut self, envelope: Envelope) -> Result<usize> {
        if !self.is_up() {
            warn!(
                neighbor = %self.id,
                state = ?self.state,
                seq = envelope.sequence(),
                "{}",
                constants::ERR_NEIGHBOR_NOT_UP
            );
            return Err(RtpError::NeighborNotUp(self.id.addr));
        }

        let len = self.retrans_queue.push(envelope);
        debug!(neighbor = %self.id, queue_len = len, "Enqueued packet");
        Ok(len)
    }

    /// Transmit the head of the queue. Returns false when there is nothing queued.
    pub fn send_reliably<T: Transport + ?Sized>(&mut self, transport: &mut T) -> bool {
        self.transmit_head(transport, Instant::now())
    }

    fn transmit_head<T: Transport + ?Sized>(&mut self, transport: &mut T, now: Instant) -> bool {
        let id = self.id;
        let Some(head) = self.retrans_queue.head_mut() else {
            return false;
        };

        head.record_transmission(now);
        debug!(
            neighbor = %id,
            opcode = %head.opcode(),
            seq = head.sequence(),
            attempt = head.retrans_count(),
            len = head.len(),
            "Sending packet reliably"
        );
        if let Err(e) = transport.transmit(id, head) {
            warn!(neighbor = %id, error = %e, "{}", constants::ERR_TRANSMIT_FAILED);
        }
        true
    }

    /// Consume an acknowledgement number from this neighbor.
    ///
    /// Pops the head when `ack` matches its sequence and starts sending the
    /// next queued packet, if any.
    pub fn handle_ack<T: Transport + ?Sized>(&mut self, ack: u32, transport: &mut T) -> bool {
        if ack == 0 {
            return false;
        }
        match self.retrans_queue.head() {
            Some(head) if head.sequence() == ack => {}
            _ => return false,
        }

        self.retrans_queue.pop_head();
        debug!(neighbor = %self.id, ack, remaining = self.retrans_queue.len(), "Packet acknowledged");
        if !self.retrans_queue.is_empty() {
            self.send_reliably(transport);
        }
        true
    }

    /// Resend the head if its retransmission interval has elapsed.
    ///
    /// Fails with `RetransmitLimit` once the head has been sent
    /// `max_retransmissions` times; the caller should then tear the neighbor down.
    pub fn retransmit_if_due<T: Transport + ?Sized>(
        &mut self,
        now: Instant,
        policy: &ReliableConfig,
        transport: &mut T,
    ) -> Result<bool> {
        let Some(head) = self.retrans_queue.head() else {
            return Ok(false);
        };

        let due = head
            .last_sent()
            .map_or(true, |sent| now.saturating_duration_since(sent) >= policy.retransmit_interval);
        if !due {
            return Ok(false);
        }
        if head.retrans_count() >= policy.max_retransmissions {
            warn!(
                neighbor = %self.id,
                seq = head.sequence(),
                attempts = head.retrans_count(),
                "{}",
                constants::ERR_RETRANSMIT_LIMIT
            );
            return Err(RtpError::RetransmitLimit {
                neighbor: self.id.addr,
                attempts: head.retrans_count(),
            });
        }

        Ok(self.transmit_head(transport, now))
    }

    /// Mark the neighbor down and release its whole queue
    pub fn teardown(&mut self) -> usize {
        self.state = NeighborState::Down;
        let dropped = self.retrans_queue.drain();
        debug!(neighbor = %self.id, dropped, "Neighbor torn down");
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::header::Opcode;
    use crate::core::packet::PacketBuilder;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingTransport {
        sent: Vec<(NeighborId, u32)>,
    }

    impl Transport for CountingTransport {
        fn transmit(&mut self, neighbor: NeighborId, envelope: &Envelope) -> std::io::Result<()> {
            self.sent.push((neighbor, envelope.sequence()));
            Ok(())
        }
    }

    fn up_neighbor() -> Neighbor {
        Neighbor::new(NeighborId::new(1, Ipv4Addr::new(10, 0, 0, 2))).with_state(NeighborState::Up)
    }

    fn envelope(seq: u32) -> Envelope {
        PacketBuilder::open(Opcode::Reply, 1, 1480, None, None)
            .expect("open")
            .finalize(seq, Ipv4Addr::new(10, 0, 0, 2))
    }

    #[test]
    fn test_enqueue_rejects_down_neighbor() {
        let mut nbr = Neighbor::new(NeighborId::new(1, Ipv4Addr::new(10, 0, 0, 3)));
        assert!(matches!(
            nbr.enqueue(envelope(1)),
            Err(RtpError::NeighborNotUp(_))
        ));
        assert!(nbr.queue().is_empty());
    }

    #[test]
    fn test_ack_advances_queue() {
        let mut nbr = up_neighbor();
        let mut transport = CountingTransport::default();

        assert_eq!(nbr.enqueue(envelope(1)).expect("up"), 1);
        assert!(nbr.send_reliably(&mut transport));
        assert_eq!(nbr.enqueue(envelope(2)).expect("up"), 2);

        assert!(!nbr.handle_ack(7, &mut transport));
        assert!(nbr.handle_ack(1, &mut transport));
        assert_eq!(transport.sent.iter().map(|s| s.1).collect::<Vec<_>>(), vec![1, 2]);
        assert!(nbr.handle_ack(2, &mut transport));
        assert!(nbr.queue().is_empty());
    }

    #[test]
    fn test_retransmit_until_limit() {
        let mut nbr = up_neighbor();
        let mut transport = CountingTransport::default();
        let policy = ReliableConfig {
            retransmit_interval: Duration::from_millis(200),
            max_retransmissions: 2,
        };

        nbr.enqueue(envelope(9)).expect("up");
        let start = Instant::now();
        nbr.transmit_head(&mut transport, start);

        assert!(!nbr
            .retransmit_if_due(start + Duration::from_millis(100), &policy, &mut transport)
            .expect("not due"));
        assert!(nbr
            .retransmit_if_due(start + Duration::from_millis(200), &policy, &mut transport)
            .expect("due"));
        assert!(matches!(
            nbr.retransmit_if_due(start + Duration::from_millis(400), &policy, &mut transport),
            Err(RtpError::RetransmitLimit { attempts: 2, .. })
        ));
        assert_eq!(transport.sent.len(), 2);
    }

    #[test]
    fn test_teardown_drains_queue() {
        let mut nbr = up_neighbor();
        nbr.enqueue(envelope(1)).expect("up");
        nbr.enqueue(envelope(2)).expect("up");
        assert_eq!(nbr.teardown(), 2);
        assert_eq!(nbr.state(), NeighborState::Down);
        assert!(nbr.enqueue(envelope(3)).is_err());
    }
}
