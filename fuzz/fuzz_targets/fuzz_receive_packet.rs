#![no_main]

use bytes::Bytes;
use eigrp_rtp::core::packet::Envelope;
use eigrp_rtp::protocol::interface::Interface;
use eigrp_rtp::{FsmEvent, Neighbor, NeighborId, NeighborState, Process, ProtocolHooks, Transport};
use libfuzzer_sys::fuzz_target;
use std::net::Ipv4Addr;

struct NullHooks;

impl Transport for NullHooks {
    fn transmit(&mut self, _: NeighborId, _: &Envelope) -> std::io::Result<()> {
        Ok(())
    }
}

impl ProtocolHooks for NullHooks {
    fn send_ack(&mut self, _: &Neighbor) {}
    fn send_updates(&mut self, _: &Interface) {}
    fn fsm_event(&mut self, _: &FsmEvent<'_>) {}
}

fuzz_target!(|data: &[u8]| {
    // Fuzz the raw receive path - test for panics, crashes, infinite loops
    let source = Ipv4Addr::new(10, 0, 0, 2);
    let mut process = Process::new(1, Ipv4Addr::new(10, 0, 0, 1));
    let mut iface = Interface::new(1, "eth0", 1500);
    iface.add_neighbor(Neighbor::new(NeighborId::new(1, source)).with_state(NeighborState::Up));
    process.add_interface(iface);

    let _ = process.receive_packet(1, source, Bytes::copy_from_slice(data), &mut NullHooks);
});
