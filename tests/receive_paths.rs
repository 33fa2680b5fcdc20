//! Integration tests for the Query, Reply and SIA-Query receive paths
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use bytes::Bytes;
use common::*;
use eigrp_rtp::core::header::PacketHeader;
use eigrp_rtp::core::packet::AuthKey;
use eigrp_rtp::core::tlv::{Metric, MAX_METRIC};
use eigrp_rtp::protocol::topology::{PrefixDescriptor, RouteDescriptor};
use eigrp_rtp::{NeighborState, Opcode, RtpError};
use std::net::Ipv4Addr;

fn known(process: &mut eigrp_rtp::Process, dest: &str, with_route_from: Option<u8>) {
    let mut prefix = PrefixDescriptor::new(net(dest), Metric::default());
    if let Some(last) = with_route_from {
        prefix.insert_route(RouteDescriptor {
            neighbor: nbr_id(last),
            next_hop: addr(last),
            reported_metric: Metric::default(),
            total_metric: Metric::default(),
        });
    }
    process.topology_mut().insert(prefix);
}

#[test]
fn test_reply_inbound_filter_forces_max_metric() {
    let mut process = process_with(1500, &[(2, NeighborState::Up)], None);
    known(&mut process, "10.1.0.0/16", Some(2));
    let mut hooks = RecordingHooks::default();
    hooks.deny_in.insert(net("10.1.0.0/16"));

    let packet = wire_packet(Opcode::Reply, 5, 0, &[route("10.1.0.0/16", 2560)], None);
    let header = PacketHeader::new(Opcode::Reply, ASN, 5, 0);
    let summary = process
        .handle_reply(1, addr(2), &header, body(&packet), &mut hooks)
        .expect("handled");

    assert_eq!(summary.events, 1);
    let event = &hooks.events[0];
    assert_eq!(event.packet_type, Opcode::Reply);
    assert_eq!(event.delay, MAX_METRIC);
    assert!(event.had_route);
    assert_eq!(hooks.acks, vec![nbr_id(2)]);
}

#[test]
fn test_reply_auth_tlv_then_unknown_destination() {
    let key = AuthKey::new(1, "k");
    let mut process = process_with(1500, &[(2, NeighborState::Up)], Some(key.clone()));
    let mut hooks = RecordingHooks::default();

    let packet = wire_packet(Opcode::Reply, 9, 0, &[route("192.0.2.0/24", 10)], Some(&key));
    let summary = process
        .receive_packet(1, addr(2), Bytes::from(packet), &mut hooks)
        .expect("handled");

    assert_eq!(summary.events, 0);
    assert_eq!(summary.unknown_destinations, 1);
    assert!(hooks.events.is_empty());
    assert_eq!(hooks.acks, vec![nbr_id(2)]);
    let counters = process.interface(1).expect("eth0").counters().snapshot();
    assert_eq!(counters.unknown_destinations, 1);
    assert_eq!(counters.replies_received, 1);
}

#[test]
fn test_reply_continues_after_unknown_destination() {
    let mut process = process_with(1500, &[(2, NeighborState::Up)], None);
    known(&mut process, "10.1.0.0/16", None);
    let mut hooks = RecordingHooks::default();

    let packet = wire_packet(
        Opcode::Reply,
        3,
        0,
        &[route("192.0.2.0/24", 10), route("10.1.0.0/16", 20)],
        None,
    );
    let summary = process
        .receive_packet(1, addr(2), Bytes::from(packet), &mut hooks)
        .expect("handled");

    assert_eq!(summary.unknown_destinations, 1);
    assert_eq!(summary.events, 1);
    assert_eq!(hooks.events[0].prefix, net("10.1.0.0/16"));
    assert!(!hooks.events[0].had_route);
}

#[test]
fn test_reply_from_new_neighbor_creates_it() {
    let mut process = process_with(1500, &[], None);
    known(&mut process, "10.1.0.0/16", None);
    let mut hooks = RecordingHooks::default();

    let packet = wire_packet(Opcode::Reply, 77, 0, &[route("10.1.0.0/16", 20)], None);
    process
        .receive_packet(1, addr(5), Bytes::from(packet), &mut hooks)
        .expect("handled");

    let neighbor = process.neighbor(nbr_id(5)).expect("created");
    assert_eq!(neighbor.state(), NeighborState::Pending);
    assert_eq!(neighbor.recv_sequence(), 77);
    assert_eq!(hooks.events.len(), 1);
}

#[test]
fn test_events_follow_wire_order() {
    let mut process = process_with(1500, &[(2, NeighborState::Up)], None);
    let dests = ["10.3.0.0/16", "10.1.0.0/16", "10.2.0.0/16"];
    for d in dests {
        known(&mut process, d, None);
    }
    let mut hooks = RecordingHooks::default();

    let routes: Vec<_> = dests.iter().map(|d| route(d, 1)).collect();
    let packet = wire_packet(Opcode::Query, 4, 0, &routes, None);
    process
        .receive_packet(1, addr(2), Bytes::from(packet), &mut hooks)
        .expect("handled");

    let seen: Vec<_> = hooks.events.iter().map(|e| e.prefix).collect();
    assert_eq!(seen, dests.iter().map(|d| net(d)).collect::<Vec<_>>());
}

#[test]
fn test_truncated_tlv_keeps_earlier_records() {
    let mut process = process_with(1500, &[(2, NeighborState::Up)], None);
    known(&mut process, "10.1.0.0/16", None);
    known(&mut process, "10.2.0.0/16", None);
    let mut hooks = RecordingHooks::default();

    let packet = wire_packet(
        Opcode::Query,
        8,
        0,
        &[route("10.1.0.0/16", 1), route("10.2.0.0/16", 1)],
        None,
    );
    // Cut the second TLV short
    let mut region = body(&packet).to_vec();
    region.truncate(region.len() - 5);
    let header = PacketHeader::new(Opcode::Query, ASN, 8, 0);

    let summary = process
        .handle_query(nbr_id(2), &header, Bytes::from(region), &mut hooks)
        .expect("handled");

    assert!(summary.malformed);
    assert_eq!(summary.events, 1);
    assert_eq!(hooks.events[0].prefix, net("10.1.0.0/16"));
    // Adjacency untouched, ack still sent
    assert!(process.neighbor(nbr_id(2)).expect("neighbor").is_up());
    assert_eq!(hooks.acks, vec![nbr_id(2)]);
    assert_eq!(
        process.interface(1).expect("eth0").counters().snapshot().decode_errors,
        1
    );
}

#[test]
fn test_query_triggers_flood_and_updates() {
    let mut process = process_with(1500, &[(2, NeighborState::Up), (3, NeighborState::Up)], None);
    flag_for_query(&mut process, &["172.16.0.0/12"]);
    let mut hooks = RecordingHooks::default();

    let packet = wire_packet(Opcode::Query, 12, 0, &[route("10.9.0.0/16", 1)], None);
    process
        .receive_packet(1, addr(2), Bytes::from(packet), &mut hooks)
        .expect("handled");

    assert_eq!(hooks.events.len(), 1);
    assert_eq!(hooks.update_runs, vec![1]);
    // The pending Query went out to both neighbors
    assert_eq!(hooks.transmissions.len(), 2);
    assert!(hooks
        .transmissions
        .iter()
        .all(|t| t.1 == Opcode::Query));
}

#[test]
fn test_sia_query_dispatches_with_its_packet_type() {
    let mut process = process_with(1500, &[(2, NeighborState::Up)], None);
    known(&mut process, "10.1.0.0/16", Some(2));
    let mut hooks = RecordingHooks::default();

    let packet = wire_packet(Opcode::SiaQuery, 21, 0, &[route("10.1.0.0/16", 64)], None);
    process
        .receive_packet(1, addr(2), Bytes::from(packet), &mut hooks)
        .expect("handled");

    assert_eq!(hooks.events.len(), 1);
    assert_eq!(hooks.events[0].packet_type, Opcode::SiaQuery);
    assert_eq!(hooks.events[0].delay, 64);
    assert!(hooks.events[0].had_route);
    assert_eq!(hooks.update_runs, vec![1]);
}

#[test]
fn test_receive_rejects_bad_packets() {
    let key = AuthKey::new(1, "k");
    let mut process = process_with(1500, &[(2, NeighborState::Up)], Some(key.clone()));
    let mut hooks = RecordingHooks::default();

    let wrong_key = wire_packet(Opcode::Reply, 1, 0, &[], Some(&AuthKey::new(1, "x")));
    assert!(matches!(
        process.receive_packet(1, addr(2), Bytes::from(wrong_key), &mut hooks),
        Err(RtpError::AuthenticationFailure(_))
    ));

    let mut corrupt = wire_packet(Opcode::Reply, 1, 0, &[], Some(&key));
    corrupt[2] ^= 0xFF;
    assert!(matches!(
        process.receive_packet(1, addr(2), Bytes::from(corrupt), &mut hooks),
        Err(RtpError::ChecksumMismatch { .. })
    ));

    let hello = wire_packet(Opcode::Hello, 0, 0, &[], Some(&key));
    assert!(matches!(
        process.receive_packet(1, addr(2), Bytes::from(hello), &mut hooks),
        Err(RtpError::UnexpectedOpcode(5))
    ));

    let short = vec![2u8, 3, 0, 0];
    assert!(matches!(
        process.receive_packet(1, addr(2), Bytes::from(short), &mut hooks),
        Err(RtpError::TruncatedHeader(4))
    ));

    assert!(matches!(
        process.receive_packet(9, Ipv4Addr::new(10, 0, 0, 2), Bytes::new(), &mut hooks),
        Err(RtpError::UnknownInterface(9))
    ));

    assert!(hooks.events.is_empty());
    assert!(hooks.acks.is_empty());
}
