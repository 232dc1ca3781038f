mod common;

use std::time::Duration;

use pnet::packet::ethernet::EthernetPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;

use rups::{testing, Datagram};

use common::*;

const SRC_PORT: u16 = 1234;
const DST_PORT: u16 = 1337;
const PAYLOAD: &[u8] = b"abcde";

fn expected_datagram() -> Datagram {
    Datagram {
        src_ip: REMOTE_IP,
        src_port: SRC_PORT,
        data: PAYLOAD.to_vec(),
    }
}

#[test]
fn delivers_to_bound_port() {
    let (stack, adapter, _read_handle) = testing::dummy_stack();
    stack.udp().open_port(None, DST_PORT).unwrap();

    let frame = udp_frame(REMOTE_IP, LOCAL_IP, SRC_PORT, DST_PORT, PAYLOAD);
    stack.add_packet(frame, &adapter);

    assert_eq!(stack.udp().get_packet(None, DST_PORT).unwrap(), expected_datagram());
}

#[test]
fn specific_binding_preferred_over_wildcard() {
    let (stack, adapter, _read_handle) = testing::dummy_stack();
    stack.udp().open_port(Some(LOCAL_IP), DST_PORT).unwrap();
    stack.udp().open_port(None, DST_PORT).unwrap();

    let frame = udp_frame(REMOTE_IP, LOCAL_IP, SRC_PORT, DST_PORT, PAYLOAD);
    stack.add_packet(frame.clone(), &adapter);
    assert_eq!(
        stack.udp().get_packet(Some(LOCAL_IP), DST_PORT).unwrap(),
        expected_datagram()
    );

    // with the specific binding gone the wildcard queue takes over
    stack.udp().close_port(Some(LOCAL_IP), DST_PORT);
    stack.add_packet(frame, &adapter);
    assert_eq!(stack.udp().get_packet(None, DST_PORT).unwrap(), expected_datagram());
}

#[test]
fn unbound_port_answers_port_unreachable() {
    let (stack, adapter, read_handle) = testing::dummy_stack();
    stack.arp().add_arp_entry(&adapter, REMOTE_IP, REMOTE_MAC);

    let frame = udp_frame(REMOTE_IP, LOCAL_IP, SRC_PORT, DST_PORT, PAYLOAD);
    stack.add_packet(frame.clone(), &adapter);

    let reply = read_handle.recv_timeout(Duration::from_secs(1)).unwrap();
    let eth = EthernetPacket::new(&reply).unwrap();
    assert_eq!(eth.get_destination(), REMOTE_MAC);
    let ip = Ipv4Packet::new(eth.payload()).unwrap();
    assert_eq!(ip.get_destination(), REMOTE_IP);
    let icmp = IcmpPacket::new(ip.payload()).unwrap();
    assert_eq!(icmp.get_icmp_type(), IcmpTypes::DestinationUnreachable);
    assert_eq!(icmp.get_icmp_code(), IcmpCode::new(3));
    // the error encloses the offending ip header and udp datagram
    assert_eq!(&icmp.payload()[4..], &frame[14..]);
}

#[test]
fn zero_checksum_is_accepted() {
    let (stack, adapter, _read_handle) = testing::dummy_stack();
    stack.udp().open_port(None, DST_PORT).unwrap();

    let mut frame = udp_frame(REMOTE_IP, LOCAL_IP, SRC_PORT, DST_PORT, PAYLOAD);
    frame[UDP_CHECKSUM_OFFSET..UDP_CHECKSUM_OFFSET + 2].copy_from_slice(&[0, 0]);
    stack.add_packet(frame, &adapter);

    assert_eq!(stack.udp().get_packet(None, DST_PORT).unwrap(), expected_datagram());
}

#[test]
fn bad_checksum_is_dropped() {
    let (stack, adapter, _read_handle) = testing::dummy_stack();
    stack.udp().open_port(None, DST_PORT).unwrap();

    let mut frame = udp_frame(REMOTE_IP, LOCAL_IP, SRC_PORT, DST_PORT, PAYLOAD);
    corrupt_u16(&mut frame, UDP_CHECKSUM_OFFSET);
    stack.add_packet(frame, &adapter);
    wait_for(|| stack.dropped_frames() == 1);

    // a good datagram still goes through afterwards
    let frame = udp_frame(REMOTE_IP, LOCAL_IP, SRC_PORT, DST_PORT, PAYLOAD);
    stack.add_packet(frame, &adapter);
    assert_eq!(stack.udp().get_packet(None, DST_PORT).unwrap(), expected_datagram());
}

#[test]
fn bogus_length_is_dropped() {
    let (stack, adapter, _read_handle) = testing::dummy_stack();
    stack.udp().open_port(None, DST_PORT).unwrap();

    let mut frame = udp_frame(REMOTE_IP, LOCAL_IP, SRC_PORT, DST_PORT, PAYLOAD);
    // length field shorter than the udp header itself
    let length_offset = 14 + 20 + 4;
    frame[length_offset..length_offset + 2].copy_from_slice(&4u16.to_be_bytes());
    stack.add_packet(frame, &adapter);

    wait_for(|| stack.dropped_frames() == 1);
}

#[test]
fn dont_fragment_bit_is_tolerated() {
    let (stack, adapter, _read_handle) = testing::dummy_stack();
    stack.udp().open_port(None, DST_PORT).unwrap();

    let datagram = udp_datagram(REMOTE_IP, LOCAL_IP, SRC_PORT, DST_PORT, PAYLOAD);
    let frame = ipv4_frame_with_flags(REMOTE_IP, LOCAL_IP, 64, 0b010, 17, &datagram);
    stack.add_packet(frame, &adapter);

    assert_eq!(stack.udp().get_packet(None, DST_PORT).unwrap(), expected_datagram());
}

#[test]
fn payload_bytes_are_unmodified() {
    let (stack, adapter, _read_handle) = testing::dummy_stack();
    stack.udp().open_port(None, DST_PORT).unwrap();

    let payload: Vec<u8> = (0..=255).collect();
    let frame = udp_frame(REMOTE_IP, LOCAL_IP, SRC_PORT, DST_PORT, &payload);
    stack.add_packet(frame, &adapter);

    let datagram = stack.udp().get_packet(None, DST_PORT).unwrap();
    assert_eq!(datagram.data, payload);
}
