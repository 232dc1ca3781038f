mod common;

use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

use pnet::packet::arp::{ArpOperations, ArpPacket};
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::Packet;

use rups::ethernet::{EthernetProtocol, MacResolver};
use rups::{testing, TxOptions, BROADCAST_MAC};

use common::*;

#[test]
fn replies_to_request() {
    let (stack, adapter, read_handle) = testing::dummy_stack();
    let frame = arp_frame(
        ArpOperations::Request,
        BROADCAST_MAC,
        REMOTE_MAC,
        REMOTE_IP,
        BROADCAST_MAC,
        LOCAL_IP,
    );
    stack.add_packet(frame, &adapter);

    let reply = read_handle.recv_timeout(Duration::from_secs(1)).unwrap();
    let eth = EthernetPacket::new(&reply).unwrap();
    assert_eq!(eth.get_destination(), REMOTE_MAC);
    assert_eq!(eth.get_source(), LOCAL_MAC);
    assert_eq!(eth.get_ethertype(), EtherTypes::Arp);

    let arp = ArpPacket::new(eth.payload()).unwrap();
    assert_eq!(arp.get_operation(), ArpOperations::Reply);
    assert_eq!(arp.get_sender_hw_addr(), LOCAL_MAC);
    assert_eq!(arp.get_sender_proto_addr(), LOCAL_IP);
    assert_eq!(arp.get_target_hw_addr(), REMOTE_MAC);
    assert_eq!(arp.get_target_proto_addr(), REMOTE_IP);
}

#[test]
fn request_for_someone_else_is_ignored() {
    let (stack, adapter, read_handle) = testing::dummy_stack();
    let frame = arp_frame(
        ArpOperations::Request,
        BROADCAST_MAC,
        REMOTE_MAC,
        REMOTE_IP,
        BROADCAST_MAC,
        Ipv4Addr::new(9, 9, 9, 9),
    );
    stack.add_packet(frame, &adapter);

    assert!(read_handle.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn natural_mac_resolution() {
    let (stack, adapter, read_handle) = testing::dummy_stack();

    // This send has no destination MAC, so it suspends on ARP resolution
    let send_stack = stack.clone();
    let send_adapter = adapter.clone();
    let sender = thread::spawn(move || {
        send_stack.send(
            EthernetProtocol::NAME,
            REMOTE_IP,
            Some(&send_adapter),
            TxOptions::new().with_previous_protocol_id(0x2000),
        )
    });

    let request = read_handle.recv_timeout(Duration::from_secs(1)).unwrap();
    let eth = EthernetPacket::new(&request).unwrap();
    assert_eq!(eth.get_destination(), BROADCAST_MAC);
    assert_eq!(eth.get_ethertype(), EtherTypes::Arp);
    let arp = ArpPacket::new(eth.payload()).unwrap();
    assert_eq!(arp.get_operation(), ArpOperations::Request);
    assert_eq!(arp.get_sender_hw_addr(), LOCAL_MAC);
    assert_eq!(arp.get_target_proto_addr(), REMOTE_IP);

    let reply = arp_frame(
        ArpOperations::Reply,
        LOCAL_MAC,
        REMOTE_MAC,
        REMOTE_IP,
        LOCAL_MAC,
        LOCAL_IP,
    );
    stack.add_packet(reply, &adapter);

    let frame = read_handle.recv_timeout(Duration::from_secs(1)).unwrap();
    let eth = EthernetPacket::new(&frame).unwrap();
    assert_eq!(eth.get_destination(), REMOTE_MAC);
    assert_eq!(eth.get_source(), LOCAL_MAC);
    assert_eq!(eth.get_ethertype(), EtherType::new(0x2000));

    sender.join().unwrap().unwrap();
}

#[test]
fn learns_from_incoming_reply() {
    let (stack, adapter, _read_handle) = testing::dummy_stack();
    let reply = arp_frame(
        ArpOperations::Reply,
        LOCAL_MAC,
        REMOTE_MAC,
        REMOTE_IP,
        LOCAL_MAC,
        LOCAL_IP,
    );
    stack.add_packet(reply, &adapter);

    let mac = stack.arp().get_mac(&stack, &adapter, REMOTE_IP).unwrap();
    assert_eq!(mac, REMOTE_MAC);
}

#[test]
fn manual_entry_resolves_synchronously() {
    let (stack, adapter, read_handle) = testing::dummy_stack();
    stack.arp().add_arp_entry(&adapter, REMOTE_IP, REMOTE_MAC);

    let mac = stack.arp().get_mac(&stack, &adapter, REMOTE_IP).unwrap();
    assert_eq!(mac, REMOTE_MAC);
    // no request may have gone out to the network
    assert!(read_handle.try_recv().is_err());
}
