#![allow(dead_code)]

//! Frame builders and fixture addresses shared by the integration tests.
//! The addresses match `testing::dummy_stack`.

use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

use pnet::packet::arp::{ArpHardwareTypes, ArpOperation, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv4::{self, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::udp::{self, MutableUdpPacket, UdpPacket};
use pnet::packet::MutablePacket;
use pnet::util::MacAddr;

pub const LOCAL_MAC: MacAddr = MacAddr(0x01, 0x23, 0x45, 0x67, 0x89, 0xab);
pub const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(1, 2, 3, 4);
pub const REMOTE_MAC: MacAddr = MacAddr(0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa);
pub const REMOTE_IP: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);

// Offsets into frames built here, for tests that corrupt fields.
pub const IP_CHECKSUM_OFFSET: usize = 14 + 10;
pub const UDP_CHECKSUM_OFFSET: usize = 14 + 20 + 6;

pub fn arp_frame(
    opcode: ArpOperation,
    eth_dst: MacAddr,
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    let mut buffer =
        vec![0; EthernetPacket::minimum_packet_size() + ArpPacket::minimum_packet_size()];
    let mut eth = MutableEthernetPacket::new(&mut buffer).unwrap();
    eth.set_destination(eth_dst);
    eth.set_source(sender_mac);
    eth.set_ethertype(EtherTypes::Arp);
    let mut arp = MutableArpPacket::new(eth.payload_mut()).unwrap();
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(opcode);
    arp.set_sender_hw_addr(sender_mac);
    arp.set_sender_proto_addr(sender_ip);
    arp.set_target_hw_addr(target_mac);
    arp.set_target_proto_addr(target_ip);
    buffer
}

/// A bare IPv4 packet without ethernet framing, checksummed.
pub fn ipv4_packet(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    ttl: u8,
    flags: u8,
    protocol: u8,
    payload: &[u8],
) -> Vec<u8> {
    let total_length = Ipv4Packet::minimum_packet_size() + payload.len();
    let mut buffer = vec![0; total_length];
    let mut ip = MutableIpv4Packet::new(&mut buffer).unwrap();
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length(total_length as u16);
    ip.set_flags(flags);
    ip.set_fragment_offset(0);
    ip.set_ttl(ttl);
    ip.set_next_level_protocol(IpNextHeaderProtocol(protocol));
    ip.set_source(src_ip);
    ip.set_destination(dst_ip);
    ip.set_payload(payload);
    let header_checksum = ipv4::checksum(&ip.to_immutable());
    ip.set_checksum(header_checksum);
    buffer
}

pub fn ipv4_frame_with_flags(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    ttl: u8,
    flags: u8,
    protocol: u8,
    payload: &[u8],
) -> Vec<u8> {
    let ip = ipv4_packet(src_ip, dst_ip, ttl, flags, protocol, payload);
    let mut buffer = vec![0; EthernetPacket::minimum_packet_size() + ip.len()];
    let mut eth = MutableEthernetPacket::new(&mut buffer).unwrap();
    eth.set_destination(LOCAL_MAC);
    eth.set_source(REMOTE_MAC);
    eth.set_ethertype(EtherTypes::Ipv4);
    eth.set_payload(&ip);
    buffer
}

pub fn ipv4_frame(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    ttl: u8,
    protocol: u8,
    payload: &[u8],
) -> Vec<u8> {
    ipv4_frame_with_flags(src_ip, dst_ip, ttl, 0, protocol, payload)
}

/// A bare UDP datagram with the checksum computed over the usual IPv4
/// pseudo header.
pub fn udp_datagram(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let length = UdpPacket::minimum_packet_size() + payload.len();
    let mut buffer = vec![0; length];
    let mut udp_pkg = MutableUdpPacket::new(&mut buffer).unwrap();
    udp_pkg.set_source(src_port);
    udp_pkg.set_destination(dst_port);
    udp_pkg.set_length(length as u16);
    udp_pkg.set_payload(payload);
    let datagram_checksum = udp::ipv4_checksum(&udp_pkg.to_immutable(), &src_ip, &dst_ip);
    udp_pkg.set_checksum(datagram_checksum);
    buffer
}

pub fn udp_frame(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let datagram = udp_datagram(src_ip, dst_ip, src_port, dst_port, payload);
    ipv4_frame(src_ip, dst_ip, 64, 17, &datagram)
}

/// Deterministically corrupts the 16 bit field at `offset`, avoiding zero
/// since some checksums treat zero as "not present".
pub fn corrupt_u16(frame: &mut [u8], offset: usize) {
    let current = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
    let mut bad = current.wrapping_add(1);
    if bad == 0 {
        bad = 1;
    }
    frame[offset..offset + 2].copy_from_slice(&bad.to_be_bytes());
}

/// Polls `condition` for up to a second. Processing happens on worker
/// threads, so effects of an injected frame show up asynchronously.
pub fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not met within one second");
}
