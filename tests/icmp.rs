mod common;

use std::time::Duration;

use pnet::packet::ethernet::EthernetPacket;
use pnet::packet::icmp::{checksum as icmp_checksum, IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;

use rups::icmp::{IcmpProtocol, IcmpTxOptions};
use rups::{testing, TxOptions};

use common::*;

const PAYLOAD: &[u8] = b"test!";

fn read_icmp_reply(read_handle: &std::sync::mpsc::Receiver<Vec<u8>>) -> Vec<u8> {
    let frame = read_handle.recv_timeout(Duration::from_secs(1)).unwrap();
    let eth = EthernetPacket::new(&frame).unwrap();
    assert_eq!(eth.get_destination(), REMOTE_MAC);
    let ip = Ipv4Packet::new(eth.payload()).unwrap();
    assert_eq!(ip.get_destination(), REMOTE_IP);
    assert_eq!(ip.get_source(), LOCAL_IP);
    assert_eq!(ip.get_next_level_protocol(), IpNextHeaderProtocols::Icmp);
    ip.payload().to_vec()
}

#[test]
fn builds_time_exceeded() {
    let (stack, _adapter, read_handle) = testing::dummy_stack();
    stack
        .send(
            IcmpProtocol::NAME,
            REMOTE_IP,
            None,
            TxOptions::icmp(IcmpTxOptions::TtlExceeded {
                error_packet: PAYLOAD.to_vec(),
            })
            .with_dst_mac(REMOTE_MAC),
        )
        .unwrap();

    let icmp_bytes = read_icmp_reply(&read_handle);
    let icmp = IcmpPacket::new(&icmp_bytes).unwrap();
    assert_eq!(icmp.get_icmp_type(), IcmpTypes::TimeExceeded);
    assert_eq!(icmp.get_icmp_code().0, 0);
    assert_eq!(icmp.get_checksum(), icmp_checksum(&icmp));
    assert_eq!(&icmp.payload()[..4], &[0, 0, 0, 0]);
    assert_eq!(&icmp.payload()[4..], PAYLOAD);
}

#[test]
fn builds_destination_unreachable_with_code() {
    let (stack, _adapter, read_handle) = testing::dummy_stack();
    stack
        .send(
            IcmpProtocol::NAME,
            REMOTE_IP,
            None,
            TxOptions::icmp(IcmpTxOptions::DestinationUnreachable {
                code: IcmpCode::new(0xaa),
                error_packet: PAYLOAD.to_vec(),
            })
            .with_dst_mac(REMOTE_MAC),
        )
        .unwrap();

    let icmp_bytes = read_icmp_reply(&read_handle);
    let icmp = IcmpPacket::new(&icmp_bytes).unwrap();
    assert_eq!(icmp.get_icmp_type(), IcmpTypes::DestinationUnreachable);
    assert_eq!(icmp.get_icmp_code(), IcmpCode::new(0xaa));
    assert_eq!(icmp.get_checksum(), icmp_checksum(&icmp));
    assert_eq!(&icmp.payload()[4..], PAYLOAD);
}

#[test]
fn incoming_icmp_is_accepted_and_ignored() {
    let (stack, adapter, read_handle) = testing::dummy_stack();
    // echo-request-ish payload; the stack has no ping support and should
    // neither answer nor count a drop
    let frame = ipv4_frame(REMOTE_IP, LOCAL_IP, 64, 1, &[8, 0, 0, 0]);
    stack.add_packet(frame, &adapter);

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(stack.dropped_frames(), 0);
    assert!(read_handle.try_recv().is_err());
}
