//! ICMP, reduced to what an endpoint UDP stack needs: emitting
//! time-exceeded and destination-unreachable errors. Incoming ICMP is
//! accepted and ignored.

use std::sync::Arc;

use pnet::packet::icmp::{checksum, IcmpCode, IcmpPacket, IcmpType, IcmpTypes, MutableIcmpPacket};
use pnet::packet::ip::IpNextHeaderProtocols;

use crate::adapter::NetworkAdapter;
use crate::graph::{Protocol, TxOptions};
use crate::ipv4::{Ipv4Protocol, TtlExceededHandler};
use crate::packet::{LayerAttributes, PacketView};
use crate::stack::NetworkStack;
use crate::{RxError, StackError, StackResult};

// The second header word of both error messages is unused.
const UNUSED_LENGTH: usize = 4;

/// What to put in an outgoing ICMP packet. `error_packet` is the part of
/// the offending packet to enclose, conventionally the IP header plus its
/// payload.
pub enum IcmpTxOptions {
    TtlExceeded {
        error_packet: Vec<u8>,
    },
    DestinationUnreachable {
        code: IcmpCode,
        error_packet: Vec<u8>,
    },
}

pub struct IcmpProtocol;

impl IcmpProtocol {
    pub const NAME: &'static str = "icmp";

    pub fn new() -> IcmpProtocol {
        IcmpProtocol
    }

    fn pack(icmp_type: IcmpType, icmp_code: IcmpCode, error_packet: &[u8]) -> Vec<u8> {
        let mut body = vec![0; UNUSED_LENGTH];
        body.extend_from_slice(error_packet);
        let mut buffer = vec![0; IcmpPacket::minimum_packet_size() + body.len()];
        {
            let mut pkg = MutableIcmpPacket::new(&mut buffer).unwrap();
            pkg.set_icmp_type(icmp_type);
            pkg.set_icmp_code(icmp_code);
            pkg.set_payload(&body);
            let packet_checksum = checksum(&pkg.to_immutable());
            pkg.set_checksum(packet_checksum);
        }
        buffer
    }
}

impl Default for IcmpProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for IcmpProtocol {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn wire_id(&self) -> Option<u16> {
        Some(u16::from(IpNextHeaderProtocols::Icmp.0))
    }

    fn build(
        &self,
        _stack: &NetworkStack,
        _adapter: &Arc<dyn NetworkAdapter>,
        payload: Vec<u8>,
        options: &mut TxOptions,
    ) -> StackResult<Vec<u8>> {
        let icmp_options = options.icmp.take().ok_or(StackError::MissingTxOption("icmp"))?;
        let built = match icmp_options {
            IcmpTxOptions::TtlExceeded { error_packet } => {
                Self::pack(IcmpTypes::TimeExceeded, IcmpCode::new(0), &error_packet)
            }
            IcmpTxOptions::DestinationUnreachable { code, error_packet } => {
                Self::pack(IcmpTypes::DestinationUnreachable, code, &error_packet)
            }
        };
        let mut packet = payload;
        packet.extend_from_slice(&built);
        Ok(packet)
    }

    fn handle(
        &self,
        _stack: &NetworkStack,
        packet: &mut PacketView,
        _adapter: &Arc<dyn NetworkAdapter>,
    ) -> Result<Option<u16>, RxError> {
        trace!("icmp got a packet with {} bytes, nothing to do", packet.current().len());
        Ok(None)
    }
}

impl TtlExceededHandler for IcmpProtocol {
    /// Answers a TTL zero packet with a time-exceeded error to its source,
    /// enclosing the offending IP header and whatever payload followed it.
    fn handle_ttl_exceeded(&self, stack: &NetworkStack, packet: &PacketView) -> StackResult<()> {
        let src = match packet.layer(Ipv4Protocol::LAYER).attributes {
            LayerAttributes::Ipv4 { src, .. } => src,
            _ => return Err(StackError::IllegalArgument),
        };
        let mut error_packet = packet.layer_data(Ipv4Protocol::LAYER).to_vec();
        error_packet.extend_from_slice(packet.current());
        stack.send(
            Self::NAME,
            src,
            None,
            TxOptions::icmp(IcmpTxOptions::TtlExceeded { error_packet }),
        )
    }
}
