//! Ethernet framing: the root of the protocol graph.

use std::sync::{Arc, Mutex};

use pnet::packet::ethernet::{EtherType, EthernetPacket, MutableEthernetPacket};
use pnet::util::MacAddr;

use crate::adapter::NetworkAdapter;
use crate::graph::{Protocol, TxOptions};
use crate::packet::{LayerAttributes, PacketView};
use crate::stack::NetworkStack;
use crate::{RxError, StackError, StackResult};

pub const BROADCAST_MAC: MacAddr = MacAddr(0xff, 0xff, 0xff, 0xff, 0xff, 0xff);

/// Capability that maps a next-hop IPv4 address to a MAC, either from a
/// cache or by suspending the calling thread until the network answers.
/// Installed into the ethernet layer by the ARP protocol at startup; other
/// resolvers can be substituted for testing.
pub trait MacResolver: Send + Sync {
    fn get_mac(
        &self,
        stack: &NetworkStack,
        adapter: &Arc<dyn NetworkAdapter>,
        dst_ip: std::net::Ipv4Addr,
    ) -> StackResult<MacAddr>;
}

pub struct EthernetProtocol {
    resolver: Mutex<Option<Arc<dyn MacResolver>>>,
}

impl EthernetProtocol {
    pub const NAME: &'static str = "ethernet";
    /// The name of the layer this protocol records on received packets.
    pub const LAYER: &'static str = "ethernet";

    pub fn new() -> EthernetProtocol {
        EthernetProtocol {
            resolver: Mutex::new(None),
        }
    }

    pub fn set_mac_resolver(&self, resolver: Arc<dyn MacResolver>) {
        *self.resolver.lock().expect("Unable to lock resolver") = Some(resolver);
    }

    /// Destination MAC for an outgoing frame: the caller/ARP hint when
    /// present, otherwise a resolver lookup on the next hop (the gateway
    /// when routing supplied one, the destination itself when not).
    fn resolve_dst_mac(
        &self,
        stack: &NetworkStack,
        adapter: &Arc<dyn NetworkAdapter>,
        options: &TxOptions,
    ) -> StackResult<MacAddr> {
        if let Some(mac) = options.dst_mac {
            return Ok(mac);
        }
        let resolver = self
            .resolver
            .lock()
            .expect("Unable to lock resolver")
            .clone()
            .ok_or(StackError::NoMacResolver)?;
        let next_hop = options
            .gateway
            .or(options.dst_ip)
            .ok_or(StackError::MissingTxOption("dst_ip"))?;
        resolver.get_mac(stack, adapter, next_hop)
    }
}

impl Default for EthernetProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for EthernetProtocol {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn wire_id(&self) -> Option<u16> {
        None
    }

    fn build(
        &self,
        stack: &NetworkStack,
        adapter: &Arc<dyn NetworkAdapter>,
        payload: Vec<u8>,
        options: &mut TxOptions,
    ) -> StackResult<Vec<u8>> {
        let dst = self.resolve_dst_mac(stack, adapter, options)?;
        let ethertype = options
            .previous_protocol_id
            .ok_or(StackError::MissingTxOption("previous_protocol_id"))?;

        let mut buffer = vec![0; EthernetPacket::minimum_packet_size() + payload.len()];
        {
            let mut pkg = MutableEthernetPacket::new(&mut buffer).unwrap();
            pkg.set_destination(dst);
            pkg.set_source(adapter.mac());
            pkg.set_ethertype(EtherType::new(ethertype));
            pkg.set_payload(&payload);
        }
        Ok(buffer)
    }

    fn handle(
        &self,
        _stack: &NetworkStack,
        packet: &mut PacketView,
        adapter: &Arc<dyn NetworkAdapter>,
    ) -> Result<Option<u16>, RxError> {
        let (src, dst, ethertype) = {
            let eth_pkg = EthernetPacket::new(packet.current()).ok_or(RxError::InvalidLength)?;
            (
                eth_pkg.get_source(),
                eth_pkg.get_destination(),
                eth_pkg.get_ethertype(),
            )
        };
        if dst != adapter.mac() && dst != BROADCAST_MAC {
            trace!("frame for {} is not for us, ignoring", dst);
            return Ok(None);
        }
        packet.add_layer(
            Self::LAYER,
            LayerAttributes::Ethernet { src, dst },
            EthernetPacket::minimum_packet_size(),
            0,
        )?;
        Ok(Some(ethertype.0))
    }
}
