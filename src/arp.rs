//! Address resolution: RFC 826 restricted to IPv4 over Ethernet.
//!
//! The protocol instance keeps one `ArpTable` per adapter and doubles as
//! the stack's `MacResolver`. A resolver miss broadcasts a who-has request
//! on the adapter and suspends the calling thread until the reply, or any
//! other ARP traffic from the queried IP, lands in the table.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::EtherTypes;
use pnet::util::MacAddr;

use crate::adapter::{adapter_key, NetworkAdapter};
use crate::arptable::ArpTable;
use crate::ethernet::{EthernetProtocol, MacResolver, BROADCAST_MAC};
use crate::graph::{Protocol, TxOptions};
use crate::packet::{LayerAttributes, PacketView};
use crate::stack::{NetworkStack, StackConfig};
use crate::{RxError, StackError, StackResult};

const MAC_LENGTH: u8 = 6;
const IPV4_LENGTH: u8 = 4;

pub struct ArpProtocol {
    tables: Mutex<HashMap<usize, ArpTable>>,
    entry_timeout: Duration,
    resolve_timeout: Option<Duration>,
}

impl ArpProtocol {
    pub const NAME: &'static str = "arp";

    pub fn new(config: &StackConfig) -> ArpProtocol {
        ArpProtocol {
            tables: Mutex::new(HashMap::new()),
            entry_timeout: config.arp_entry_timeout,
            resolve_timeout: config.arp_resolve_timeout,
        }
    }

    /// The ARP table of `adapter`, created empty on first use.
    pub fn table(&self, adapter: &Arc<dyn NetworkAdapter>) -> ArpTable {
        self.tables
            .lock()
            .expect("Unable to lock Arp tables")
            .entry(adapter_key(adapter))
            .or_insert_with(|| ArpTable::new(self.entry_timeout))
            .clone()
    }

    /// Manually inserts an IP to MAC mapping into the table of `adapter`.
    pub fn add_arp_entry(&self, adapter: &Arc<dyn NetworkAdapter>, ip: Ipv4Addr, mac: MacAddr) {
        self.table(adapter).insert(ip, mac);
    }
}

impl MacResolver for ArpProtocol {
    fn get_mac(
        &self,
        stack: &NetworkStack,
        adapter: &Arc<dyn NetworkAdapter>,
        dst_ip: Ipv4Addr,
    ) -> StackResult<MacAddr> {
        match self.table(adapter).get(dst_ip) {
            Ok(mac) => Ok(mac),
            Err(waiter) => {
                debug!("no fresh arp entry for {}, requesting", dst_ip);
                stack.send_on_adapter(
                    Self::NAME,
                    dst_ip,
                    adapter,
                    TxOptions::arp(ArpOperations::Request),
                )?;
                match self.resolve_timeout {
                    Some(timeout) => waiter
                        .recv_timeout(timeout)
                        .map_err(|_| StackError::ResolveTimeout),
                    None => waiter.recv().map_err(|_| StackError::ResolveTimeout),
                }
            }
        }
    }
}

impl Protocol for ArpProtocol {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn wire_id(&self) -> Option<u16> {
        Some(EtherTypes::Arp.0)
    }

    fn build(
        &self,
        stack: &NetworkStack,
        adapter: &Arc<dyn NetworkAdapter>,
        payload: Vec<u8>,
        options: &mut TxOptions,
    ) -> StackResult<Vec<u8>> {
        if !payload.is_empty() {
            return Err(StackError::IllegalArgument);
        }
        let opcode = options
            .arp_opcode
            .ok_or(StackError::MissingTxOption("arp_opcode"))?;
        let dst_ip = options.dst_ip.ok_or(StackError::MissingTxOption("dst_ip"))?;

        // Requests go out as broadcast. For replies the target MAC falls
        // back to a table lookup, which the learning step on the receive
        // side has already satisfied.
        let dst_mac = if opcode == ArpOperations::Reply {
            match options.dst_mac {
                Some(mac) => mac,
                None => self.get_mac(stack, adapter, dst_ip)?,
            }
        } else {
            BROADCAST_MAC
        };
        options.dst_mac = Some(dst_mac); // hint for the ethernet layer

        let mut buffer = vec![0; ArpPacket::minimum_packet_size()];
        {
            let mut pkg = MutableArpPacket::new(&mut buffer).unwrap();
            pkg.set_hardware_type(ArpHardwareTypes::Ethernet);
            pkg.set_protocol_type(EtherTypes::Ipv4);
            pkg.set_hw_addr_len(MAC_LENGTH);
            pkg.set_proto_addr_len(IPV4_LENGTH);
            pkg.set_operation(opcode);
            pkg.set_sender_hw_addr(adapter.mac());
            pkg.set_sender_proto_addr(adapter.ip());
            pkg.set_target_hw_addr(dst_mac);
            pkg.set_target_proto_addr(dst_ip);
        }
        Ok(buffer)
    }

    fn handle(
        &self,
        stack: &NetworkStack,
        packet: &mut PacketView,
        adapter: &Arc<dyn NetworkAdapter>,
    ) -> Result<Option<u16>, RxError> {
        let (opcode, src_mac, src_ip) = {
            let arp_pkg = ArpPacket::new(packet.current()).ok_or(RxError::InvalidLength)?;
            if arp_pkg.get_hardware_type() != ArpHardwareTypes::Ethernet
                || arp_pkg.get_protocol_type() != EtherTypes::Ipv4
                || arp_pkg.get_hw_addr_len() != MAC_LENGTH
                || arp_pkg.get_proto_addr_len() != IPV4_LENGTH
            {
                return Ok(None);
            }
            if arp_pkg.get_target_proto_addr() != adapter.ip() {
                return Ok(None);
            }
            (
                arp_pkg.get_operation(),
                arp_pkg.get_sender_hw_addr(),
                arp_pkg.get_sender_proto_addr(),
            )
        };
        match packet.layer(EthernetProtocol::LAYER).attributes {
            LayerAttributes::Ethernet { dst, .. } => {
                if dst != adapter.mac() && dst != BROADCAST_MAC {
                    return Ok(None);
                }
            }
            _ => return Err(RxError::InvalidContent),
        }

        debug!("Arp MAC: {} -> IPv4: {}", src_mac, src_ip);
        self.table(adapter).insert(src_ip, src_mac);

        if opcode == ArpOperations::Request {
            stack
                .send_on_adapter(
                    Self::NAME,
                    src_ip,
                    adapter,
                    TxOptions::arp(ArpOperations::Reply),
                )
                .map_err(|e| RxError::Other(format!("unable to send arp reply: {}", e)))?;
        }
        Ok(None)
    }
}
