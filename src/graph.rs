//! The protocol graph: a tree of protocol handlers rooted at ethernet,
//! demultiplexed by the wire type id each parent carries for its children
//! (ethertype under ethernet, IP protocol number under IPv4).
//!
//! The graph is populated once when the stack is constructed and read-only
//! afterwards. Registering two siblings with the same wire id is a
//! programming error and panics.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use pnet::packet::arp::ArpOperation;
use pnet::util::MacAddr;

use crate::adapter::NetworkAdapter;
use crate::icmp::IcmpTxOptions;
use crate::packet::PacketView;
use crate::stack::NetworkStack;
use crate::udp::UdpTxOptions;
use crate::{RxError, StackResult};

/// A protocol handler in the graph. One instance exists per protocol for
/// the lifetime of the stack; it builds outgoing headers and parses
/// incoming ones.
pub trait Protocol: Send + Sync {
    /// The node name this handler is registered under.
    fn name(&self) -> &'static str;

    /// The id the parent protocol uses to select this handler, e.g. the
    /// ethertype for protocols under ethernet. `None` for the root.
    fn wire_id(&self) -> Option<u16>;

    /// Prepends this protocol's framing to `payload` and returns the
    /// result. Handlers read what they need from `options` and may write
    /// hints back for the layers below them.
    fn build(
        &self,
        stack: &NetworkStack,
        adapter: &Arc<dyn NetworkAdapter>,
        payload: Vec<u8>,
        options: &mut TxOptions,
    ) -> StackResult<Vec<u8>>;

    /// Parses this protocol's layer out of `packet`. Returns the wire id
    /// of the nested protocol when processing should continue, `Ok(None)`
    /// when the packet is done or not for us, and an error when it is
    /// malformed and must be dropped.
    fn handle(
        &self,
        stack: &NetworkStack,
        packet: &mut PacketView,
        adapter: &Arc<dyn NetworkAdapter>,
    ) -> Result<Option<u16>, RxError>;
}

/// The options bag threaded through one transmit walk. The engine injects
/// the routing results (`dst_ip`, `gateway`) and maintains
/// `previous_protocol_id` between layers; everything else is either given
/// by the caller or written as a hint by one layer for a layer below it
/// (ARP resolving `dst_mac` so ethernet does not have to).
#[derive(Default)]
pub struct TxOptions {
    pub dst_ip: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub dst_mac: Option<MacAddr>,
    pub previous_protocol_id: Option<u16>,
    pub arp_opcode: Option<ArpOperation>,
    pub icmp: Option<IcmpTxOptions>,
    pub udp: Option<UdpTxOptions>,
}

impl TxOptions {
    pub fn new() -> TxOptions {
        TxOptions::default()
    }

    pub fn arp(opcode: ArpOperation) -> TxOptions {
        TxOptions {
            arp_opcode: Some(opcode),
            ..TxOptions::default()
        }
    }

    pub fn icmp(options: IcmpTxOptions) -> TxOptions {
        TxOptions {
            icmp: Some(options),
            ..TxOptions::default()
        }
    }

    pub fn udp(src_port: u16, dst_port: u16, data: Vec<u8>) -> TxOptions {
        TxOptions {
            udp: Some(UdpTxOptions {
                src_port,
                dst_port,
                data,
            }),
            ..TxOptions::default()
        }
    }

    /// Sets the destination MAC up front, bypassing MAC resolution.
    pub fn with_dst_mac(mut self, mac: MacAddr) -> TxOptions {
        self.dst_mac = Some(mac);
        self
    }

    /// Presets the ethertype for sends with ethernet as the top protocol.
    pub fn with_previous_protocol_id(mut self, id: u16) -> TxOptions {
        self.previous_protocol_id = Some(id);
        self
    }
}

struct Node {
    handler: Arc<dyn Protocol>,
    parent: Option<&'static str>,
}

/// Tree of protocol handlers, nodes keyed by name and children indexed by
/// `(parent, wire id)`.
#[derive(Default)]
pub struct ProtocolGraph {
    nodes: HashMap<&'static str, Node>,
    children: HashMap<(&'static str, u16), &'static str>,
    root: Option<&'static str>,
}

impl ProtocolGraph {
    pub fn new() -> ProtocolGraph {
        ProtocolGraph::default()
    }

    /// Registers the root protocol, the one raw frames are handed to.
    ///
    /// # Panics
    ///
    /// Panics if a root is already registered.
    pub fn register_root(&mut self, handler: Arc<dyn Protocol>) {
        assert!(self.root.is_none(), "root protocol already registered");
        let name = handler.name();
        self.insert_node(name, Node { handler, parent: None });
        self.root = Some(name);
    }

    /// Registers `handler` as a child of the protocol named `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is unknown, if the handler has no wire id, or if
    /// another sibling already registered the same wire id. All of these
    /// are misconfigurations that would make dispatch ambiguous.
    pub fn register(&mut self, parent: &'static str, handler: Arc<dyn Protocol>) {
        assert!(
            self.nodes.contains_key(parent),
            "unknown parent protocol {}",
            parent
        );
        let name = handler.name();
        let wire_id = match handler.wire_id() {
            Some(id) => id,
            None => panic!("protocol {} has no wire id, cannot register under {}", name, parent),
        };
        match self.children.entry((parent, wire_id)) {
            Entry::Occupied(entry) => panic!(
                "duplicate protocol id {:#06x} under {}: {} and {}",
                wire_id,
                parent,
                entry.get(),
                name
            ),
            Entry::Vacant(entry) => entry.insert(name),
        };
        self.insert_node(
            name,
            Node {
                handler,
                parent: Some(parent),
            },
        );
    }

    fn insert_node(&mut self, name: &'static str, node: Node) {
        let previous = self.nodes.insert(name, node);
        assert!(previous.is_none(), "duplicate protocol name {}", name);
    }

    pub fn root(&self) -> Option<&'static str> {
        self.root
    }

    pub fn handler(&self, name: &str) -> Option<&Arc<dyn Protocol>> {
        self.nodes.get(name).map(|node| &node.handler)
    }

    pub fn parent_of(&self, name: &str) -> Option<&'static str> {
        self.nodes.get(name).and_then(|node| node.parent)
    }

    pub fn child(&self, parent: &'static str, wire_id: u16) -> Option<&'static str> {
        self.children.get(&(parent, wire_id)).copied()
    }
}
