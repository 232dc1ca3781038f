// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Rups - Rust userspace protocol stack
//!
//! `rups` is a userspace network stack implementing Ethernet, ARP, IPv4,
//! ICMP and UDP on top of a raw link-layer device, backed by
//! [`libpnet`](https://github.com/libpnet/libpnet) for raw ethernet
//! access. It is enough stack to host a datagram socket API: applications
//! open UDP endpoints, send datagrams and receive datagrams, while the
//! stack takes care of MAC resolution, routing, TTL expiry,
//! unreachable-port signalling and checksums.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rups::{AdapterConfig, EthernetChannel, NetworkStack, UdpSocket};
//! use pnet::datalink;
//! use pnet::util::MacAddr;
//!
//! let stack = NetworkStack::new();
//! let interface = datalink::interfaces().into_iter().next().unwrap();
//! let channel = EthernetChannel::from_interface(&interface).unwrap();
//! let config = AdapterConfig::new(
//!     MacAddr::new(0x01, 0x23, 0x45, 0x67, 0x89, 0xab),
//!     "10.0.0.2".parse().unwrap(),
//!     "255.255.255.0".parse().unwrap(),
//! ).with_gateway("10.0.0.1".parse().unwrap());
//! stack.add_channel_adapter(config, channel).unwrap();
//!
//! let mut socket = UdpSocket::new(stack);
//! socket.bind(None, 1337).unwrap();
//! socket.connect("10.0.0.1".parse().unwrap(), 53).unwrap();
//! socket.send(b"hello").unwrap();
//! let answer = socket.recv().unwrap();
//! # drop(answer);
//! ```
//!
//! ## Architecture
//!
//! The protocols form a tree, the *protocol graph*: ethernet at the root,
//! ARP and IPv4 below it, ICMP and UDP below IPv4. The graph is registered
//! once when the [`NetworkStack`] is constructed and never changes
//! afterwards.
//!
//! ### Sending
//!
//! [`NetworkStack::send`] resolves the destination through the routing
//! table, then walks the graph from the chosen top protocol towards the
//! root. Every layer prepends its framing to the payload built so far,
//! reading what it needs from a [`TxOptions`] bag and leaving hints for
//! the layers below it; ARP for example records the resolved destination
//! MAC so ethernet does not resolve it again. The finished frame goes to
//! the adapter the route selected.
//!
//! ### Receiving
//!
//! Adapters feed raw frames into [`NetworkStack::add_packet`]. Each frame
//! is processed on a worker thread of its own: the graph is walked from
//! the root downwards, every handler claiming its header bytes as a layer
//! on the shared [`PacketView`] and naming the protocol id to continue
//! with. A handler that finds the packet malformed, or simply not for this
//! host, stops the walk and the frame is dropped. UDP payloads end up in
//! per-port queues that [`UdpSocket`]s block on.
//!
//! ### Blocking
//!
//! There is no async runtime; waiting happens on plain threads. An ARP
//! resolution parks the sending thread on a channel until the reply is
//! learned, and a socket `recv` parks on the port queue until a datagram
//! arrives. Frames keep flowing while they wait because every frame has
//! its own worker.

#[macro_use]
extern crate log;

pub mod adapter;

/// Module containing everything related to the address resolution
/// protocol (Arp).
pub mod arp;
mod arptable;

/// Module containing ethernet framing, the root of the protocol graph.
pub mod ethernet;

mod errors;

/// Module containing the protocol graph and the transmit options bag.
pub mod graph;

/// Module containing internet control message protocol (Icmp)
/// functionality.
pub mod icmp;

/// Module containing IPv4 functionality.
pub mod ipv4;

/// Module containing the layered packet view used on the receive path.
pub mod packet;

mod routing;

/// Module containing the receive thread spawned per datalink adapter.
pub mod rx;

/// Module containing the `UdpSocket` facade.
pub mod socket;

mod stack;

/// Module with mock adapters and stack fixtures for tests.
pub mod testing;

/// Module containing Udp functionality.
pub mod udp;

pub use crate::adapter::{
    same_adapter, AdapterConfig, DatalinkAdapter, EthernetChannel, NetworkAdapter,
};
pub use crate::arptable::ArpTable;
pub use crate::errors::{
    RxError, RxResult, SocketError, SocketResult, StackError, StackResult, TxError, TxResult,
};
pub use crate::ethernet::BROADCAST_MAC;
pub use crate::graph::{Protocol, ProtocolGraph, TxOptions};
pub use crate::packet::{Layer, LayerAttributes, PacketView};
pub use crate::routing::{RouteEntry, RouteTable};
pub use crate::socket::UdpSocket;
pub use crate::stack::{NetworkStack, StackConfig, DEFAULT_MTU};
pub use crate::udp::Datagram;

/// Read and write buffer size used when opening datalink channels.
pub static DEFAULT_BUFFER_SIZE: usize = 1024 * 128;
