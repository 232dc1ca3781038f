use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::adapter::{AdapterConfig, DatalinkAdapter, EthernetChannel, NetworkAdapter};
use crate::arp::ArpProtocol;
use crate::ethernet::EthernetProtocol;
use crate::graph::{ProtocolGraph, TxOptions};
use crate::icmp::IcmpProtocol;
use crate::ipv4::Ipv4Protocol;
use crate::packet::PacketView;
use crate::routing::{RouteEntry, RouteTable};
use crate::rx;
use crate::udp::UdpProtocol;
use crate::{RxResult, StackError, StackResult};

pub static DEFAULT_MTU: usize = 1500;

/// The environment knobs of the stack. `arp_resolve_timeout` is off by
/// default so a resolution with no answer waits forever.
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// How long a learned ARP entry counts as fresh.
    pub arp_entry_timeout: Duration,
    /// Upper bound on waiting for an ARP reply, `None` to wait forever.
    pub arp_resolve_timeout: Option<Duration>,
    /// TTL written into outgoing IPv4 headers.
    pub ipv4_ttl: u8,
    /// How many random ports a socket probes when binding to port 0.
    pub bind_tries: u32,
}

impl Default for StackConfig {
    fn default() -> StackConfig {
        StackConfig {
            arp_entry_timeout: Duration::from_secs(10),
            arp_resolve_timeout: None,
            ipv4_ttl: 128,
            bind_tries: 1000,
        }
    }
}

/// The main struct of this library, tying the protocol graph, the routing
/// table and the registered adapters together. Construct one per process
/// and share it as an `Arc`.
pub struct NetworkStack {
    config: StackConfig,
    protocols: ProtocolGraph,
    route_table: Mutex<RouteTable>,
    adapters: Mutex<Vec<Arc<dyn NetworkAdapter>>>,
    dropped_frames: AtomicU64,
    ethernet: Arc<EthernetProtocol>,
    arp: Arc<ArpProtocol>,
    ipv4: Arc<Ipv4Protocol>,
    icmp: Arc<IcmpProtocol>,
    udp: Arc<UdpProtocol>,
}

impl NetworkStack {
    pub fn new() -> Arc<NetworkStack> {
        Self::with_config(StackConfig::default())
    }

    /// Creates a stack and registers the standard protocol graph:
    /// ethernet at the root, ARP and IPv4 under it, ICMP and UDP under
    /// IPv4. ARP is installed as the ethernet MAC resolver and ICMP as the
    /// IPv4 TTL-exceeded handler.
    pub fn with_config(config: StackConfig) -> Arc<NetworkStack> {
        let ethernet = Arc::new(EthernetProtocol::new());
        let arp = Arc::new(ArpProtocol::new(&config));
        ethernet.set_mac_resolver(arp.clone());
        let ipv4 = Arc::new(Ipv4Protocol::new(config.ipv4_ttl));
        let icmp = Arc::new(IcmpProtocol::new());
        ipv4.register_ttl_exceeded_handler(icmp.clone());
        let udp = Arc::new(UdpProtocol::new());

        let mut protocols = ProtocolGraph::new();
        protocols.register_root(ethernet.clone());
        protocols.register(EthernetProtocol::NAME, arp.clone());
        protocols.register(EthernetProtocol::NAME, ipv4.clone());
        protocols.register(Ipv4Protocol::NAME, icmp.clone());
        protocols.register(Ipv4Protocol::NAME, udp.clone());

        Arc::new(NetworkStack {
            config,
            protocols,
            route_table: Mutex::new(RouteTable::new()),
            adapters: Mutex::new(Vec::new()),
            dropped_frames: AtomicU64::new(0),
            ethernet,
            arp,
            ipv4,
            icmp,
            udp,
        })
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn ethernet(&self) -> &Arc<EthernetProtocol> {
        &self.ethernet
    }

    pub fn arp(&self) -> &Arc<ArpProtocol> {
        &self.arp
    }

    pub fn ipv4(&self) -> &Arc<Ipv4Protocol> {
        &self.ipv4
    }

    pub fn icmp(&self) -> &Arc<IcmpProtocol> {
        &self.icmp
    }

    pub fn udp(&self) -> &Arc<UdpProtocol> {
        &self.udp
    }

    /// Registers an adapter and installs its natural routes. Packets to
    /// addresses this adapter covers will be sent through it from now on.
    pub fn add_adapter(&self, adapter: Arc<dyn NetworkAdapter>) -> StackResult<()> {
        self.route_table
            .lock()
            .expect("Unable to lock route table")
            .add_adapter(adapter.clone())?;
        self.adapters
            .lock()
            .expect("Unable to lock adapters")
            .push(adapter);
        Ok(())
    }

    /// Removes an adapter and every route through it.
    pub fn remove_adapter(&self, adapter: &Arc<dyn NetworkAdapter>) {
        self.route_table
            .lock()
            .expect("Unable to lock route table")
            .remove_adapter(adapter);
        self.adapters
            .lock()
            .expect("Unable to lock adapters")
            .retain(|a| !Arc::ptr_eq(a, adapter));
    }

    /// Creates a `DatalinkAdapter` over `channel`, registers it and spawns
    /// its receive thread.
    pub fn add_channel_adapter(
        self: &Arc<Self>,
        config: AdapterConfig,
        channel: EthernetChannel,
    ) -> StackResult<Arc<DatalinkAdapter>> {
        let EthernetChannel(sender, receiver) = channel;
        let adapter = Arc::new(DatalinkAdapter::new(config, sender));
        let dyn_adapter: Arc<dyn NetworkAdapter> = adapter.clone();
        self.add_adapter(dyn_adapter.clone())?;
        rx::spawn(self.clone(), dyn_adapter, receiver);
        Ok(adapter)
    }

    /// The registered adapter using `ip` as its source address.
    pub fn get_adapter(&self, ip: Ipv4Addr) -> StackResult<Arc<dyn NetworkAdapter>> {
        let adapters = self.adapters.lock().expect("Unable to lock adapters");
        for adapter in adapters.iter() {
            if adapter.ip() == ip {
                return Ok(adapter.clone());
            }
        }
        Err(StackError::InvalidInterface)
    }

    /// Adds a route that is not a natural route of any adapter.
    pub fn add_static_route(&self, entry: RouteEntry) {
        self.route_table
            .lock()
            .expect("Unable to lock route table")
            .add_static_route(entry);
    }

    /// Number of received frames dropped because some layer rejected them.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Sends a packet. The layers below `top_protocol` are inferred from
    /// the protocol graph; the adapter and next hop come from the routing
    /// table. When `expected_adapter` is given and routing picks another
    /// adapter the send fails instead of using it.
    pub fn send(
        &self,
        top_protocol: &'static str,
        dst_ip: Ipv4Addr,
        expected_adapter: Option<&Arc<dyn NetworkAdapter>>,
        options: TxOptions,
    ) -> StackResult<()> {
        let (adapter, gateway) = self
            .route_table
            .lock()
            .expect("Unable to lock route table")
            .route(dst_ip)
            .ok_or(StackError::NoRouteToHost)?;
        if let Some(expected) = expected_adapter {
            if !Arc::ptr_eq(expected, &adapter) {
                return Err(StackError::InvalidInterface);
            }
        }
        self.send_with(top_protocol, dst_ip, &adapter, gateway, options)
    }

    /// Sends a packet on a caller-chosen adapter, bypassing the routing
    /// table. ARP uses this so requests and replies always leave on the
    /// adapter that triggered them.
    pub fn send_on_adapter(
        &self,
        top_protocol: &'static str,
        dst_ip: Ipv4Addr,
        adapter: &Arc<dyn NetworkAdapter>,
        options: TxOptions,
    ) -> StackResult<()> {
        self.send_with(top_protocol, dst_ip, adapter, None, options)
    }

    /// Walks the graph from `top_protocol` towards the root, letting every
    /// layer prepend its framing, then hands the frame to the adapter.
    fn send_with(
        &self,
        top_protocol: &'static str,
        dst_ip: Ipv4Addr,
        adapter: &Arc<dyn NetworkAdapter>,
        gateway: Option<Ipv4Addr>,
        mut options: TxOptions,
    ) -> StackResult<()> {
        options.dst_ip = Some(dst_ip);
        if gateway.is_some() {
            options.gateway = gateway;
        }

        let mut payload = Vec::new();
        let mut current = Some(top_protocol);
        while let Some(name) = current {
            let handler = self
                .protocols
                .handler(name)
                .ok_or(StackError::UnknownProtocol(name))?;
            payload = handler.build(self, adapter, payload, &mut options)?;
            options.previous_protocol_id = handler.wire_id();
            current = self.protocols.parent_of(name);
        }
        adapter.send(&payload).map_err(StackError::TxError)
    }

    /// Hands one received frame to the stack. Called by adapter receive
    /// threads. Every frame is processed on a worker thread of its own so
    /// a handler stuck waiting, e.g. on ARP, never blocks later frames.
    pub fn add_packet(self: &Arc<Self>, frame: Vec<u8>, adapter: &Arc<dyn NetworkAdapter>) {
        let stack = Arc::clone(self);
        let adapter = Arc::clone(adapter);
        thread::spawn(move || {
            if let Err(e) = stack.handle_frame(frame, &adapter) {
                stack.dropped_frames.fetch_add(1, Ordering::Relaxed);
                warn!("dropped frame received on {}: {}", adapter.mac(), e);
            }
        });
    }

    /// Walks the graph from the root downwards. Every handler parses its
    /// layer and names the protocol id to continue with; processing stops
    /// when a handler returns `None` or no child matches the id.
    fn handle_frame(&self, frame: Vec<u8>, adapter: &Arc<dyn NetworkAdapter>) -> RxResult {
        let mut current = match self.protocols.root() {
            Some(root) => root,
            None => return Ok(()),
        };
        let mut packet = PacketView::new(frame);
        loop {
            let handler = match self.protocols.handler(current) {
                Some(handler) => handler.clone(),
                None => return Ok(()),
            };
            match handler.handle(self, &mut packet, adapter)? {
                None => break,
                Some(wire_id) => match self.protocols.child(current, wire_id) {
                    Some(child) => current = child,
                    None => {
                        trace!("no handler for protocol {:#06x} under {}", wire_id, current);
                        break;
                    }
                },
            }
        }
        Ok(())
    }
}
