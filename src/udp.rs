//! UDP: header and checksum handling plus the per-port delivery queues
//! sockets read from. A datagram for a port nobody listens on is answered
//! with an ICMP port-unreachable.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::{Arc, Condvar, Mutex};

use pnet::packet::icmp::destination_unreachable::IcmpCodes;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::udp::{ipv4_checksum, MutableUdpPacket, UdpPacket};
use pnet::packet::Packet;

use crate::adapter::NetworkAdapter;
use crate::graph::{Protocol, TxOptions};
use crate::icmp::{IcmpProtocol, IcmpTxOptions};
use crate::ipv4::Ipv4Protocol;
use crate::packet::{LayerAttributes, PacketView};
use crate::stack::NetworkStack;
use crate::{RxError, SocketError, SocketResult, StackError, StackResult, TxError};

/// Payload of an outgoing datagram together with its ports.
pub struct UdpTxOptions {
    pub src_port: u16,
    pub dst_port: u16,
    pub data: Vec<u8>,
}

/// One received datagram as handed to a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    pub data: Vec<u8>,
}

struct QueueInner {
    datagrams: VecDeque<Datagram>,
    closed: bool,
}

/// FIFO of datagrams awaiting delivery to one bound port. Readers block
/// until a datagram arrives or the port is closed; closing wakes every
/// blocked reader.
struct PacketQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl PacketQueue {
    fn new() -> PacketQueue {
        PacketQueue {
            inner: Mutex::new(QueueInner {
                datagrams: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    fn push(&self, datagram: Datagram) {
        let mut inner = self.inner.lock().expect("Unable to lock packet queue");
        inner.datagrams.push_back(datagram);
        self.available.notify_one();
    }

    fn wait_for_packet(&self) -> SocketResult<Datagram> {
        let mut inner = self.inner.lock().expect("Unable to lock packet queue");
        loop {
            if let Some(datagram) = inner.datagrams.pop_front() {
                return Ok(datagram);
            }
            if inner.closed {
                return Err(SocketError::PortNotOpen);
            }
            inner = self
                .available
                .wait(inner)
                .expect("Unable to lock packet queue");
        }
    }

    fn close(&self) {
        let mut inner = self.inner.lock().expect("Unable to lock packet queue");
        inner.closed = true;
        self.available.notify_all();
    }
}

type PortKey = (Option<Ipv4Addr>, u16);

pub struct UdpProtocol {
    queues: Mutex<HashMap<PortKey, Arc<PacketQueue>>>,
}

impl UdpProtocol {
    pub const NAME: &'static str = "udp";

    pub fn new() -> UdpProtocol {
        UdpProtocol {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Opens `(ip, port)` for receiving. `None` as the IP is the wildcard
    /// binding for the port. Fails when the port is taken, either by the
    /// exact same key or by a wildcard covering it.
    pub fn open_port(&self, ip: Option<Ipv4Addr>, port: u16) -> SocketResult<()> {
        let mut queues = self.queues.lock().expect("Unable to lock udp ports");
        if queues.contains_key(&(None, port)) || queues.contains_key(&(ip, port)) {
            return Err(SocketError::PortAlreadyOpened);
        }
        queues.insert((ip, port), Arc::new(PacketQueue::new()));
        Ok(())
    }

    /// Closes `(ip, port)` and wakes anyone blocked on it. Idempotent.
    pub fn close_port(&self, ip: Option<Ipv4Addr>, port: u16) {
        let queue = self
            .queues
            .lock()
            .expect("Unable to lock udp ports")
            .remove(&(ip, port));
        if let Some(queue) = queue {
            queue.close();
        }
    }

    /// Returns the next datagram delivered to `(ip, port)`, blocking while
    /// the queue is empty. Fails when the port is not open.
    pub fn get_packet(&self, ip: Option<Ipv4Addr>, port: u16) -> SocketResult<Datagram> {
        let queue = self
            .queues
            .lock()
            .expect("Unable to lock udp ports")
            .get(&(ip, port))
            .cloned()
            .ok_or(SocketError::PortNotOpen)?;
        queue.wait_for_packet()
    }

    /// A datagram for `(dst_ip, port)` goes to the queue bound to exactly
    /// that address, falling back to the wildcard queue on the port.
    fn queue_for(&self, dst_ip: Ipv4Addr, port: u16) -> Option<Arc<PacketQueue>> {
        let queues = self.queues.lock().expect("Unable to lock udp ports");
        queues
            .get(&(Some(dst_ip), port))
            .or_else(|| queues.get(&(None, port)))
            .cloned()
    }
}

impl Default for UdpProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for UdpProtocol {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn wire_id(&self) -> Option<u16> {
        Some(u16::from(IpNextHeaderProtocols::Udp.0))
    }

    /// UDP wraps no nested protocol, so the incoming payload is expected
    /// to be empty and the datagram is taken from the options instead.
    fn build(
        &self,
        _stack: &NetworkStack,
        adapter: &Arc<dyn NetworkAdapter>,
        _payload: Vec<u8>,
        options: &mut TxOptions,
    ) -> StackResult<Vec<u8>> {
        let udp_options = options.udp.take().ok_or(StackError::MissingTxOption("udp"))?;
        let dst_ip = options.dst_ip.ok_or(StackError::MissingTxOption("dst_ip"))?;
        let src_ip = adapter.ip();

        let length = UdpPacket::minimum_packet_size() + udp_options.data.len();
        if length > usize::from(u16::max_value()) {
            return Err(StackError::TxError(TxError::TooLargePayload));
        }
        let mut buffer = vec![0; length];
        {
            let mut pkg = MutableUdpPacket::new(&mut buffer).unwrap();
            pkg.set_source(udp_options.src_port);
            pkg.set_destination(udp_options.dst_port);
            pkg.set_length(length as u16);
            pkg.set_payload(&udp_options.data);
            let packet_checksum = ipv4_checksum(&pkg.to_immutable(), &src_ip, &dst_ip);
            pkg.set_checksum(packet_checksum);
        }
        Ok(buffer)
    }

    fn handle(
        &self,
        stack: &NetworkStack,
        packet: &mut PacketView,
        _adapter: &Arc<dyn NetworkAdapter>,
    ) -> Result<Option<u16>, RxError> {
        let (ip_src, ip_dst) = match packet.layer(Ipv4Protocol::LAYER).attributes {
            LayerAttributes::Ipv4 { src, dst } => (src, dst),
            _ => return Err(RxError::InvalidContent),
        };
        let current = packet.current();
        if current.len() < UdpPacket::minimum_packet_size() {
            return Err(RxError::InvalidLength);
        }
        let length = {
            let udp_pkg = UdpPacket::new(current).unwrap();
            usize::from(udp_pkg.get_length())
        };
        if length < UdpPacket::minimum_packet_size() || length > current.len() {
            return Err(RxError::InvalidLength);
        }
        let udp_pkg = UdpPacket::new(&current[..length]).unwrap();
        let udp_checksum = udp_pkg.get_checksum();
        // A checksum of zero means the sender did not compute one
        if udp_checksum != 0 && ipv4_checksum(&udp_pkg, &ip_src, &ip_dst) != udp_checksum {
            return Err(RxError::InvalidChecksum);
        }
        let src_port = udp_pkg.get_source();
        let dst_port = udp_pkg.get_destination();
        let data = udp_pkg.payload().to_vec();

        match self.queue_for(ip_dst, dst_port) {
            Some(queue) => {
                trace!("udp delivering {} bytes to port {}", data.len(), dst_port);
                queue.push(Datagram {
                    src_ip: ip_src,
                    src_port,
                    data,
                });
            }
            None => {
                debug!("no listener on udp port {}, replying port unreachable", dst_port);
                let mut error_packet = packet.layer_data(Ipv4Protocol::LAYER).to_vec();
                error_packet.extend_from_slice(packet.current());
                let options = TxOptions::icmp(IcmpTxOptions::DestinationUnreachable {
                    code: IcmpCodes::DestinationPortUnreachable,
                    error_packet,
                });
                if let Err(e) = stack.send(IcmpProtocol::NAME, ip_src, None, options) {
                    warn!("unable to send port unreachable to {}: {}", ip_src, e);
                }
            }
        }
        Ok(None)
    }
}
