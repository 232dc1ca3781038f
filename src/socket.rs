//! `UdpSocket`: the socket facade over the UDP protocol and the stack's
//! routing. Mirrors the shape of `std::net::UdpSocket` where it can.

use std::net::Ipv4Addr;
use std::sync::Arc;

use rand::Rng;

use crate::adapter::NetworkAdapter;
use crate::graph::TxOptions;
use crate::stack::NetworkStack;
use crate::udp::{Datagram, UdpProtocol};
use crate::{SocketError, SocketResult};

pub struct UdpSocket {
    stack: Arc<NetworkStack>,
    src_ip: Option<Ipv4Addr>,
    src_adapter: Option<Arc<dyn NetworkAdapter>>,
    src_port: Option<u16>,
    dst: Option<(Ipv4Addr, u16)>,
    closed: bool,
}

impl UdpSocket {
    pub fn new(stack: Arc<NetworkStack>) -> UdpSocket {
        UdpSocket {
            stack,
            src_ip: None,
            src_adapter: None,
            src_port: None,
            dst: None,
            closed: false,
        }
    }

    /// Binds the socket to the given ip and port, making it the source of
    /// everything sent and the destination of everything received here.
    /// `None` (or `0.0.0.0`) binds on all adapters. Port 0 picks a random
    /// free port, probing up to the configured number of tries.
    pub fn bind(&mut self, src_ip: Option<Ipv4Addr>, src_port: u16) -> SocketResult<()> {
        if self.closed {
            return Err(SocketError::Closed);
        }
        let mut bind_ip = None;
        if let Some(ip) = src_ip {
            if ip != Ipv4Addr::UNSPECIFIED {
                self.src_adapter = Some(self.stack.get_adapter(ip)?);
                bind_ip = Some(ip);
            }
        }

        let udp = self.stack.udp();
        let port = if src_port == 0 {
            self.bind_random_port(udp, bind_ip)?
        } else {
            udp.open_port(bind_ip, src_port)?;
            src_port
        };
        self.src_ip = bind_ip;
        self.src_port = Some(port);
        Ok(())
    }

    fn bind_random_port(&self, udp: &UdpProtocol, bind_ip: Option<Ipv4Addr>) -> SocketResult<u16> {
        let mut rng = rand::thread_rng();
        for _ in 0..self.stack.config().bind_tries {
            let port = rng.gen_range(1..=u16::max_value());
            match udp.open_port(bind_ip, port) {
                Ok(()) => return Ok(port),
                Err(SocketError::PortAlreadyOpened) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SocketError::NoFreePort)
    }

    /// Marks the given ip and port as the destination of this socket so
    /// `send` can be used and not only `send_to`.
    pub fn connect(&mut self, dst_ip: Ipv4Addr, dst_port: u16) -> SocketResult<()> {
        if self.closed {
            return Err(SocketError::Closed);
        }
        self.dst = Some((dst_ip, dst_port));
        Ok(())
    }

    /// Sends to the connected destination, binding to a random port first
    /// when the socket is still unbound.
    pub fn send(&mut self, data: &[u8]) -> SocketResult<()> {
        if self.closed {
            return Err(SocketError::Closed);
        }
        let (dst_ip, dst_port) = self.dst.ok_or(SocketError::NotConnected)?;
        if self.src_port.is_none() {
            self.bind(None, 0)?;
        }
        let src_port = self.src_port.unwrap();
        self.stack
            .send(
                UdpProtocol::NAME,
                dst_ip,
                self.src_adapter.as_ref(),
                TxOptions::udp(src_port, dst_port, data.to_vec()),
            )
            .map_err(SocketError::Stack)
    }

    /// Sends to an explicit destination without touching the connected
    /// state.
    pub fn send_to(&mut self, data: &[u8], dst_ip: Ipv4Addr, dst_port: u16) -> SocketResult<()> {
        if self.closed {
            return Err(SocketError::Closed);
        }
        if self.src_port.is_none() {
            self.bind(None, 0)?;
        }
        let src_port = self.src_port.unwrap();
        self.stack
            .send(
                UdpProtocol::NAME,
                dst_ip,
                None,
                TxOptions::udp(src_port, dst_port, data.to_vec()),
            )
            .map_err(SocketError::Stack)
    }

    /// Blocks until the next datagram for the bound port and returns its
    /// payload.
    pub fn recv(&mut self) -> SocketResult<Vec<u8>> {
        self.recv_from().map(|datagram| datagram.data)
    }

    /// Like `recv` but also returns who sent the datagram.
    pub fn recv_from(&mut self) -> SocketResult<Datagram> {
        if self.closed {
            return Err(SocketError::Closed);
        }
        let port = self.src_port.ok_or(SocketError::NotBound)?;
        self.stack.udp().get_packet(self.src_ip, port)
    }

    pub fn local_addr(&self) -> Option<(Option<Ipv4Addr>, u16)> {
        self.src_port.map(|port| (self.src_ip, port))
    }

    /// Closes the socket and stops listening on its port. Idempotent, and
    /// also run on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(port) = self.src_port.take() {
            self.stack.udp().close_port(self.src_ip, port);
        }
    }
}

impl Drop for UdpSocket {
    fn drop(&mut self) {
        self.close();
    }
}
