//! Abstract link-layer devices and the `pnet` datalink backed
//! implementation used for real network access.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use pnet::datalink::{self, DataLinkReceiver, DataLinkSender, NetworkInterface};
use pnet::util::MacAddr;

use crate::{StackError, StackResult, TxError, TxResult, DEFAULT_BUFFER_SIZE, DEFAULT_MTU};

/// A logical link-layer device the stack can send frames through. The MAC,
/// IPv4 address and netmask describe the network the device sits on; the
/// optional gateway makes it a default route candidate.
pub trait NetworkAdapter: Send + Sync {
    fn mac(&self) -> MacAddr;

    fn ip(&self) -> Ipv4Addr;

    fn netmask(&self) -> Ipv4Addr;

    fn gateway(&self) -> Option<Ipv4Addr> {
        None
    }

    fn mtu(&self) -> usize {
        DEFAULT_MTU
    }

    /// Queue one complete ethernet frame for transmission.
    fn send(&self, frame: &[u8]) -> TxResult;
}

/// Adapter identity. Two `Arc`s pointing at the same adapter are the same
/// adapter; equal addresses on distinct instances are not.
pub fn same_adapter(a: &Arc<dyn NetworkAdapter>, b: &Arc<dyn NetworkAdapter>) -> bool {
    Arc::ptr_eq(a, b)
}

pub(crate) fn adapter_key(adapter: &Arc<dyn NetworkAdapter>) -> usize {
    Arc::as_ptr(adapter) as *const () as usize
}

/// The addressing properties of one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterConfig {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
    pub mtu: usize,
}

impl AdapterConfig {
    pub fn new(mac: MacAddr, ip: Ipv4Addr, netmask: Ipv4Addr) -> AdapterConfig {
        AdapterConfig {
            mac,
            ip,
            netmask,
            gateway: None,
            mtu: DEFAULT_MTU,
        }
    }

    pub fn with_gateway(mut self, gateway: Ipv4Addr) -> AdapterConfig {
        self.gateway = Some(gateway);
        self
    }
}

/// Represents the channel used for sending to and reading from one network
/// interface. Basically a simplification of `pnet::datalink::Channel` but
/// guaranteed to be ethernet.
pub struct EthernetChannel(pub Box<dyn DataLinkSender>, pub Box<dyn DataLinkReceiver>);

impl EthernetChannel {
    /// Opens an ethernet channel on the given OS interface with the
    /// default buffer sizing.
    pub fn from_interface(interface: &NetworkInterface) -> StackResult<EthernetChannel> {
        let mut config = datalink::Config::default();
        config.write_buffer_size = DEFAULT_BUFFER_SIZE;
        config.read_buffer_size = DEFAULT_BUFFER_SIZE;
        match datalink::channel(interface, config) {
            Ok(datalink::Channel::Ethernet(sender, receiver)) => {
                Ok(EthernetChannel(sender, receiver))
            }
            Ok(_) => Err(StackError::InvalidInterface),
            Err(e) => Err(StackError::TxError(TxError::IoError(e))),
        }
    }
}

/// `NetworkAdapter` backed by the sending half of a `pnet` datalink
/// channel. The receiving half is pumped by a receive thread spawned when
/// the adapter is registered with the stack.
pub struct DatalinkAdapter {
    config: AdapterConfig,
    sender: Mutex<Box<dyn DataLinkSender>>,
}

impl DatalinkAdapter {
    pub fn new(config: AdapterConfig, sender: Box<dyn DataLinkSender>) -> DatalinkAdapter {
        DatalinkAdapter {
            config,
            sender: Mutex::new(sender),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }
}

impl NetworkAdapter for DatalinkAdapter {
    fn mac(&self) -> MacAddr {
        self.config.mac
    }

    fn ip(&self) -> Ipv4Addr {
        self.config.ip
    }

    fn netmask(&self) -> Ipv4Addr {
        self.config.netmask
    }

    fn gateway(&self) -> Option<Ipv4Addr> {
        self.config.gateway
    }

    fn mtu(&self) -> usize {
        self.config.mtu
    }

    fn send(&self, frame: &[u8]) -> TxResult {
        let mut sender = self.sender.lock().map_err(|_| TxError::PoisonedLock)?;
        match sender.send_to(frame, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(TxError::IoError(e)),
            None => Err(TxError::InsufficientBuffer),
        }
    }
}
