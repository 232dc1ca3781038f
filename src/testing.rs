//! Helpers for testing code built on the stack without touching a real
//! network device. Frames "sent" by the `MockAdapter` land in an `mpsc`
//! channel the test reads from; incoming frames are injected straight into
//! `NetworkStack::add_packet`.

use std::net::Ipv4Addr;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

use pnet::util::MacAddr;

use crate::adapter::{AdapterConfig, NetworkAdapter};
use crate::stack::NetworkStack;
use crate::{TxError, TxResult};

pub struct MockAdapter {
    config: AdapterConfig,
    sent: Mutex<mpsc::Sender<Vec<u8>>>,
}

impl MockAdapter {
    pub fn new(config: AdapterConfig) -> (Arc<dyn NetworkAdapter>, Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let adapter = MockAdapter {
            config,
            sent: Mutex::new(tx),
        };
        (Arc::new(adapter), rx)
    }
}

impl NetworkAdapter for MockAdapter {
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
        self.sent
            .lock()
            .map_err(|_| TxError::PoisonedLock)?
            .send(frame.to_vec())
            .map_err(|_| TxError::Other("mock frame receiver is gone".to_owned()))
    }
}

/// A stack with one mock adapter: MAC `01:23:45:67:89:ab`, IP `1.2.3.4`,
/// netmask `0.0.0.0` so everything routes through it. Returns the read
/// handle yielding every frame the stack transmits.
pub fn dummy_stack() -> (Arc<NetworkStack>, Arc<dyn NetworkAdapter>, Receiver<Vec<u8>>) {
    let stack = NetworkStack::new();
    let config = AdapterConfig::new(
        MacAddr::new(0x01, 0x23, 0x45, 0x67, 0x89, 0xab),
        Ipv4Addr::new(1, 2, 3, 4),
        Ipv4Addr::new(0, 0, 0, 0),
    );
    let (adapter, read_handle) = MockAdapter::new(config);
    stack
        .add_adapter(adapter.clone())
        .expect("Unable to add mock adapter");
    (stack, adapter, read_handle)
}
