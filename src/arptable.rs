use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pnet::util::MacAddr;

struct ArpEntry {
    mac: Option<MacAddr>,
    updated: Instant,
    listeners: Vec<Sender<MacAddr>>,
}

impl ArpEntry {
    fn new() -> ArpEntry {
        ArpEntry {
            mac: None,
            // The timestamp is irrelevant while mac is None
            updated: Instant::now(),
            listeners: Vec::new(),
        }
    }

    fn fresh_mac(&self, timeout: Duration) -> Option<MacAddr> {
        self.mac.filter(|_| self.updated.elapsed() < timeout)
    }
}

#[derive(Default)]
struct TableData {
    entries: HashMap<Ipv4Addr, ArpEntry>,
}

/// IP to MAC cache for one adapter. Entries go stale `entry_timeout` after
/// their last update and are then re-resolved; they are never evicted.
///
/// The actual data sits behind a `Mutex` so the table can be shared
/// between the resolver and the ARP receive path.
#[derive(Clone)]
pub struct ArpTable {
    data: Arc<Mutex<TableData>>,
    entry_timeout: Duration,
}

impl ArpTable {
    pub fn new(entry_timeout: Duration) -> ArpTable {
        ArpTable {
            data: Arc::new(Mutex::new(TableData::default())),
            entry_timeout,
        }
    }

    /// Queries the table for a MAC. A fresh entry is returned directly.
    /// Otherwise the caller gets a `Receiver` that will yield the MAC once
    /// some resolution updates the entry; every waiter registered on one
    /// entry is woken by the same update, so concurrent resolutions of the
    /// same IP all observe the same MAC.
    pub fn get(&self, ip: Ipv4Addr) -> Result<MacAddr, Receiver<MacAddr>> {
        let mut data = self.data.lock().expect("Unable to lock Arp table");
        let entry = data.entries.entry(ip).or_insert_with(ArpEntry::new);
        if let Some(mac) = entry.fresh_mac(self.entry_timeout) {
            return Ok(mac);
        }
        let (tx, rx) = mpsc::channel();
        entry.listeners.push(tx);
        Err(rx)
    }

    /// Inserts an IP to MAC mapping and wakes everyone waiting for it.
    /// Each resolution drains the waiter list, so a later unknown to known
    /// transition signals a fresh set of waiters.
    pub fn insert(&self, ip: Ipv4Addr, mac: MacAddr) {
        let mut data = self.data.lock().expect("Unable to lock Arp table for writing");
        let entry = data.entries.entry(ip).or_insert_with(ArpEntry::new);
        entry.mac = Some(mac);
        entry.updated = Instant::now();
        for listener in entry.listeners.drain(..) {
            listener.send(mac).unwrap_or(());
        }
    }
}
