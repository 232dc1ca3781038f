use std::net::Ipv4Addr;
use std::sync::Arc;

use ipnetwork::Ipv4Network;

use crate::adapter::NetworkAdapter;
use crate::{StackError, StackResult};

/// One route: packets for `net` leave through `adapter`, addressed to
/// `gateway` when one is set.
pub struct RouteEntry {
    pub adapter: Arc<dyn NetworkAdapter>,
    pub net: Ipv4Network,
    pub gateway: Option<Ipv4Addr>,
}

impl RouteEntry {
    pub fn new(
        adapter: Arc<dyn NetworkAdapter>,
        net: Ipv4Network,
        gateway: Option<Ipv4Addr>,
    ) -> RouteEntry {
        RouteEntry {
            adapter,
            net,
            gateway,
        }
    }

    /// Grade of routing `ip` with this entry. A larger netmask means a
    /// more specific and therefore preferable route. -1 means the entry
    /// can't be used at all.
    fn grade(&self, ip: Ipv4Addr) -> i64 {
        if self.net.contains(ip) {
            i64::from(u32::from(self.net.mask()))
        } else {
            -1
        }
    }
}

/// Ordered list of routes. Lookups pick the entry with the strictly
/// highest grade; on equal grades the entry inserted first wins.
#[derive(Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> RouteTable {
        RouteTable { entries: Vec::new() }
    }

    /// Installs the natural routes of `adapter`: a default route through
    /// its gateway when it has one, and the directly attached network.
    /// The gateway must be inside the adapter's own network.
    pub fn add_adapter(&mut self, adapter: Arc<dyn NetworkAdapter>) -> StackResult<()> {
        let net = Ipv4Network::with_netmask(adapter.ip(), adapter.netmask())
            .map_err(|_| StackError::IllegalArgument)?;
        if let Some(gateway) = adapter.gateway() {
            if !net.contains(gateway) {
                return Err(StackError::IllegalArgument);
            }
            let default_net = Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0).unwrap();
            self.entries
                .push(RouteEntry::new(adapter.clone(), default_net, Some(gateway)));
        }
        self.entries.push(RouteEntry::new(adapter, net, None));
        Ok(())
    }

    /// Adds a route that is not a natural route of any adapter.
    pub fn add_static_route(&mut self, entry: RouteEntry) {
        self.entries.push(entry);
    }

    /// Finds the adapter to use for `ip`. Returns the adapter and the
    /// gateway to address the frame to, `None` when `ip` is directly
    /// reachable.
    pub fn route(&self, ip: Ipv4Addr) -> Option<(Arc<dyn NetworkAdapter>, Option<Ipv4Addr>)> {
        let mut best_grade = -1;
        let mut best_entry = None;
        for entry in &self.entries {
            let grade = entry.grade(ip);
            if grade > best_grade {
                best_grade = grade;
                best_entry = Some(entry);
            }
        }
        best_entry.map(|entry| (entry.adapter.clone(), entry.gateway))
    }

    /// Removes every entry using `adapter`, natural and static alike.
    pub fn remove_adapter(&mut self, adapter: &Arc<dyn NetworkAdapter>) {
        self.entries
            .retain(|entry| !Arc::ptr_eq(&entry.adapter, adapter));
    }
}
