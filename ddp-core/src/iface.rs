//! The interface table: registered interfaces, their addresses and
//! netranges, and the address-resolution probe that brings one up.

use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address::{NetAddr, NetRange};
use crate::error::{DdpError, Result};
use crate::link::{Aarp, ProbeOutcome};

/// How many AARP probes are sent per candidate address before it is
/// considered free of conflict.
pub const AARP_RETRANSMIT_LIMIT: u32 = 3;
/// Delay between successive probe transmissions for the same candidate.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfaceStatus {
    Probing,
    ProbeFail,
    Stable,
    Loopback,
}

#[derive(Debug, Clone)]
pub struct Interface {
    pub dev_id: String,
    pub hw_addr: [u8; 6],
    pub address: NetAddr,
    pub nets: NetRange,
    pub status: IfaceStatus,
}

#[derive(Default)]
struct InterfaceTableInner {
    interfaces: Vec<Interface>,
    probing: std::collections::HashMap<String, CancellationToken>,
}

/// Concurrent interface table, acquired first per the engine's fixed
/// lock order (`interfaces → routes → sockets`).
#[derive(Default)]
pub struct InterfaceTable {
    inner: RwLock<InterfaceTableInner>,
}

impl InterfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<Interface> {
        self.inner.read().await.interfaces.clone()
    }

    pub async fn find_by_dev(&self, dev_id: &str) -> Option<Interface> {
        self.inner
            .read()
            .await
            .interfaces
            .iter()
            .find(|i| i.dev_id == dev_id)
            .cloned()
    }

    /// Match any interface on `dev_id` whose address node equals `node`,
    /// or any interface on `dev_id` when `node == BCAST`.
    pub async fn find_any_net(&self, node: u8, dev_id: &str) -> Option<Interface> {
        let inner = self.inner.read().await;
        inner
            .interfaces
            .iter()
            .find(|i| i.dev_id == dev_id && (i.address.node == node || node == crate::address::BCAST))
            .cloned()
    }

    /// Match an interface across all devices whose net equals `net` and
    /// whose node equals `node`, or any node when `node == BCAST`.
    pub async fn find_exact(&self, net: u16, node: u8) -> Option<Interface> {
        self.inner
            .read()
            .await
            .interfaces
            .iter()
            .find(|i| i.address.net == net && (i.address.node == node || node == crate::address::BCAST))
            .cloned()
    }

    /// The first non-loopback interface, else the first interface, else `None`.
    pub async fn primary(&self) -> Option<Interface> {
        let inner = self.inner.read().await;
        inner
            .interfaces
            .iter()
            .find(|i| i.status != IfaceStatus::Loopback)
            .or_else(|| inner.interfaces.first())
            .cloned()
    }

    /// Begin probing a candidate address range on `dev_id` and, on
    /// success, install the resulting interface. `probe_seed` replaces
    /// the original kernel's jiffies-derived start offset with an
    /// explicit caller-supplied seed so probing is deterministic in
    /// tests; it is reduced modulo the *closed* range width before being
    /// added to `first_net`, so there is no off-by-one window past
    /// `last_net`.
    pub async fn probe_and_add(
        &self,
        dev_id: &str,
        hw_addr: [u8; 6],
        nets: NetRange,
        loopback: bool,
        probe_seed: u32,
        aarp: &dyn Aarp,
    ) -> Result<Interface> {
        if nets.phase != 2 {
            return Err(DdpError::Invalid("only phase 2 AppleTalk is supported".into()));
        }

        let token = {
            let mut inner = self.inner.write().await;
            if inner.probing.contains_key(dev_id) {
                return Err(DdpError::Busy);
            }
            let token = CancellationToken::new();
            inner.probing.insert(dev_id.to_string(), token.clone());
            token
        };

        let result = self
            .run_probe(dev_id, nets, probe_seed, loopback, &token, aarp)
            .await;

        let mut inner = self.inner.write().await;
        inner.probing.remove(dev_id);

        match result {
            Ok(address) => {
                let status = if loopback { IfaceStatus::Loopback } else { IfaceStatus::Stable };
                let iface = Interface {
                    dev_id: dev_id.to_string(),
                    hw_addr,
                    address,
                    nets,
                    status,
                };
                inner.interfaces.retain(|i| i.dev_id != dev_id);
                inner.interfaces.push(iface.clone());
                info!(dev = dev_id, %address, "interface stable");
                Ok(iface)
            }
            Err(e) => {
                warn!(dev = dev_id, error = %e, "interface probe failed");
                Err(e)
            }
        }
    }

    async fn run_probe(
        &self,
        dev_id: &str,
        nets: NetRange,
        probe_seed: u32,
        loopback: bool,
        token: &CancellationToken,
        aarp: &dyn Aarp,
    ) -> Result<NetAddr> {
        if loopback {
            // A loopback device never conflicts with itself; skip AARP entirely.
            let net = nets.first_net;
            return Ok(NetAddr::new(net, 1));
        }

        let width = nets.width();
        let base_offset = probe_seed % width;

        for node_try in 0..253u16 {
            if token.is_cancelled() {
                return Err(DdpError::Interrupted);
            }
            let node = (1 + node_try) as u8; // [1, 253]
            for net_try in 0..width {
                let net_offset = (base_offset + net_try) % width;
                let net = nets.first_net + net_offset as u16;
                let candidate = NetAddr::new(net, node);

                let mut conflict = false;
                for _ in 0..AARP_RETRANSMIT_LIMIT {
                    if token.is_cancelled() {
                        return Err(DdpError::Interrupted);
                    }
                    debug!(dev = dev_id, %candidate, "sending AARP probe");
                    if aarp.send_probe(dev_id, candidate) == ProbeOutcome::Conflict {
                        conflict = true;
                        break;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(PROBE_INTERVAL) => {}
                        _ = token.cancelled() => return Err(DdpError::Interrupted),
                    }
                }
                if !conflict {
                    return Ok(candidate);
                }
            }
        }
        Err(DdpError::AddressInUse(crate::address::SocketAddr::new(
            nets.first_net,
            0,
            0,
        )))
    }

    /// Cancel an in-progress probe and remove the interface, if present.
    pub async fn drop_iface(&self, dev_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(token) = inner.probing.remove(dev_id) {
            token.cancel();
        }
        inner.interfaces.retain(|i| i.dev_id != dev_id);
    }
}
