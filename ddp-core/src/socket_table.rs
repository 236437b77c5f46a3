//! The socket table: bound DDP endpoints keyed by `(net, node, port)`.
//!
//! The original kernel keeps these on an intrusive singly-linked list
//! under one mutex; here the same scan+mutate atomicity is obtained from
//! an `ahash`-backed map behind a single lock, per the engine's
//! redesign notes.

use std::sync::Arc;

use ahash::AHashMap;
use tokio::sync::RwLock;

use crate::address::{SocketAddr, BCAST};
use crate::error::{DdpError, Result};
use crate::iface::Interface;
use crate::socket::Socket;

pub type SocketKey = (u16, u8, u8);

fn key_of(addr: SocketAddr) -> SocketKey {
    (addr.net, addr.node, addr.port)
}

#[derive(Default)]
pub struct SocketTable {
    inner: RwLock<AHashMap<SocketKey, Arc<Socket>>>,
}

impl SocketTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn find_exact(&self, addr: SocketAddr) -> Option<Arc<Socket>> {
        self.inner.read().await.get(&key_of(addr)).cloned()
    }

    /// Insert `socket` at `addr`, failing if the tuple is already taken.
    pub async fn insert(&self, addr: SocketAddr, socket: Arc<Socket>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = key_of(addr);
        if inner.contains_key(&key) {
            return Err(DdpError::AddressInUse(addr));
        }
        inner.insert(key, socket);
        Ok(())
    }

    pub async fn remove(&self, addr: SocketAddr) {
        self.inner.write().await.remove(&key_of(addr));
    }

    /// Lowest free port in `[first, last]` for `(net, node)`, if any.
    pub async fn lowest_free_port(&self, net: u16, node: u8, first: u8, last: u8) -> Option<u8> {
        let inner = self.inner.read().await;
        (first..=last).find(|&port| !inner.contains_key(&(net, node, port)))
    }

    /// Find a socket matching a packet destined to `dest`, received on
    /// `atif`: exact `(net, node, port)` match, or the "this network"
    /// broadcast relaxation (`dest.net == 0 && dest.node == BCAST`)
    /// matching any socket bound to the receiving interface's net on that
    /// port.
    pub async fn search(&self, dest: SocketAddr, atif: &Interface) -> Option<Arc<Socket>> {
        let inner = self.inner.read().await;
        if let Some(found) = inner.get(&key_of(dest)) {
            return Some(found.clone());
        }
        if dest.net == 0 && dest.node == BCAST {
            return inner
                .iter()
                .find(|((net, _node, port), _)| *port == dest.port && *net == atif.address.net)
                .map(|(_, s)| s.clone());
        }
        None
    }

    pub async fn snapshot(&self) -> Vec<Arc<Socket>> {
        self.inner.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::SocketAddr;
    use crate::socket::SocketKind;

    #[tokio::test]
    async fn insert_rejects_duplicate_tuple() {
        let table = SocketTable::new();
        let addr = SocketAddr::new(1000, 5, 128);
        let s1 = Arc::new(Socket::new(SocketKind::Dgram, crate::address::Permission::User));
        let s2 = Arc::new(Socket::new(SocketKind::Dgram, crate::address::Permission::User));
        table.insert(addr, s1).await.unwrap();
        assert!(table.insert(addr, s2).await.is_err());
    }

    #[tokio::test]
    async fn lowest_free_port_finds_gap() {
        let table = SocketTable::new();
        table
            .insert(
                SocketAddr::new(1000, 5, 0x80),
                Arc::new(Socket::new(SocketKind::Dgram, crate::address::Permission::User)),
            )
            .await
            .unwrap();
        let free = table.lowest_free_port(1000, 5, 0x80, 0xFE).await;
        assert_eq!(free, Some(0x81));
    }
}
