//! The socket object: state machine, receive queue, and the
//! reference-counted deferred-destruction scheme that replaces the
//! original kernel's 10-second re-arming timer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, RwLock};

use crate::address::{Permission, SocketAddr};
use crate::error::{DdpError, Result};
use crate::packet::Packet;

/// Default receive-buffer cap, in bytes.
pub const DEFAULT_RCV_BUF_BYTES: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Dgram,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Unbound,
    Bound,
    Connected,
    Closed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SocketFlags {
    pub broadcast: bool,
    pub no_checksum: bool,
    pub debug: bool,
}

struct QueuedPacket {
    packet: Packet,
    peer: SocketAddr,
}

/// A reference that keeps a socket's queue alive while a forward/loopback
/// path still intends to enqueue into it. `close()` awaits until the last
/// guard for a socket is dropped instead of re-arming a timer.
pub struct OwnerGuard {
    count: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify.notify_waiters();
        }
    }
}

pub struct Socket {
    pub kind: SocketKind,
    pub permission: Permission,
    state: RwLock<SocketState>,
    local: RwLock<SocketAddr>,
    peer: RwLock<Option<SocketAddr>>,
    pub flags: RwLock<SocketFlags>,
    rcv_queue: Mutex<VecDeque<QueuedPacket>>,
    rcv_bytes: AtomicUsize,
    rcv_buf_bytes: usize,
    last_error: Mutex<Option<DdpError>>,
    data_ready: Notify,
    owner_refs: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

impl Socket {
    pub fn new(kind: SocketKind, permission: Permission) -> Self {
        Self {
            kind,
            permission,
            state: RwLock::new(SocketState::Unbound),
            local: RwLock::new(SocketAddr::default()),
            peer: RwLock::new(None),
            flags: RwLock::new(SocketFlags::default()),
            rcv_queue: Mutex::new(VecDeque::new()),
            rcv_bytes: AtomicUsize::new(0),
            rcv_buf_bytes: DEFAULT_RCV_BUF_BYTES,
            last_error: Mutex::new(None),
            data_ready: Notify::new(),
            owner_refs: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
        }
    }

    pub async fn state(&self) -> SocketState {
        *self.state.read().await
    }

    pub async fn local(&self) -> SocketAddr {
        *self.local.read().await
    }

    pub async fn peer(&self) -> Option<SocketAddr> {
        *self.peer.read().await
    }

    /// Transition `Unbound -> Bound` and record the local address.
    /// Used both by explicit `bind` and by autobind.
    pub async fn mark_bound(&self, addr: SocketAddr) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != SocketState::Unbound {
            return Err(DdpError::AlreadyBound);
        }
        *state = SocketState::Bound;
        *self.local.write().await = addr;
        Ok(())
    }

    /// Transition `Bound|Unbound -> Connected` and record the peer.
    pub async fn mark_connected(&self, peer: SocketAddr) -> Result<()> {
        *self.state.write().await = SocketState::Connected;
        *self.peer.write().await = Some(peer);
        Ok(())
    }

    pub async fn mark_closed(&self) {
        *self.state.write().await = SocketState::Closed;
    }

    /// Acquire a reference that defers this socket's effective
    /// destruction until it (and every other outstanding guard) is
    /// dropped. Held by in-flight forward/loopback paths that still
    /// intend to enqueue a packet into this socket.
    pub fn acquire_owner_ref(&self) -> OwnerGuard {
        self.owner_refs.fetch_add(1, Ordering::AcqRel);
        OwnerGuard {
            count: self.owner_refs.clone(),
            notify: self.drained.clone(),
        }
    }

    /// Mark closed and wait for every outstanding [`OwnerGuard`] to drop,
    /// then release the queue. Replaces the timer-based re-arm scheme.
    pub async fn close(&self) {
        self.mark_closed().await;
        while self.owner_refs.load(Ordering::Acquire) != 0 {
            self.drained.notified().await;
        }
        self.rcv_queue.lock().await.clear();
        self.rcv_bytes.store(0, Ordering::Relaxed);
    }

    /// Enqueue a received packet with `peer` as its source address.
    /// Silently drops the packet if it would exceed `rcv_buf_bytes`
    /// (datagram loss is silent, matching UDP semantics).
    pub async fn enqueue(&self, packet: Packet, peer: SocketAddr) {
        let len = packet.len();
        let mut queue = self.rcv_queue.lock().await;
        let current = self.rcv_bytes.load(Ordering::Relaxed);
        if current + len > self.rcv_buf_bytes {
            return;
        }
        self.rcv_bytes.fetch_add(len, Ordering::Relaxed);
        queue.push_back(QueuedPacket { packet, peer });
        drop(queue);
        self.data_ready.notify_waiters();
    }

    fn pop(&self, queue: &mut VecDeque<QueuedPacket>) -> Option<(Packet, SocketAddr)> {
        queue.pop_front().map(|q| {
            self.rcv_bytes.fetch_sub(q.packet.len(), Ordering::Relaxed);
            (q.packet, q.peer)
        })
    }

    /// Non-blocking receive: `Err(WouldBlock)` if the queue is empty.
    pub async fn try_recv(&self) -> Result<(Packet, SocketAddr)> {
        if let Some(err) = self.last_error.lock().await.take() {
            return Err(err);
        }
        let mut queue = self.rcv_queue.lock().await;
        self.pop(&mut queue).ok_or(DdpError::WouldBlock)
    }

    /// Blocking receive: waits for a packet, shutdown, or cancellation.
    pub async fn recv(&self, cancel: &tokio_util::sync::CancellationToken) -> Result<(Packet, SocketAddr)> {
        if let Some(err) = self.last_error.lock().await.take() {
            return Err(err);
        }
        loop {
            {
                let mut queue = self.rcv_queue.lock().await;
                if let Some(item) = self.pop(&mut queue) {
                    return Ok(item);
                }
            }
            if self.state().await == SocketState::Closed {
                return Err(DdpError::Shutdown);
            }
            tokio::select! {
                _ = self.data_ready.notified() => {}
                _ = cancel.cancelled() => return Err(DdpError::Interrupted),
            }
        }
    }

    pub async fn set_last_error(&self, err: DdpError) {
        *self.last_error.lock().await = Some(err);
    }

    pub async fn rcv_queue_len(&self) -> usize {
        self.rcv_queue.lock().await.len()
    }

    pub fn rcv_queue_bytes(&self) -> usize {
        self.rcv_bytes.load(Ordering::Relaxed)
    }
}
