//! `NetCore`: the value that owns the three tables and the handles to the
//! external link/AARP/device collaborators, and the socket-lifecycle
//! operations that span more than one table.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::address::{Permission, SocketAddr, EPHEMERAL_FIRST, EPHEMERAL_LAST};
use crate::error::{DdpError, Result};
use crate::iface::InterfaceTable;
use crate::link::{Aarp, DeviceRegistry, LinkLayer};
use crate::route::RouteTable;
use crate::socket::{Socket, SocketKind};
use crate::socket_table::SocketTable;

/// Owns the interface, route, and socket tables plus the external
/// collaborators the engine sends through. Table fields are public in
/// this fixed order (`interfaces → routes → sockets`) so a caller that
/// genuinely needs more than one can acquire them in that order and
/// never across an await point together.
pub struct NetCore {
    pub interfaces: InterfaceTable,
    pub routes: RouteTable,
    pub sockets: SocketTable,
    pub aarp: Arc<dyn Aarp>,
    pub link: Arc<dyn LinkLayer>,
    pub devices: Arc<dyn DeviceRegistry>,
}

impl NetCore {
    pub fn new(aarp: Arc<dyn Aarp>, link: Arc<dyn LinkLayer>, devices: Arc<dyn DeviceRegistry>) -> Self {
        Self {
            interfaces: InterfaceTable::new(),
            routes: RouteTable::new(),
            sockets: SocketTable::new(),
            aarp,
            link,
            devices,
        }
    }

    /// Open a new, unbound socket handle. Does not register it in the
    /// socket table; it becomes addressable on `bind`/`connect`/autobind.
    pub fn open(&self, kind: SocketKind, caller: Permission) -> Arc<Socket> {
        Arc::new(Socket::new(kind, caller))
    }

    /// Run autobind: pick `(primary().net, primary().node)` and the
    /// lowest free ephemeral port.
    pub async fn autobind(&self, socket: &Arc<Socket>) -> Result<SocketAddr> {
        self.bind(socket, SocketAddr::new(0, 0, 0)).await
    }

    /// Bind `socket` to `requested`. `net == 0 && node == 0` asks for the
    /// primary interface's address; any other `(net, node)` must match an
    /// existing interface's address exactly. `port == 0` autobinds to the
    /// lowest free port in the ephemeral range.
    #[instrument(skip(self, socket), fields(requested = %requested))]
    pub async fn bind(&self, socket: &Arc<Socket>, requested: SocketAddr) -> Result<SocketAddr> {
        let (net, node) = if requested.net == 0 && requested.node == 0 {
            let primary = self.interfaces.primary().await.ok_or(DdpError::AddressUnavailable)?;
            (primary.address.net, primary.address.node)
        } else {
            let iface = self
                .interfaces
                .find_exact(requested.net, requested.node)
                .await
                .ok_or(DdpError::AddressUnavailable)?;
            (iface.address.net, iface.address.node)
        };

        let port = if requested.port == 0 {
            self.sockets
                .lowest_free_port(net, node, EPHEMERAL_FIRST, EPHEMERAL_LAST)
                .await
                .ok_or(DdpError::NoPort)?
        } else {
            requested.port
        };

        let addr = SocketAddr::new(net, node, port);
        self.sockets.insert(addr, socket.clone()).await?;
        if let Err(e) = socket.mark_bound(addr).await {
            self.sockets.remove(addr).await;
            return Err(e);
        }
        Ok(addr)
    }

    /// Connect `socket` to `peer`, autobinding first if necessary.
    #[instrument(skip(self, socket), fields(peer = %peer))]
    pub async fn connect(&self, socket: &Arc<Socket>, peer: SocketAddr) -> Result<()> {
        if socket.state().await == crate::socket::SocketState::Unbound {
            self.autobind(socket).await.map_err(|_| DdpError::Busy)?;
        }
        if peer.net != 0 && self.routes.find(peer.addr()).await.is_none() {
            return Err(DdpError::NetUnreachable(peer.addr()));
        }
        socket.mark_connected(peer).await
    }

    /// Resolve this socket's local or peer name, autobinding first if
    /// the socket is still unbound.
    #[instrument(skip(self, socket))]
    pub async fn getname(&self, socket: &Arc<Socket>, want_peer: bool) -> Result<SocketAddr> {
        if socket.state().await == crate::socket::SocketState::Unbound {
            self.autobind(socket).await?;
        }
        if want_peer {
            socket.peer().await.ok_or(DdpError::NotConnected)
        } else {
            Ok(socket.local().await)
        }
    }

    /// Close `socket`: remove it from the socket table (if bound) and
    /// drain its receive queue once every outstanding reference drops.
    #[instrument(skip(self, socket))]
    pub async fn close(&self, socket: &Arc<Socket>) {
        let local = socket.local().await;
        if socket.state().await != crate::socket::SocketState::Unbound {
            self.sockets.remove(local).await;
        }
        socket.close().await;
        info!(%local, "socket closed");
    }

    /// Tear down every interface and route referencing `dev_id`, as if
    /// the device had gone down.
    pub async fn device_down(&self, dev_id: &str) {
        self.routes.device_down(dev_id).await;
        self.interfaces.drop_iface(dev_id).await;
    }
}
