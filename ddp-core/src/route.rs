//! The route table: host/net routes, the distinguished default route,
//! longest-match-ish lookup, and device-down purge.

use tokio::sync::RwLock;

use crate::address::NetAddr;
use crate::error::{DdpError, Result};
use crate::iface::InterfaceTable;

/// Route flags. `host` routes match a full `(net, node)`; `gateway`
/// routes forward through an intermediate AppleTalk node rather than
/// delivering directly on the target net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteFlags {
    pub up: bool,
    pub host: bool,
    pub gateway: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub target: NetAddr,
    pub gateway: NetAddr,
    pub dev_id_index: usize,
    pub flags: RouteFlags,
}

/// Request to create or update a route.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub target: NetAddr,
    pub gateway: NetAddr,
    pub dev_id: String,
    pub flags: RouteFlags,
    /// Install this route into the distinguished default-route slot
    /// instead of (or in addition to being reachable only as) the
    /// ordinary scanned list. Independent of `target`: the routerless
    /// bring-up case installs a route whose target is the interface's
    /// own net and still marks it default.
    pub as_default: bool,
}

#[derive(Debug, Default)]
struct RouteTableInner {
    routes: Vec<(String, Route)>,
    default_route: Option<(String, Route)>,
}

/// Concurrent route table guarded by its own lock, acquired after
/// [`crate::iface::InterfaceTable`] and before the socket table per the
/// engine's fixed lock-order.
#[derive(Default)]
pub struct RouteTable {
    inner: RwLock<RouteTableInner>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a route for `target`, falling back to the default route.
    pub async fn find(&self, target: NetAddr) -> Option<(String, Route)> {
        let inner = self.inner.read().await;
        for (dev_id, route) in &inner.routes {
            if !route.flags.up {
                continue;
            }
            if route.target.net != target.net {
                continue;
            }
            if route.flags.host && route.target.node != target.node {
                continue;
            }
            return Some((dev_id.clone(), *route));
        }
        inner.default_route.clone()
    }

    /// Create or update a route. `gateway_reachable` should be computed
    /// by the caller under a (separately-acquired) interface-table read
    /// lock, honoring the fixed `interfaces → routes` acquisition order;
    /// this keeps the route table decoupled from the interface table so
    /// the two locks are never held together across an await point.
    pub async fn create(&self, req: RouteRequest, gateway_reachable: bool) -> Result<()> {
        if !gateway_reachable {
            return Err(DdpError::NetUnreachable(req.gateway));
        }
        let route = Route {
            target: req.target,
            gateway: req.gateway,
            dev_id_index: 0,
            flags: RouteFlags { up: true, ..req.flags },
        };

        let mut inner = self.inner.write().await;

        if req.as_default {
            inner.default_route = Some((req.dev_id, route));
            return Ok(());
        }

        if let Some(existing) = inner.routes.iter_mut().find(|(_, r)| {
            r.flags == route.flags
                && r.target.net == route.target.net
                && (!route.flags.host || r.target.node == route.target.node)
        }) {
            existing.1 = route;
            existing.0 = req.dev_id;
        } else {
            inner.routes.push((req.dev_id, route));
        }
        Ok(())
    }

    /// Delete the first route matching `target` (and `target.node` when
    /// that route is a gateway route).
    pub async fn delete(&self, target: NetAddr) -> Result<()> {
        let mut inner = self.inner.write().await;
        let before = inner.routes.len();
        inner.routes.retain(|(_, r)| {
            !(r.target.net == target.net && (!r.flags.gateway || r.target.node == target.node))
        });
        let removed_explicit = inner.routes.len() != before;

        let removed_default = inner
            .default_route
            .as_ref()
            .map(|(_, r)| r.target.net == target.net)
            .unwrap_or(false);
        if removed_default {
            inner.default_route = None;
        }

        if removed_explicit || removed_default {
            Ok(())
        } else {
            Err(DdpError::Invalid(format!("no route to delete for {target}")))
        }
    }

    /// Remove every route (including the default) that points at `dev_id`.
    pub async fn device_down(&self, dev_id: &str) {
        let mut inner = self.inner.write().await;
        inner.routes.retain(|(dev, _)| dev != dev_id);
        if inner
            .default_route
            .as_ref()
            .map(|(dev, _)| dev == dev_id)
            .unwrap_or(false)
        {
            inner.default_route = None;
        }
    }

    /// Snapshot listing, default route first, then insertion order.
    pub async fn list(&self) -> Vec<(String, Route)> {
        let inner = self.inner.read().await;
        let mut out = Vec::with_capacity(inner.routes.len() + 1);
        if let Some(default) = &inner.default_route {
            out.push(default.clone());
        }
        out.extend(inner.routes.iter().cloned());
        out
    }
}

/// True if `gateway` is directly reachable: some interface's netrange
/// contains `gateway.net`, or some interface's address equals `gateway`.
pub async fn gateway_directly_reachable(ifaces: &InterfaceTable, gateway: NetAddr) -> bool {
    ifaces
        .snapshot()
        .await
        .into_iter()
        .any(|iface| iface.nets.contains(gateway.net) || iface.address == gateway)
}
