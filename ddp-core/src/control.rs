//! Control surface: §4.H. Administrative operations that mutate the
//! interface and route tables, plus the read-only observability
//! listings of §6.

use std::fmt::Write as _;

use tracing::info;

use crate::address::{NetAddr, NetRange, Permission, SocketAddr, BCAST, RESERVED_NODE};
use crate::core::NetCore;
use crate::error::{DdpError, Result};
use crate::iface::Interface;
use crate::link::AARP_MULTICAST;
use crate::route::{gateway_directly_reachable, RouteFlags, RouteRequest};

/// A hard cap on how many per-net routes a single `set_iface` call may
/// install, mirroring the original kernel's bound on its netrange loop.
pub const MAX_NET_ROUTES: u32 = 257;

/// Bring up (or replace) the interface on `dev_id`. Admin-only.
///
/// `requested` seeds the probe (and its node must not be `BCAST` or
/// `RESERVED_NODE`); the actually-assigned address may differ if the
/// seed address conflicts. Installs per-net routes for `nets`, or a
/// single routerless default route when `nets` is the
/// `[0x0000, 0xFFFE]` sentinel.
pub async fn set_iface(
    core: &NetCore,
    caller: Permission,
    dev_id: &str,
    hw_addr: [u8; 6],
    requested: NetAddr,
    nets: NetRange,
    loopback: bool,
) -> Result<Interface> {
    caller.require_admin()?;

    if nets.phase != 2 {
        return Err(DdpError::Invalid("only phase 2 AppleTalk is supported".into()));
    }
    if requested.node == BCAST || requested.node == RESERVED_NODE {
        return Err(DdpError::Invalid("interface node may not be BCAST or reserved".into()));
    }
    if !nets.is_routerless() && nets.width() > MAX_NET_ROUTES {
        return Err(DdpError::Invalid("netrange too wide".into()));
    }

    core.routes.device_down(dev_id).await;
    core.interfaces.drop_iface(dev_id).await;

    let probe_seed = u32::from(requested.net);
    let iface = core
        .interfaces
        .probe_and_add(dev_id, hw_addr, nets, loopback, probe_seed, core.aarp.as_ref())
        .await?;

    core.devices.dev_multicast_add(dev_id, AARP_MULTICAST);

    if nets.is_routerless() {
        core.routes
            .create(
                RouteRequest {
                    target: NetAddr::new(iface.address.net, 0),
                    gateway: iface.address,
                    dev_id: dev_id.to_string(),
                    flags: RouteFlags { up: true, host: false, gateway: false },
                    as_default: true,
                },
                true,
            )
            .await?;
    } else {
        for net in nets.first_net..=nets.last_net {
            core.routes
                .create(
                    RouteRequest {
                        target: NetAddr::new(net, 0),
                        gateway: iface.address,
                        dev_id: dev_id.to_string(),
                        flags: RouteFlags { up: true, host: false, gateway: false },
                        as_default: false,
                    },
                    true,
                )
                .await?;
        }
    }

    info!(dev = dev_id, %iface.address, "interface configured");
    Ok(iface)
}

pub async fn get_iface_addr(core: &NetCore, dev_id: &str) -> Result<SocketAddr> {
    let iface = core
        .interfaces
        .find_by_dev(dev_id)
        .await
        .ok_or_else(|| DdpError::Invalid(format!("no such interface: {dev_id}")))?;
    Ok(SocketAddr::new(iface.address.net, iface.address.node, 0))
}

pub async fn get_iface_bcast(core: &NetCore, dev_id: &str) -> Result<SocketAddr> {
    let iface = core
        .interfaces
        .find_by_dev(dev_id)
        .await
        .ok_or_else(|| DdpError::Invalid(format!("no such interface: {dev_id}")))?;
    Ok(SocketAddr::new(iface.address.net, BCAST, 0))
}

/// Install or update a route. Admin-only. When `dev_hint` is `None`, the
/// gateway must be directly reachable via some existing interface.
pub async fn add_route(
    core: &NetCore,
    caller: Permission,
    target: NetAddr,
    gateway: NetAddr,
    flags: RouteFlags,
    dev_hint: Option<&str>,
) -> Result<()> {
    caller.require_admin()?;

    let reachable = gateway_directly_reachable(&core.interfaces, gateway).await;

    let dev_id = match dev_hint {
        Some(d) => d.to_string(),
        None => {
            if !reachable {
                return Err(DdpError::NetUnreachable(gateway));
            }
            core.interfaces
                .snapshot()
                .await
                .into_iter()
                .find(|i| i.nets.contains(gateway.net) || i.address == gateway)
                .map(|i| i.dev_id)
                .ok_or(DdpError::NetUnreachable(gateway))?
        }
    };

    core.routes
        .create(
            RouteRequest {
                target,
                gateway,
                dev_id,
                flags,
                as_default: target.net == 0 && !flags.host,
            },
            reachable || dev_hint.is_some(),
        )
        .await
}

pub async fn del_route(core: &NetCore, caller: Permission, target: NetAddr) -> Result<()> {
    caller.require_admin()?;
    core.routes.delete(target).await
}

/// Tab-aligned socket listing: `Type  local  remote  tx_queue  rx_queue  state  uid`.
pub async fn list_sockets(core: &NetCore) -> String {
    let mut out = String::from("Type\tlocal\tremote\ttx_queue\trx_queue\tstate\tuid\n");
    for socket in core.sockets.snapshot().await {
        let kind = match socket.kind {
            crate::socket::SocketKind::Dgram => "dgram",
            crate::socket::SocketKind::Raw => "raw",
        };
        let local = socket.local().await;
        let remote = socket
            .peer()
            .await
            .map(|p| p.to_string())
            .unwrap_or_else(|| "*".to_string());
        let state = match socket.state().await {
            crate::socket::SocketState::Unbound => "unbound",
            crate::socket::SocketState::Bound => "bound",
            crate::socket::SocketState::Connected => "connected",
            crate::socket::SocketState::Closed => "closed",
        };
        let _ = writeln!(
            out,
            "{kind}\t{local}\t{remote}\t0\t{}\t{state}\t{}",
            socket.rcv_queue_bytes(),
            socket.permission.as_str(),
        );
    }
    out
}

/// Tab-aligned interface listing: `Interface  Address  Networks  Status`.
pub async fn list_interfaces(core: &NetCore) -> String {
    let mut out = String::from("Interface\tAddress\tNetworks\tStatus\n");
    for iface in core.interfaces.snapshot().await {
        let status = match iface.status {
            crate::iface::IfaceStatus::Probing => "probing",
            crate::iface::IfaceStatus::ProbeFail => "probe_fail",
            crate::iface::IfaceStatus::Stable => "stable",
            crate::iface::IfaceStatus::Loopback => "loopback",
        };
        let _ = writeln!(
            out,
            "{}\t{}\t{}-{}\t{status}",
            iface.dev_id, iface.address, iface.nets.first_net, iface.nets.last_net,
        );
    }
    out
}

/// Tab-aligned route listing, default route first:
/// `Target  Router  Flags  Dev`.
pub async fn list_routes(core: &NetCore) -> String {
    let mut out = String::from("Target\tRouter\tFlags\tDev\n");
    for (dev_id, route) in core.routes.list().await {
        let mut flags = String::new();
        if route.flags.up {
            flags.push('U');
        }
        if route.flags.host {
            flags.push('H');
        }
        if route.flags.gateway {
            flags.push('G');
        }
        let _ = writeln!(out, "{}\t{}\t{flags}\t{dev_id}", route.target, route.gateway);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::NetRange;
    use crate::link::{LoopbackAarp, LoopbackLink, StaticDeviceRegistry};
    use std::sync::Arc;

    fn test_core() -> NetCore {
        let aarp = Arc::new(LoopbackAarp::new());
        let link = Arc::new(LoopbackLink::new());
        let devices = Arc::new(StaticDeviceRegistry::new(["eth0"]));
        NetCore::new(aarp, link, devices)
    }

    #[tokio::test]
    async fn non_admin_cannot_set_iface() {
        let core = test_core();
        let err = set_iface(
            &core,
            Permission::User,
            "eth0",
            [1; 6],
            NetAddr::new(1000, 5),
            NetRange::new(1000, 1000, 2),
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DdpError::PermissionDenied));
    }

    #[tokio::test]
    async fn set_iface_installs_routerless_default() {
        let core = test_core();
        set_iface(
            &core,
            Permission::Admin,
            "lo",
            [0; 6],
            NetAddr::new(0, 1),
            NetRange::new(0, 0xFFFE, 2),
            true,
        )
        .await
        .unwrap();
        let routes = list_routes(&core).await;
        assert!(routes.lines().count() >= 2);
    }

    #[tokio::test]
    async fn reserved_node_rejected() {
        let core = test_core();
        let err = set_iface(
            &core,
            Permission::Admin,
            "eth0",
            [1; 6],
            NetAddr::new(1000, BCAST),
            NetRange::new(1000, 1000, 2),
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DdpError::Invalid(_)));
    }
}
