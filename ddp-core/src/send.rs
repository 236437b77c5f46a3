//! Datagram send path: §4.F. Builds a DDP datagram, picks a route,
//! applies loopback/broadcast fan-out, and hands the frame to AARP.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::address::{NetAddr, ANYNODE, BCAST};
use crate::core::NetCore;
use crate::error::{DdpError, Result};
use crate::iface::IfaceStatus;
use crate::link::AarpOutcome;
use crate::packet::Packet;
use crate::recv;
use crate::socket::{Socket, SocketState};
use crate::wire::{checksum, DdpHeader, HopsLength, MAX_PAYLOAD};

/// Send `payload` from `socket` to `dest` (or to the connected peer if
/// `dest` is `None`). Returns the number of payload bytes accepted —
/// link-layer/AARP drops are not surfaced to the caller.
pub async fn send_datagram(
    core: &NetCore,
    socket: &Arc<Socket>,
    dest: Option<crate::address::SocketAddr>,
    payload: &[u8],
    flags: u32,
) -> Result<usize> {
    if flags != 0 {
        return Err(DdpError::Invalid("unsupported send flags".into()));
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(DdpError::MsgTooBig);
    }

    let dest = match dest {
        Some(d) => d,
        None => {
            if socket.state().await != SocketState::Connected {
                return Err(DdpError::NotConnected);
            }
            socket.peer().await.ok_or(DdpError::NotConnected)?
        }
    };

    if socket.state().await == SocketState::Unbound {
        core.autobind(socket).await?;
    }
    let local = socket.local().await;

    let lookup_target = if dest.net != 0 || dest.node == ANYNODE {
        dest.addr()
    } else {
        NetAddr::new(local.net, 0)
    };
    let (dev_id, route) = core
        .routes
        .find(lookup_target)
        .await
        .ok_or(DdpError::NetUnreachable(dest.addr()))?;

    let no_checksum = socket.flags.read().await.no_checksum;

    let header = DdpHeader {
        hops_length: HopsLength::new(0, (crate::wire::HEADER_LEN + payload.len()) as u16),
        checksum: 0,
        dest: dest.addr(),
        src: local.addr(),
        dest_port: dest.port,
        src_port: local.port,
        ddp_type: 0,
    };
    let mut packet = Packet::build(header, payload, dev_id.clone());

    if !no_checksum {
        let sum = checksum(packet.frame());
        let mut header = packet.header;
        header.checksum = sum;
        packet.rewrite_header(header);
    }

    let iface = core.interfaces.find_by_dev(&dev_id).await;
    let dev_is_loopback = iface.map(|i| i.status == IfaceStatus::Loopback).unwrap_or(false);

    let mut loopback_flag = false;
    if dest.node == BCAST && !route.flags.gateway && !dev_is_loopback {
        trace!(dev = %dev_id, "broadcast fan-out: dispatching clone via AARP");
        let outcome = core.aarp.send_ddp(&dev_id, packet.frame(), dest.addr());
        if outcome == AarpOutcome::Dropped {
            warn!(dev = %dev_id, "broadcast clone dropped by AARP");
        }
        loopback_flag = true;
    }

    if dev_is_loopback || loopback_flag {
        recv::receive_frame(core, &dev_id, packet.frame()).await;
        return Ok(payload.len());
    }

    let aarp_target = if route.flags.gateway { route.gateway } else { dest.addr() };
    let outcome = core.aarp.send_ddp(&dev_id, packet.frame(), aarp_target);
    if outcome == AarpOutcome::Dropped {
        trace!(dev = %dev_id, target = %aarp_target, "AARP dropped frame; send still reports success");
    }

    Ok(payload.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{NetRange, Permission, SocketAddr};
    use crate::link::{LoopbackAarp, LoopbackLink, StaticDeviceRegistry};
    use crate::socket::SocketKind;

    async fn loopback_core() -> (NetCore, Arc<LoopbackAarp>) {
        let aarp = Arc::new(LoopbackAarp::new());
        let link = Arc::new(LoopbackLink::new());
        let devices = Arc::new(StaticDeviceRegistry::new(["lo"]));
        let core = NetCore::new(aarp.clone(), link, devices);
        core.interfaces
            .probe_and_add(
                "lo",
                [0; 6],
                NetRange::new(65280, 65280, 2),
                true,
                0,
                aarp.as_ref(),
            )
            .await
            .unwrap();
        core.routes
            .create(
                crate::route::RouteRequest {
                    target: NetAddr::new(65280, 0),
                    gateway: NetAddr::new(65280, 1),
                    dev_id: "lo".into(),
                    flags: crate::route::RouteFlags { up: true, host: false, gateway: false },
                    as_default: true,
                },
                true,
            )
            .await
            .unwrap();
        (core, aarp)
    }

    #[tokio::test]
    async fn loopback_echo() {
        let (core, _aarp) = loopback_core().await;
        let socket = core.open(SocketKind::Dgram, Permission::User);
        core.bind(&socket, SocketAddr::new(65280, 1, 200)).await.unwrap();
        let sent = send_datagram(&core, &socket, Some(SocketAddr::new(65280, 1, 200)), b"hi", 0)
            .await
            .unwrap();
        assert_eq!(sent, 2);
        let (packet, peer) = socket.try_recv().await.unwrap();
        assert_eq!(packet.payload(), b"hi");
        assert_eq!(peer, SocketAddr::new(65280, 1, 200));
    }

    #[tokio::test]
    async fn message_too_big_rejected() {
        let (core, _aarp) = loopback_core().await;
        let socket = core.open(SocketKind::Dgram, Permission::User);
        core.bind(&socket, SocketAddr::new(65280, 1, 200)).await.unwrap();
        let big = vec![0u8; MAX_PAYLOAD + 1];
        let err = send_datagram(&core, &socket, Some(SocketAddr::new(65280, 1, 200)), &big, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DdpError::MsgTooBig));
    }
}
