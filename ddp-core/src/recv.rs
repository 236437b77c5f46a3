//! Datagram receive path: §4.G. Validates an inbound frame, then either
//! forwards it (hop-incremented) or delivers it to a matching socket.

use bytes::BytesMut;
use tracing::{trace, warn};

use crate::address::SocketAddr;
use crate::core::NetCore;
use crate::link::AarpOutcome;
use crate::packet::Packet;
use crate::wire::{verify_checksum, DdpHeader, HopsLength, HEADER_LEN, MAX_HOPS};

/// Handle a decapsulated DDP frame received on `dev_id`. Never returns
/// an error to the caller: every failure mode in this path is a silent
/// drop per the propagation policy.
pub async fn receive_frame(core: &NetCore, dev_id: &str, frame: &[u8]) {
    if frame.len() < HEADER_LEN {
        trace!(dev = dev_id, len = frame.len(), "frame shorter than header, dropping");
        return;
    }

    let hops_length = HopsLength::decode([frame[0], frame[1]]);
    let trimmed_len = (frame.len()).min(usize::from(hops_length.length));
    let frame = &frame[..trimmed_len];
    if frame.len() < HEADER_LEN {
        trace!(dev = dev_id, "trimmed frame shorter than header, dropping");
        return;
    }

    let header = match DdpHeader::parse(frame) {
        Some(h) => h,
        None => return,
    };

    if !verify_checksum(frame, header.checksum) {
        warn!(dev = dev_id, "checksum mismatch, dropping frame");
        return;
    }

    let atif = if header.dest.net == 0 {
        core.interfaces.find_any_net(header.dest.node, dev_id).await
    } else {
        core.interfaces.find_exact(header.dest.net, header.dest.node).await
    };

    let atif = match atif {
        Some(i) => i,
        None => {
            forward(core, dev_id, frame, header).await;
            return;
        }
    };

    let dest = SocketAddr::new(header.dest.net, header.dest.node, header.dest_port);
    let socket = match core.sockets.search(dest, &atif).await {
        Some(s) => s,
        None => {
            trace!(dev = dev_id, %dest, "no matching socket, dropping");
            return;
        }
    };

    let peer = SocketAddr::new(header.src.net, header.src.node, header.src_port);
    let packet = match Packet::parse(frame, dev_id) {
        Some(p) => p,
        None => return,
    };

    let _owner = socket.acquire_owner_ref();
    socket.enqueue(packet, peer).await;
}

async fn forward(core: &NetCore, dev_id: &str, frame: &[u8], header: DdpHeader) {
    if header.hops_length.hops >= MAX_HOPS {
        trace!(dev = dev_id, "hop limit reached, dropping");
        return;
    }
    let Some((route_dev, route)) = core.routes.find(header.dest).await else {
        trace!(dev = dev_id, dest = %header.dest, "no route, dropping");
        return;
    };

    let mut forwarded = header;
    forwarded.hops_length = HopsLength::new(header.hops_length.hops + 1, header.hops_length.length);

    let mut buf = BytesMut::from(frame);
    forwarded.write(&mut buf);

    let target = if route.flags.gateway { route.gateway } else { header.dest };
    let outcome = core.aarp.send_ddp(&route_dev, &buf, target);
    if outcome == AarpOutcome::Dropped {
        trace!(dev = %route_dev, %target, "forwarded frame dropped by AARP");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{NetAddr, NetRange, Permission};
    use crate::core::NetCore;
    use crate::link::{LoopbackAarp, LoopbackLink, StaticDeviceRegistry};
    use crate::route::{RouteFlags, RouteRequest};
    use crate::socket::SocketKind;
    use crate::wire::checksum;
    use std::sync::Arc;

    fn build_frame(hops: u8, dest: NetAddr, src: NetAddr, payload: &[u8]) -> Vec<u8> {
        let header = DdpHeader {
            hops_length: HopsLength::new(hops, (HEADER_LEN + payload.len()) as u16),
            checksum: 0,
            dest,
            src,
            dest_port: 128,
            src_port: 20,
            ddp_type: 4,
        };
        let mut buf = vec![0u8; HEADER_LEN + payload.len()];
        header.write(&mut buf);
        buf[HEADER_LEN..].copy_from_slice(payload);
        let sum = checksum(&buf);
        buf[2..4].copy_from_slice(&sum.to_be_bytes());
        buf
    }

    async fn routed_core() -> (NetCore, Arc<LoopbackAarp>) {
        let aarp = Arc::new(LoopbackAarp::new());
        let link = Arc::new(LoopbackLink::new());
        let devices = Arc::new(StaticDeviceRegistry::new(["eth0"]));
        let core = NetCore::new(aarp.clone(), link, devices);
        core.interfaces
            .probe_and_add("eth0", [1; 6], NetRange::new(1000, 1000, 2), false, 0, aarp.as_ref())
            .await
            .unwrap();
        core.routes
            .create(
                RouteRequest {
                    target: NetAddr::new(2000, 0),
                    gateway: NetAddr::new(1000, 7),
                    dev_id: "eth0".into(),
                    flags: RouteFlags { up: true, host: false, gateway: true },
                    as_default: false,
                },
                true,
            )
            .await
            .unwrap();
        (core, aarp)
    }

    #[tokio::test]
    async fn ttl_exceeded_is_dropped() {
        let (core, aarp) = routed_core().await;
        let frame = build_frame(15, NetAddr::new(2000, 20), NetAddr::new(3000, 10), b"x");
        receive_frame(&core, "eth0", &frame).await;
        assert_eq!(aarp.sent_frames().len(), 0);
    }

    #[tokio::test]
    async fn forwards_with_incremented_hops() {
        let (core, aarp) = routed_core().await;
        let frame = build_frame(14, NetAddr::new(2000, 20), NetAddr::new(3000, 10), b"x");
        receive_frame(&core, "eth0", &frame).await;
        let sent = aarp.sent_frames();
        assert_eq!(sent.len(), 1);
        let forwarded = HopsLength::decode([sent[0].frame[0], sent[0].frame[1]]);
        assert_eq!(forwarded.hops, 15);
    }

    #[tokio::test]
    async fn checksum_mismatch_dropped_silently() {
        let (core, _aarp) = routed_core().await;
        let socket = core.open(SocketKind::Dgram, Permission::User);
        core.bind(&socket, crate::address::SocketAddr::new(1000, 1, 128))
            .await
            .unwrap();
        let mut frame = build_frame(0, NetAddr::new(1000, 1), NetAddr::new(1000, 9), b"hi");
        frame[HEADER_LEN] ^= 0xFF;
        receive_frame(&core, "eth0", &frame).await;
        assert_eq!(socket.rcv_queue_len().await, 0);
    }
}
