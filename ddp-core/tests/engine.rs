use std::sync::Arc;

use ddp_core::address::{NetAddr, NetRange, Permission, SocketAddr, BCAST};
use ddp_core::config;
use ddp_core::control;
use ddp_core::link::{LoopbackAarp, LoopbackLink, StaticDeviceRegistry};
use ddp_core::route::{RouteFlags, RouteRequest};
use ddp_core::send::send_datagram;
use ddp_core::socket::SocketKind;
use ddp_core::NetCore;

async fn single_net_core(node: u8) -> (NetCore, Arc<LoopbackAarp>) {
    let aarp = Arc::new(LoopbackAarp::new());
    let link = Arc::new(LoopbackLink::new());
    let devices = Arc::new(StaticDeviceRegistry::new(["eth0"]));
    let core = NetCore::new(aarp.clone(), link, devices);
    core.interfaces
        .probe_and_add("eth0", [1; 6], NetRange::new(1000, 1000, 2), false, node as u32, aarp.as_ref())
        .await
        .unwrap();
    core.routes
        .create(
            RouteRequest {
                target: NetAddr::new(1000, 0),
                gateway: NetAddr::new(1000, node),
                dev_id: "eth0".into(),
                flags: RouteFlags { up: true, host: false, gateway: false },
                as_default: true,
            },
            true,
        )
        .await
        .unwrap();
    (core, aarp)
}

#[tokio::test]
async fn broadcast_fan_out_dispatches_clone_and_loops_back() {
    let (core, aarp) = single_net_core(1).await;
    let socket = core.open(SocketKind::Dgram, Permission::User);
    let local = core.bind(&socket, SocketAddr::new(1000, 1, 128)).await.unwrap();

    send_datagram(&core, &socket, Some(SocketAddr::new(0, BCAST, 128)), b"hey all", 0)
        .await
        .unwrap();

    // the clone went out via AARP...
    assert_eq!(aarp.sent_frames().len(), 1);
    // ...and the original looped straight back to the sender's own socket.
    let (packet, peer) = socket.try_recv().await.unwrap();
    assert_eq!(packet.payload(), b"hey all");
    assert_eq!(peer, local);
}

#[tokio::test]
async fn autobind_exhausts_ephemeral_range() {
    let (core, _aarp) = single_net_core(1).await;
    let mut sockets = Vec::new();
    for _ in 0..127 {
        let socket = core.open(SocketKind::Dgram, Permission::User);
        core.autobind(&socket).await.unwrap();
        sockets.push(socket);
    }
    let overflow = core.open(SocketKind::Dgram, Permission::User);
    let err = core.autobind(&overflow).await.unwrap_err();
    assert!(matches!(err, ddp_core::DdpError::NoPort));
}

#[tokio::test]
async fn probe_conflict_fails_interface_bring_up() {
    let aarp = Arc::new(LoopbackAarp::new());
    aarp.set_conflict(true);
    let link = Arc::new(LoopbackLink::new());
    let devices = Arc::new(StaticDeviceRegistry::new(["eth0"]));
    let core = NetCore::new(aarp.clone(), link, devices);

    let err = control::set_iface(
        &core,
        Permission::Admin,
        "eth0",
        [1; 6],
        NetAddr::new(1000, 5),
        NetRange::new(1000, 1000, 2),
        false,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ddp_core::DdpError::AddressInUse(_)));
}

#[tokio::test]
async fn bootstrap_from_config_brings_up_interface_and_route() {
    let toml = r#"
[logging]
level = "debug"

[[interfaces]]
name = "lo"
hw_addr = [0, 0, 0, 0, 0, 0]
net = 65280
node = 1
first_net = 65280
last_net = 65280
loopback = true

[[routes]]
target_net = 2000
gateway_net = 65280
gateway_node = 9
dev = "lo"
gateway = true
"#;
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), toml).unwrap();

    let cfg = config::load_from_path(file.path()).unwrap();
    assert_eq!(cfg.logging.level, "debug");

    let aarp = Arc::new(LoopbackAarp::new());
    let link = Arc::new(LoopbackLink::new());
    let devices = Arc::new(StaticDeviceRegistry::new(["lo"]));
    let core = NetCore::new(aarp, link, devices);

    config::bootstrap(&core, &cfg, Permission::Admin).await.unwrap();

    let routes = control::list_routes(&core).await;
    assert!(routes.contains("2000"));
    let interfaces = control::list_interfaces(&core).await;
    assert!(interfaces.contains("lo"));
}

#[tokio::test]
async fn bootstrap_rejects_route_with_unknown_device() {
    let toml = r#"
[[routes]]
target_net = 2000
gateway_net = 65280
gateway_node = 9
dev = "ghost"
"#;
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), toml).unwrap();

    let err = config::load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ddp_core::DdpError::Config(_)));
}
