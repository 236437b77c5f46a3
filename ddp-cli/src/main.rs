#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ddp_core::address::Permission;
use ddp_core::link::{LoopbackAarp, LoopbackLink, StaticDeviceRegistry};
use ddp_core::socket::SocketKind;
use ddp_core::{config, control, send, telemetry, NetCore};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Userland AppleTalk DDP engine")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "demos/config/loopback.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match config::load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = telemetry::init_tracing(&cfg.logging.level, cfg.logging.show_target) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(cfg).await {
        error!(%err, "engine exited with error");
        telemetry::shutdown_tracing();
        std::process::exit(1);
    }
    telemetry::shutdown_tracing();
}

async fn run(cfg: config::Config) -> ddp_core::Result<()> {
    let aarp = Arc::new(LoopbackAarp::new());
    let link = Arc::new(LoopbackLink::new());
    let devices = Arc::new(StaticDeviceRegistry::new(cfg.interfaces.iter().map(|i| i.name.clone())));
    let core = NetCore::new(aarp, link, devices);

    config::bootstrap(&core, &cfg, Permission::Admin).await?;
    info!(interfaces = cfg.interfaces.len(), routes = cfg.routes.len(), "engine bootstrapped");

    let socket = core.open(SocketKind::Dgram, Permission::User);
    let local = core.autobind(&socket).await?;
    info!(%local, "demo socket bound");

    send::send_datagram(&core, &socket, Some(local), b"hello, appletalk", 0).await?;
    let (packet, peer) = socket.try_recv().await?;
    info!(%peer, bytes = packet.payload().len(), "demo socket received echo");

    print!("{}", control::list_interfaces(&core).await);
    print!("{}", control::list_routes(&core).await);
    print!("{}", control::list_sockets(&core).await);

    core.close(&socket).await;
    Ok(())
}
