use crate::address::{NetAddr, NetRange, Permission};
use crate::config::Config;
use crate::control;
use crate::core::NetCore;
use crate::error::Result;
use crate::route::RouteFlags;

/// Bring `core` up from `config`: every interface in order, then every
/// route. Aborts on the first failure, leaving whatever was already
/// installed in place.
pub async fn bootstrap(core: &NetCore, config: &Config, caller: Permission) -> Result<()> {
    for iface in &config.interfaces {
        control::set_iface(
            core,
            caller,
            &iface.name,
            iface.hw_addr,
            NetAddr::new(iface.net, iface.node),
            NetRange::new(iface.first_net, iface.last_net, 2),
            iface.loopback,
        )
        .await?;
    }

    for route in &config.routes {
        let target = NetAddr::new(route.target_net, route.target_node.unwrap_or(0));
        let gateway = NetAddr::new(route.gateway_net, route.gateway_node);
        let flags = RouteFlags {
            up: true,
            host: route.host,
            gateway: route.gateway,
        };
        control::add_route(core, caller, target, gateway, flags, Some(route.dev.as_str())).await?;
    }

    Ok(())
}
