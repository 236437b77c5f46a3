use serde::Deserialize;

use super::logging::LoggingConfig;

/// Top-level configuration: what to bring the engine up with on startup.
/// Persisted state is otherwise nonexistent — every table is rebuilt from
/// this description each run.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Interfaces to bring up, in order, before any route is installed.
    #[serde(default)]
    pub interfaces: Vec<IfaceConfig>,
    /// Routes to install after every interface above is up.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// The startup-time description of a `set_iface` call.
#[derive(Debug, Deserialize, Clone)]
pub struct IfaceConfig {
    pub name: String,
    pub hw_addr: [u8; 6],
    pub net: u16,
    pub node: u8,
    pub first_net: u16,
    pub last_net: u16,
    /// `true` marks a device served by the in-process loopback
    /// `LinkLayer`/`Aarp` pair rather than a real (absent) NIC/AARP stack.
    #[serde(default)]
    pub loopback: bool,
}

/// The startup-time description of an `add_route` call.
#[derive(Debug, Deserialize, Clone)]
pub struct RouteConfig {
    pub target_net: u16,
    #[serde(default)]
    pub target_node: Option<u8>,
    pub gateway_net: u16,
    pub gateway_node: u8,
    pub dev: String,
    #[serde(default)]
    pub host: bool,
    #[serde(default)]
    pub gateway: bool,
}
