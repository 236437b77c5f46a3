use std::fs;
use std::path::Path;

use crate::address::NetRange;
use crate::config::Config;
use crate::error::{DdpError, Result};

/// Load and validate a configuration file from `p`.
pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p).map_err(|e| DdpError::Config(format!("failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt).map_err(|e| DdpError::Config(format!("failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    let dev_names: std::collections::HashSet<_> = cfg.interfaces.iter().map(|i| i.name.as_str()).collect();

    for route in &cfg.routes {
        if !dev_names.contains(route.dev.as_str()) {
            return Err(DdpError::Config(format!("route references unknown interface: {}", route.dev)));
        }
    }

    for iface in &cfg.interfaces {
        let nets = NetRange::new(iface.first_net, iface.last_net, 2);
        if !nets.is_routerless() && !nets.contains(iface.net) {
            return Err(DdpError::Config(format!(
                "interface {} net {} falls outside its own range {}-{}",
                iface.name, iface.net, iface.first_net, iface.last_net
            )));
        }
    }

    Ok(())
}
