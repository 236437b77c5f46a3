//! Tracing bootstrap. This module only wires up how spans and events are
//! rendered; the spans themselves live at the call sites that need them —
//! one per socket operation in [`crate::core`], events on every silent
//! drop in [`crate::send`] and [`crate::recv`].

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Filter directive used when neither `RUST_LOG` nor `log_level` narrows
/// things further: scope the default to this engine's own crates so an
/// embedder's other dependencies stay quiet at the same level.
fn default_directive(log_level: &str) -> String {
    format!("ddp_core={log_level},ddp_cli={log_level}")
}

/// Install the global subscriber from the engine's logging configuration.
/// `RUST_LOG` takes precedence over `log_level` entirely when set.
pub fn init_tracing(log_level: &str, show_target: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));
    let fmt = tracing_subscriber::fmt::layer().with_target(show_target);
    let dispatch = Registry::default().with(filter).with(fmt);

    tracing::subscriber::set_global_default(dispatch)
        .map_err(|e| format!("failed to install global tracing subscriber: {e}"))?;
    Ok(())
}

/// Flush buffered log output. Call once before process exit.
pub fn shutdown_tracing() {
    use std::io::Write as _;
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}
