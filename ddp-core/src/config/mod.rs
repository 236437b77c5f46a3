mod bootstrap;
mod loader;
mod logging;
mod root;

pub use bootstrap::bootstrap;
pub use loader::load_from_path;
pub use logging::LoggingConfig;
pub use root::{Config, IfaceConfig, RouteConfig};
