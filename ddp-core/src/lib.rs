#![forbid(unsafe_code)]

pub mod address;
pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod iface;
pub mod link;
pub mod packet;
pub mod recv;
pub mod route;
pub mod send;
pub mod socket;
pub mod socket_table;
pub mod telemetry;
pub mod wire;

pub use config::{bootstrap, load_from_path, Config};
pub use core::NetCore;
pub use error::{DdpError, Result};
pub use socket::{Socket, SocketKind};
