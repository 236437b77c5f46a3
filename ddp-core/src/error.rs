use thiserror::Error;

use crate::address::{NetAddr, SocketAddr};

/// Errors that can occur while operating the DDP engine.
#[derive(Error, Debug)]
pub enum DdpError {
    #[error("address family is not AppleTalk")]
    BadFamily,

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("address already in use: {0:?}")]
    AddressInUse(SocketAddr),

    #[error("address unavailable")]
    AddressUnavailable,

    #[error("no route to {0:?}")]
    NetUnreachable(NetAddr),

    #[error("socket is not connected")]
    NotConnected,

    #[error("no free autobind port")]
    NoPort,

    #[error("no buffer space")]
    NoBufs,

    #[error("message too big")]
    MsgTooBig,

    #[error("operation would block")]
    WouldBlock,

    #[error("operation interrupted")]
    Interrupted,

    #[error("permission denied")]
    PermissionDenied,

    #[error("socket shut down")]
    Shutdown,

    #[error("socket type unsupported")]
    SocketTypeUnsupported,

    #[error("socket already bound")]
    AlreadyBound,

    #[error("autobind failed: device busy")]
    Busy,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DdpError>;
