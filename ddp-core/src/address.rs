//! AppleTalk addressing primitives: nets, nodes, sockets, and the address
//! ranges an interface serves.

use std::fmt;

/// Broadcast node.
pub const BCAST: u8 = 0xFF;
/// "Any node" sentinel.
pub const ANYNODE: u8 = 0x00;
/// "This network" sentinel.
pub const ANYNET: u16 = 0x0000;
/// Reserved node, never assignable or bindable (alongside [`ANYNODE`]).
pub const RESERVED_NODE: u8 = 0xFE;

/// Lowest ephemeral port used by autobind.
pub const EPHEMERAL_FIRST: u8 = 0x80;
/// Highest ephemeral port used by autobind.
pub const EPHEMERAL_LAST: u8 = 0xFE;
/// "Any port" sentinel.
pub const ANYPORT: u8 = 0;

/// A network/node pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NetAddr {
    pub net: u16,
    pub node: u8,
}

impl NetAddr {
    pub const fn new(net: u16, node: u8) -> Self {
        Self { net, node }
    }

    /// True if `node` is one of the two addresses that must never be
    /// assigned to an interface or bound by a socket.
    pub fn node_reserved(node: u8) -> bool {
        node == ANYNODE || node == RESERVED_NODE
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.net, self.node)
    }
}

/// A network/node/port triple, as used by sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SocketAddr {
    pub net: u16,
    pub node: u8,
    pub port: u8,
}

impl SocketAddr {
    pub const fn new(net: u16, node: u8, port: u8) -> Self {
        Self { net, node, port }
    }

    pub const fn addr(&self) -> NetAddr {
        NetAddr::new(self.net, self.node)
    }

    pub fn is_ephemeral_range(port: u8) -> bool {
        (EPHEMERAL_FIRST..=EPHEMERAL_LAST).contains(&port)
    }
}

impl fmt::Display for SocketAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.net, self.node, self.port)
    }
}

/// An inclusive range of nets an interface serves, at DDP phase 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetRange {
    pub first_net: u16,
    pub last_net: u16,
    pub phase: u8,
}

/// The `[0x0000, 0xFFFE]` sentinel range: "routerless initial state".
pub const ROUTERLESS_FIRST: u16 = 0x0000;
pub const ROUTERLESS_LAST: u16 = 0xFFFE;

impl NetRange {
    pub const fn new(first_net: u16, last_net: u16, phase: u8) -> Self {
        Self {
            first_net,
            last_net,
            phase,
        }
    }

    pub fn is_routerless(&self) -> bool {
        self.first_net == ROUTERLESS_FIRST && self.last_net == ROUTERLESS_LAST
    }

    pub fn contains(&self, net: u16) -> bool {
        self.first_net <= net && net <= self.last_net
    }

    /// Width of the range as a count of nets, saturating at `u32` so that
    /// the routerless sentinel range does not overflow.
    pub fn width(&self) -> u32 {
        u32::from(self.last_net) - u32::from(self.first_net) + 1
    }
}

/// Who is calling a control-surface operation. Stands in for the uid/
/// capability check the original kernel performs, since this engine has
/// no process/user boundary of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Admin,
    User,
}

impl Permission {
    pub fn require_admin(self) -> crate::error::Result<()> {
        match self {
            Permission::Admin => Ok(()),
            Permission::User => Err(crate::error::DdpError::PermissionDenied),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Admin => "admin",
            Permission::User => "user",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_nodes() {
        assert!(NetAddr::node_reserved(ANYNODE));
        assert!(NetAddr::node_reserved(RESERVED_NODE));
        assert!(!NetAddr::node_reserved(1));
        assert!(!NetAddr::node_reserved(BCAST));
    }

    #[test]
    fn routerless_range_detected() {
        let r = NetRange::new(ROUTERLESS_FIRST, ROUTERLESS_LAST, 2);
        assert!(r.is_routerless());
        assert!(!NetRange::new(1000, 1000, 2).is_routerless());
    }

    #[test]
    fn range_width_closed_inclusive() {
        assert_eq!(NetRange::new(100, 100, 2).width(), 1);
        assert_eq!(NetRange::new(100, 102, 2).width(), 3);
    }
}
