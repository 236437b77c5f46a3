//! The external collaborators this engine depends on but does not own:
//! link-layer transmission, AARP address resolution, and the device
//! registry. Real implementations belong to a NIC/AARP stack that is out
//! of scope here; this module only defines the contracts plus a
//! loopback-only pair suitable for a single-host demo and for tests.

use std::sync::Mutex;

use crate::address::NetAddr;

pub type MacAddr = [u8; 6];

/// The AARP multicast MAC used for address-resolution probes.
pub const AARP_MULTICAST: MacAddr = [0x09, 0x00, 0x00, 0xFF, 0xFF, 0xFF];

/// Outcome of an AARP-mediated transmit. AARP may retry internally;
/// `Dropped` only means the engine should not expect the frame to have
/// left the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AarpOutcome {
    Delivered,
    Dropped,
}

/// Outcome of an address-resolution probe for a candidate address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    NoConflict,
    Conflict,
}

/// Raw link-layer transmission, addressed by resolved hardware address.
pub trait LinkLayer: Send + Sync {
    fn send_ddp(&self, dev_id: &str, frame: &[u8], target_hw: MacAddr) -> crate::error::Result<()>;
}

/// Address resolution: probing for conflicts during interface bring-up,
/// and resolving+transmitting a DDP frame to a protocol address.
pub trait Aarp: Send + Sync {
    fn send_probe(&self, dev_id: &str, addr: NetAddr) -> ProbeOutcome;
    fn send_ddp(&self, dev_id: &str, frame: &[u8], target: NetAddr) -> AarpOutcome;
}

/// Ethernet device existence/multicast registration.
pub trait DeviceRegistry: Send + Sync {
    fn dev_exists(&self, dev_id: &str) -> bool;
    fn dev_multicast_add(&self, dev_id: &str, mac: MacAddr);
}

/// A recorded outbound frame, for test/demo inspection.
#[derive(Debug, Clone)]
pub struct SentFrame {
    pub dev_id: String,
    pub frame: Vec<u8>,
    pub target_hw: MacAddr,
}

/// A loopback-only [`LinkLayer`] that records every frame instead of
/// touching real hardware.
#[derive(Default)]
pub struct LoopbackLink {
    sent: Mutex<Vec<SentFrame>>,
}

impl LoopbackLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.sent.lock().expect("lock poisoned").clone()
    }
}

impl LinkLayer for LoopbackLink {
    fn send_ddp(&self, dev_id: &str, frame: &[u8], target_hw: MacAddr) -> crate::error::Result<()> {
        self.sent.lock().expect("lock poisoned").push(SentFrame {
            dev_id: dev_id.to_string(),
            frame: frame.to_vec(),
            target_hw,
        });
        Ok(())
    }
}

/// A loopback-only [`Aarp`] that always resolves successfully and never
/// observes a probe conflict, unless configured otherwise via
/// [`LoopbackAarp::set_conflict`].
#[derive(Default)]
pub struct LoopbackAarp {
    sent: Mutex<Vec<SentFrame>>,
    probes: Mutex<usize>,
    conflict: Mutex<bool>,
}

impl LoopbackAarp {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, every subsequent `send_probe` reports a conflict.
    pub fn set_conflict(&self, conflict: bool) {
        *self.conflict.lock().expect("lock poisoned") = conflict;
    }

    pub fn probe_count(&self) -> usize {
        *self.probes.lock().expect("lock poisoned")
    }

    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.sent.lock().expect("lock poisoned").clone()
    }
}

impl Aarp for LoopbackAarp {
    fn send_probe(&self, _dev_id: &str, _addr: NetAddr) -> ProbeOutcome {
        *self.probes.lock().expect("lock poisoned") += 1;
        if *self.conflict.lock().expect("lock poisoned") {
            ProbeOutcome::Conflict
        } else {
            ProbeOutcome::NoConflict
        }
    }

    fn send_ddp(&self, dev_id: &str, frame: &[u8], target: NetAddr) -> AarpOutcome {
        self.sent.lock().expect("lock poisoned").push(SentFrame {
            dev_id: dev_id.to_string(),
            frame: frame.to_vec(),
            target_hw: AARP_MULTICAST,
        });
        let _ = target;
        AarpOutcome::Delivered
    }
}

/// A device registry that accepts any device name handed to it, for
/// demo/test use where there is no real NIC enumeration.
#[derive(Default)]
pub struct StaticDeviceRegistry {
    known: Mutex<Vec<String>>,
}

impl StaticDeviceRegistry {
    pub fn new(devices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            known: Mutex::new(devices.into_iter().map(Into::into).collect()),
        }
    }
}

impl DeviceRegistry for StaticDeviceRegistry {
    fn dev_exists(&self, dev_id: &str) -> bool {
        self.known.lock().expect("lock poisoned").iter().any(|d| d == dev_id)
    }

    fn dev_multicast_add(&self, dev_id: &str, _mac: MacAddr) {
        let mut known = self.known.lock().expect("lock poisoned");
        if !known.iter().any(|d| d == dev_id) {
            known.push(dev_id.to_string());
        }
    }
}
