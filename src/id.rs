//! Device identity and the matching rule.
//!
//! A device carries a `(device, vendor)` identity pair; a driver carries an
//! ordered, sentinel-terminated table of the identities it services. The
//! matcher is a pure predicate over the two — no state, no I/O. The bus asks
//! it whenever a new device or driver shows up.

use serde::{Deserialize, Serialize};

/// Wildcard matching any value in the corresponding identity field.
pub const ANY_ID: u32 = 0xffff_ffff;

/// The `(device, vendor)` identity used to pair devices with drivers.
///
/// Either field of a driver's table entry may be [`ANY_ID`] to match any
/// value. Identity is set once when the device is created and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MbusDeviceId {
    /// Device type identifier.
    pub device: u32,
    /// Vendor identifier.
    pub vendor: u32,
}

impl MbusDeviceId {
    /// Create a new identity pair.
    pub const fn new(device: u32, vendor: u32) -> Self {
        Self { device, vendor }
    }

    /// The table terminator: an entry with `device == 0` ends a driver's
    /// supported-identity table.
    pub const SENTINEL: MbusDeviceId = MbusDeviceId::new(0, 0);

    /// Whether this entry terminates an id table.
    pub const fn is_sentinel(&self) -> bool {
        self.device == 0
    }
}

/// Whether a single driver table entry matches a device identity.
///
/// An entry matches when its device field equals the device's (or is
/// [`ANY_ID`]) and its vendor field is [`ANY_ID`] or equals the device's.
pub fn id_match(dev: &MbusDeviceId, candidate: &MbusDeviceId) -> bool {
    if candidate.device != dev.device && candidate.device != ANY_ID {
        return false;
    }
    candidate.vendor == ANY_ID || candidate.vendor == dev.vendor
}

/// Whether any entry in a driver's id table matches the device identity.
///
/// Entries are scanned in order, stopping at the sentinel (`device == 0`).
pub fn table_match(dev: &MbusDeviceId, table: &[MbusDeviceId]) -> bool {
    table
        .iter()
        .take_while(|id| !id.is_sentinel())
        .any(|id| id_match(dev, id))
}
