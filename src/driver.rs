//! The driver contract.
//!
//! A driver declares its name, the identity table it services, and the
//! lifecycle hooks the binder drives: `probe` to attempt a binding, an
//! optional `scan` run after a successful probe, and `remove` to release a
//! bound device. Hooks run without any registry-wide lock held, so they may
//! register or unregister other devices themselves.

use std::fmt;
use std::sync::Arc;

use crate::device::MbusDevice;
use crate::error::ProbeError;
use crate::id::MbusDeviceId;

/// A driver that can bind devices on the bus.
///
/// The id table must be terminated by [`MbusDeviceId::SENTINEL`]; the
/// matcher stops scanning at the first entry with `device == 0`. The table
/// is borrowed from the driver object and must never change after
/// registration.
pub trait MbusDriver: Send + Sync + fmt::Debug {
    /// Unique driver name; the registry keys drivers by it.
    fn name(&self) -> &str;

    /// Sentinel-terminated table of identities this driver services.
    fn id_table(&self) -> &[MbusDeviceId];

    /// Attempt to take ownership of a matched device.
    ///
    /// Returning `Err` declines the device; it stays unbound and no other
    /// candidate driver is tried for this match attempt.
    fn probe(&self, dev: &Arc<MbusDevice>) -> Result<(), ProbeError>;

    /// Optional hook run immediately after a successful probe, typically to
    /// enumerate child devices. The default declares no scan hook. Its
    /// outcome never affects the binding decision.
    fn scan(&self, _dev: &Arc<MbusDevice>) {}

    /// Release a bound device. Invoked exactly once per binding, on device
    /// or driver unregistration. There is no failure channel: teardown
    /// proceeds regardless.
    fn remove(&self, dev: &Arc<MbusDevice>);
}
