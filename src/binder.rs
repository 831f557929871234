//! Probe/remove orchestration.
//!
//! Drives a device through its `Unbound -> Bound -> Unbound` lifecycle
//! against a matched driver. Each device's transitions are serialized by the
//! device's transition lock; the registry-wide lock is never held here, so
//! hooks are free to re-enter the registry for other devices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::device::{Binding, MbusDevice};
use crate::driver::MbusDriver;
use crate::error::ProbeError;

/// A driver as held by the registry, with its deactivation flag.
///
/// The flag flips to `false` the moment unregistration begins; the binder
/// re-checks it under the device's transition lock, so no new binding can
/// start against a driver that is on its way out.
#[derive(Debug)]
pub(crate) struct RegisteredDriver {
    pub(crate) driver: Arc<dyn MbusDriver>,
    active: AtomicBool,
}

impl RegisteredDriver {
    pub(crate) fn new(driver: Arc<dyn MbusDriver>) -> Arc<Self> {
        Arc::new(Self {
            driver,
            active: AtomicBool::new(true),
        })
    }

    /// Forbid any new binding against this driver.
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Outcome of a single bind attempt.
#[derive(Debug)]
pub(crate) enum BindAttempt {
    /// Probe succeeded; the device is now bound.
    Bound,
    /// The device was already bound to some driver; nothing was invoked.
    AlreadyBound,
    /// The driver began unregistering before probe could start.
    DriverInactive,
    /// The device began unregistering before probe could start.
    DeviceUnregistering,
    /// The probe hook declined the device; it stays unbound.
    Rejected(ProbeError),
}

/// Attempt the `Unbound -> Bound` transition for an already-matched pair.
///
/// Invokes `probe`, and on success the optional `scan` hook. A probe
/// failure leaves no observable partial state.
pub(crate) fn bind(dev: &Arc<MbusDevice>, entry: &Arc<RegisteredDriver>) -> BindAttempt {
    let _transition = dev.transition.lock();

    if dev.is_unregistering() {
        return BindAttempt::DeviceUnregistering;
    }
    if matches!(*dev.binding.lock(), Binding::Bound(_)) {
        return BindAttempt::AlreadyBound;
    }
    if !entry.is_active() {
        return BindAttempt::DriverInactive;
    }

    let name = entry.driver.name();
    match entry.driver.probe(dev) {
        Ok(()) => {
            *dev.binding.lock() = Binding::Bound(entry.clone());
            log::info!(
                "bound {} to driver {name}",
                dev.name().unwrap_or("<unregistered>"),
            );
            entry.driver.scan(dev);
            BindAttempt::Bound
        }
        Err(err) => {
            log::debug!(
                "driver {name} rejected {}: {err}",
                dev.name().unwrap_or("<unregistered>"),
            );
            BindAttempt::Rejected(err)
        }
    }
}

/// Drive the `Bound -> Unbound` transition, invoking the driver's `remove`
/// hook. Returns `false` (and invokes nothing) if the device is not bound,
/// or — when `only` is given — not bound to that particular driver.
pub(crate) fn unbind(dev: &Arc<MbusDevice>, only: Option<&Arc<RegisteredDriver>>) -> bool {
    let _transition = dev.transition.lock();

    let entry = match *dev.binding.lock() {
        Binding::Bound(ref entry) => match only {
            Some(target) if !Arc::ptr_eq(entry, target) => return false,
            _ => entry.clone(),
        },
        Binding::Unbound => return false,
    };

    // Remove has no failure channel; teardown always completes.
    entry.driver.remove(dev);
    *dev.binding.lock() = Binding::Unbound;
    log::info!(
        "unbound {} from driver {}",
        dev.name().unwrap_or("<unregistered>"),
        entry.driver.name(),
    );
    true
}
