//! The bus authority: registered devices, registered drivers, and the
//! matching rule that pairs them.
//!
//! An [`MbusRegistry`] is an explicit object constructed once and passed by
//! reference to every caller; there is no process-wide singleton. All four
//! registration operations may be called concurrently from independent
//! threads. The registry's own lock is only ever held to mutate or snapshot
//! its sets — never across a driver hook, so probe/scan/remove may register
//! or unregister other devices themselves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binder::{self, BindAttempt, RegisteredDriver};
use crate::device::{DeviceInfo, MbusDevice};
use crate::driver::MbusDriver;
use crate::error::MbusError;
use crate::id::table_match;
use crate::ida::IndexAllocator;

#[derive(Debug, Default)]
struct Inner {
    /// Registered devices keyed by bus index.
    devices: HashMap<u32, Arc<MbusDevice>>,
    /// Registered drivers in registration order; earlier drivers win the
    /// first-match rule.
    drivers: Vec<Arc<RegisteredDriver>>,
}

/// The central bus authority.
#[derive(Debug)]
pub struct MbusRegistry {
    name: Arc<str>,
    ida: IndexAllocator,
    inner: Mutex<Inner>,
}

impl MbusRegistry {
    /// Create a bus with the given name. The name prefixes device names
    /// (`<name>-dev<index>`) and modalias strings.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            ida: IndexAllocator::new(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The bus name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // -----------------------------------------------------------------------
    // Driver registration
    // -----------------------------------------------------------------------

    /// Register a driver and evaluate it against every currently registered
    /// device.
    ///
    /// Each match triggers an independent probe attempt; probe failures here
    /// are logged, not returned, since no single device owns this call.
    /// Fails with [`MbusError::AlreadyRegistered`] if a driver with the same
    /// name is present.
    pub fn register_driver(&self, driver: Arc<dyn MbusDriver>) -> Result<(), MbusError> {
        let (entry, devices) = {
            let mut inner = self.inner.lock();
            if inner
                .drivers
                .iter()
                .any(|e| e.driver.name() == driver.name())
            {
                return Err(MbusError::AlreadyRegistered {
                    name: driver.name().to_string(),
                });
            }
            let entry = RegisteredDriver::new(driver);
            inner.drivers.push(entry.clone());
            let devices: Vec<Arc<MbusDevice>> = inner.devices.values().cloned().collect();
            (entry, devices)
        };

        log::debug!("registered driver {} on {}", entry.driver.name(), self.name);

        for dev in devices {
            if table_match(&dev.id(), entry.driver.id_table()) {
                // Already-bound devices stay with their driver; the binder
                // checks under the device's transition lock.
                binder::bind(&dev, &entry);
            }
        }
        Ok(())
    }

    /// Unregister a driver by name, unbinding every device bound to it
    /// first. No new binding can start against the driver once this call has
    /// begun. Returns `false` if no such driver is registered.
    pub fn unregister_driver(&self, name: &str) -> bool {
        let (entry, devices) = {
            let inner = self.inner.lock();
            let Some(entry) = inner
                .drivers
                .iter()
                .find(|e| e.driver.name() == name)
                .cloned()
            else {
                return false;
            };
            entry.deactivate();
            let devices: Vec<Arc<MbusDevice>> = inner.devices.values().cloned().collect();
            (entry, devices)
        };

        for dev in devices {
            binder::unbind(&dev, Some(&entry));
        }

        let mut inner = self.inner.lock();
        inner.drivers.retain(|e| !Arc::ptr_eq(e, &entry));
        drop(inner);
        log::debug!("unregistered driver {name} from {}", self.name);
        true
    }

    // -----------------------------------------------------------------------
    // Device registration
    // -----------------------------------------------------------------------

    /// Register a device: assign it the smallest free index, insert it, and
    /// match it against registered drivers in registration order.
    ///
    /// The first matching driver gets the only probe attempt; if its probe
    /// declines, the device stays registered and unbound and the rejection
    /// is returned. No fallback to a second candidate. Fails with
    /// [`MbusError::AllocationFailed`] on index exhaustion and
    /// [`MbusError::AlreadyRegistered`] if this device object was registered
    /// before.
    pub fn register_device(&self, dev: &Arc<MbusDevice>) -> Result<(), MbusError> {
        let index = self.ida.allocate()?;
        if !dev.assign_registration(&self.name, index) {
            self.ida.release(index);
            return Err(MbusError::AlreadyRegistered {
                name: dev
                    .name()
                    .expect("registered device has a name")
                    .to_string(),
            });
        }

        let drivers = {
            let mut inner = self.inner.lock();
            inner.devices.insert(index, dev.clone());
            inner.drivers.clone()
        };

        log::debug!(
            "registered {} ({})",
            dev.name().expect("just assigned"),
            dev.modalias().expect("just assigned"),
        );

        for entry in drivers {
            if !table_match(&dev.id(), entry.driver.id_table()) {
                continue;
            }
            match binder::bind(dev, &entry) {
                BindAttempt::Bound | BindAttempt::AlreadyBound => return Ok(()),
                BindAttempt::Rejected(source) => {
                    return Err(MbusError::ProbeRejected {
                        driver: entry.driver.name().to_string(),
                        source,
                    });
                }
                // The driver started unregistering; it no longer counts as
                // a candidate.
                BindAttempt::DriverInactive => continue,
                // The device itself started unregistering; matching is over.
                BindAttempt::DeviceUnregistering => return Ok(()),
            }
        }
        Ok(())
    }

    /// Unregister a device: run the remove transition if it is bound, drop
    /// it from the device set, then release its index.
    ///
    /// Unbind-then-release ordering is load-bearing: releasing first would
    /// let a new device reuse the index while the old binding is still live.
    /// Returns `false` if the device is not registered on this bus.
    pub fn unregister_device(&self, dev: &Arc<MbusDevice>) -> bool {
        let Some(index) = dev.index() else {
            return false;
        };
        if !self.holds(index, dev) {
            return false;
        }

        // No new binding may start once unregistration has begun; a driver
        // registering concurrently would otherwise snapshot this device and
        // re-bind it the moment the remove hook returns.
        dev.begin_unregistration();
        binder::unbind(dev, None);

        let removed = {
            let mut inner = self.inner.lock();
            // Re-check under the lock: a concurrent unregistration may have
            // won, and the index may even belong to a new device by now.
            match inner.devices.get(&index) {
                Some(existing) if Arc::ptr_eq(existing, dev) => {
                    inner.devices.remove(&index);
                    true
                }
                _ => false,
            }
        };
        if removed {
            self.ida.release(index);
            log::debug!("unregistered {} from {}", dev.name().unwrap_or("?"), self.name);
        }
        removed
    }

    fn holds(&self, index: u32, dev: &Arc<MbusDevice>) -> bool {
        let inner = self.inner.lock();
        matches!(inner.devices.get(&index), Some(existing) if Arc::ptr_eq(existing, dev))
    }

    // -----------------------------------------------------------------------
    // Derived views
    // -----------------------------------------------------------------------

    /// Snapshot of every registered device, ordered by index. For tooling
    /// and diagnostics only.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        let devices: Vec<Arc<MbusDevice>> = {
            let inner = self.inner.lock();
            inner.devices.values().cloned().collect()
        };
        let mut infos: Vec<DeviceInfo> = devices.iter().filter_map(|d| d.info()).collect();
        infos.sort_by_key(|info| info.index);
        infos
    }

    /// Names of the registered drivers, in registration order.
    pub fn driver_names(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .drivers
            .iter()
            .map(|e| e.driver.name().to_string())
            .collect()
    }
}

impl Default for MbusRegistry {
    fn default() -> Self {
        Self::new("mbus")
    }
}
