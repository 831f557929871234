//! The device object and its derived introspection views.
//!
//! A hardware publisher creates an [`MbusDevice`] with an immutable identity
//! and a capability table, then hands it to the registry. Registration
//! assigns the unique index and the `<bus>-dev<index>` name exactly once;
//! the binding state lives behind a per-device lock so probe and remove on
//! the same device are always serialized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::Serialize;

use crate::binder::RegisteredDriver;
use crate::hw_ops::MbusHwOps;
use crate::id::MbusDeviceId;

/// Externally observable binding state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindState {
    /// No driver owns the device.
    Unbound,
    /// Exactly one driver owns the device.
    Bound,
}

/// Internal binding record; holds the back-reference to the owning driver.
#[derive(Debug, Default)]
pub(crate) enum Binding {
    #[default]
    Unbound,
    Bound(Arc<RegisteredDriver>),
}

/// Bus-assigned naming, set once at registration.
#[derive(Debug)]
struct Registration {
    bus_name: Arc<str>,
    index: u32,
    name: String,
}

/// A device on the bus.
///
/// The identity and capability table are fixed at construction; index and
/// name are fixed at registration. The device owns its capability table for
/// its whole lifetime and never owns the driver bound to it.
#[derive(Debug)]
pub struct MbusDevice {
    id: MbusDeviceId,
    hw_ops: Arc<dyn MbusHwOps>,
    registration: OnceLock<Registration>,
    pub(crate) binding: Mutex<Binding>,
    /// Serializes bind/unbind transitions on this device. Held across hook
    /// invocations, unlike `binding`, which hooks may read through the
    /// public accessors.
    pub(crate) transition: Mutex<()>,
    /// Flips once when unregistration begins; the binder refuses to start a
    /// new binding afterwards, so a concurrently registering driver cannot
    /// re-bind a device whose teardown is underway.
    unregistering: AtomicBool,
}

impl MbusDevice {
    /// Create an unregistered device with the given identity and capability
    /// table.
    pub fn new(id: MbusDeviceId, hw_ops: Arc<dyn MbusHwOps>) -> Arc<Self> {
        Arc::new(Self {
            id,
            hw_ops,
            registration: OnceLock::new(),
            binding: Mutex::new(Binding::Unbound),
            transition: Mutex::new(()),
            unregistering: AtomicBool::new(false),
        })
    }

    /// The device's identity pair.
    pub fn id(&self) -> MbusDeviceId {
        self.id
    }

    /// The capability table handed to the bound driver.
    pub fn hw_ops(&self) -> &Arc<dyn MbusHwOps> {
        &self.hw_ops
    }

    /// The unique bus index, once registered.
    pub fn index(&self) -> Option<u32> {
        self.registration.get().map(|r| r.index)
    }

    /// The bus-assigned name (`<bus>-dev<index>`), once registered.
    pub fn name(&self) -> Option<&str> {
        self.registration.get().map(|r| r.name.as_str())
    }

    /// Current binding state.
    pub fn state(&self) -> BindState {
        match *self.binding.lock() {
            Binding::Unbound => BindState::Unbound,
            Binding::Bound(_) => BindState::Bound,
        }
    }

    /// Name of the driver currently bound to this device, if any.
    pub fn bound_driver(&self) -> Option<String> {
        match *self.binding.lock() {
            Binding::Unbound => None,
            Binding::Bound(ref entry) => Some(entry.driver.name().to_string()),
        }
    }

    // -----------------------------------------------------------------------
    // Introspection views (read-only, for tooling)
    // -----------------------------------------------------------------------

    /// Device identifier as a 4-hex-digit attribute string.
    pub fn device_attr(&self) -> String {
        format!("0x{:04x}", self.id.device)
    }

    /// Vendor identifier as a 4-hex-digit attribute string.
    pub fn vendor_attr(&self) -> String {
        format!("0x{:04x}", self.id.vendor)
    }

    /// Composite alias `<bus>:d<8-hex-device>v<8-hex-vendor>` used as an
    /// out-of-band driver-matching hint. `None` before registration, since
    /// the bus name is not known yet.
    pub fn modalias(&self) -> Option<String> {
        self.registration.get().map(|r| {
            format!("{}:d{:08X}v{:08X}", r.bus_name, self.id.device, self.id.vendor)
        })
    }

    /// Environment variables announced for this device, for automated
    /// module-loading tooling. Empty before registration.
    pub fn uevent_vars(&self) -> Vec<(String, String)> {
        match self.modalias() {
            Some(alias) => vec![("MODALIAS".to_string(), alias)],
            None => Vec::new(),
        }
    }

    /// Serializable snapshot of the device, `None` before registration.
    pub fn info(&self) -> Option<DeviceInfo> {
        let reg = self.registration.get()?;
        Some(DeviceInfo {
            name: reg.name.clone(),
            index: reg.index,
            device: self.id.device,
            vendor: self.id.vendor,
            modalias: format!(
                "{}:d{:08X}v{:08X}",
                reg.bus_name, self.id.device, self.id.vendor
            ),
            state: self.state(),
            driver: self.bound_driver(),
        })
    }

    /// Record the bus-assigned index and name. Fails (returns `false`) if
    /// the device was already registered once.
    pub(crate) fn assign_registration(&self, bus_name: &Arc<str>, index: u32) -> bool {
        let reg = Registration {
            bus_name: bus_name.clone(),
            name: format!("{bus_name}-dev{index}"),
            index,
        };
        self.registration.set(reg).is_ok()
    }

    /// Forbid any new binding against this device. Called by the registry
    /// the moment unregistration begins; never reset, since a device object
    /// registers at most once.
    pub(crate) fn begin_unregistration(&self) {
        self.unregistering.store(true, Ordering::Release);
    }

    pub(crate) fn is_unregistering(&self) -> bool {
        self.unregistering.load(Ordering::Acquire)
    }
}

/// Point-in-time snapshot of a registered device for tooling and
/// diagnostics. Not consumed by the core logic.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub index: u32,
    pub device: u32,
    pub vendor: u32,
    pub modalias: String,
    pub state: BindState,
    /// Name of the bound driver, if any.
    pub driver: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_ops::{IrqCookie, IrqHandler, MbusHwOps};

    #[derive(Debug)]
    struct NullHwOps;

    impl MbusHwOps for NullHwOps {
        fn request_threaded_irq(
            &self,
            _dev: &MbusDevice,
            _handler: IrqHandler,
            _thread_fn: Option<IrqHandler>,
            _name: &str,
            _intr_src: i32,
        ) -> Result<IrqCookie, Box<dyn std::error::Error + Send + Sync>> {
            Ok(IrqCookie::new(0))
        }

        fn free_irq(&self, _dev: &MbusDevice, _cookie: IrqCookie) {}

        fn ack_interrupt(&self, _dev: &MbusDevice, _num: i32) {}
    }

    #[test]
    fn test_unregistered_device_has_no_index_or_name() {
        let dev = MbusDevice::new(MbusDeviceId::new(7, 42), Arc::new(NullHwOps));
        assert_eq!(dev.index(), None);
        assert_eq!(dev.name(), None);
        assert_eq!(dev.modalias(), None);
        assert!(dev.uevent_vars().is_empty());
        assert!(dev.info().is_none());
        assert_eq!(dev.state(), BindState::Unbound);
    }

    #[test]
    fn test_attribute_formats() {
        let dev = MbusDevice::new(MbusDeviceId::new(0x2, 0xbeef), Arc::new(NullHwOps));
        assert_eq!(dev.device_attr(), "0x0002");
        assert_eq!(dev.vendor_attr(), "0xbeef");

        let bus: Arc<str> = Arc::from("mbus");
        assert!(dev.assign_registration(&bus, 3));
        assert_eq!(dev.name(), Some("mbus-dev3"));
        assert_eq!(dev.index(), Some(3));
        assert_eq!(dev.modalias().as_deref(), Some("mbus:d00000002v0000BEEF"));
        assert_eq!(
            dev.uevent_vars(),
            vec![("MODALIAS".to_string(), "mbus:d00000002v0000BEEF".to_string())]
        );
    }

    #[test]
    fn test_registration_is_set_once() {
        let dev = MbusDevice::new(MbusDeviceId::new(1, 1), Arc::new(NullHwOps));
        let bus: Arc<str> = Arc::from("mbus");
        assert!(dev.assign_registration(&bus, 0));
        assert!(!dev.assign_registration(&bus, 1));
        assert_eq!(dev.index(), Some(0));
    }

    #[test]
    fn test_info_serializes_for_tooling() {
        let dev = MbusDevice::new(MbusDeviceId::new(0x10, 0x8086), Arc::new(NullHwOps));
        let bus: Arc<str> = Arc::from("mbus");
        dev.assign_registration(&bus, 0);

        let info = dev.info().unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["name"], "mbus-dev0");
        assert_eq!(json["state"], "unbound");
        assert_eq!(json["modalias"], "mbus:d00000010v00008086");
        assert!(json["driver"].is_null());
    }
}
