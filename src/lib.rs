//! # mbus
//!
//! A minimal bus abstraction that lets independently developed device
//! publishers and driver consumers find each other by `(device, vendor)`
//! identity and bind through a central authority.
//!
//! A hardware publisher creates an [`MbusDevice`] carrying an identity and a
//! capability table ([`MbusHwOps`]) and registers it on an [`MbusRegistry`].
//! Drivers implement [`MbusDriver`] and register a sentinel-terminated table
//! of the identities they service. The registry assigns each device the
//! smallest free index, evaluates the matching rule, and drives the
//! probe/scan/remove lifecycle: the first matching driver gets one probe
//! attempt, a successful probe binds the device, and unregistration of
//! either side unbinds it again.
//!
//! All registration operations are safe to call concurrently; driver hooks
//! run without any registry-wide lock held and may register or unregister
//! other devices themselves.
//!
//! ```
//! use std::sync::Arc;
//! use mbus::{MbusDeviceId, MbusDriver, MbusRegistry, ANY_ID};
//!
//! #[derive(Debug)]
//! struct DmaDriver {
//!     table: [MbusDeviceId; 2],
//! }
//!
//! impl MbusDriver for DmaDriver {
//!     fn name(&self) -> &str {
//!         "mbus-dma"
//!     }
//!     fn id_table(&self) -> &[MbusDeviceId] {
//!         &self.table
//!     }
//!     fn probe(&self, _dev: &Arc<mbus::MbusDevice>) -> Result<(), mbus::ProbeError> {
//!         Ok(())
//!     }
//!     fn remove(&self, _dev: &Arc<mbus::MbusDevice>) {}
//! }
//!
//! let bus = MbusRegistry::new("mbus");
//! let driver = Arc::new(DmaDriver {
//!     table: [MbusDeviceId::new(2, ANY_ID), MbusDeviceId::SENTINEL],
//! });
//! bus.register_driver(driver).unwrap();
//! ```

mod binder;

pub mod device;
pub mod driver;
pub mod error;
pub mod hw_ops;
pub mod id;
pub mod ida;
pub mod registry;

pub use device::{BindState, DeviceInfo, MbusDevice};
pub use driver::MbusDriver;
pub use error::{MbusError, ProbeError};
pub use hw_ops::{IrqCookie, IrqHandler, IrqReturn, MbusHwOps};
pub use id::{id_match, table_match, MbusDeviceId, ANY_ID};
pub use ida::IndexAllocator;
pub use registry::MbusRegistry;
