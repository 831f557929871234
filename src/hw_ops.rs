//! Hardware capability table attached to every device.
//!
//! The bus core never invokes these operations itself. A hardware publisher
//! supplies the table when it creates a device, and the bound driver receives
//! it through the device handle during probe. Interrupt handles are owned
//! values: `request_threaded_irq` hands out an [`IrqCookie`] that must be
//! given back, by value, to `free_irq`, so a freed handle cannot be used
//! again.

use std::fmt;
use std::sync::Arc;

use crate::device::MbusDevice;

/// Result of an interrupt handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt was not from this device.
    None,
    /// The interrupt was handled.
    Handled,
    /// Wake the threaded handler to finish the work.
    WakeThread,
}

/// An interrupt handler callable from any thread.
///
/// The argument is the interrupt number that fired.
pub type IrqHandler = Arc<dyn Fn(i32) -> IrqReturn + Send + Sync>;

/// Opaque owned handle to a requested interrupt.
///
/// Returned by [`MbusHwOps::request_threaded_irq`] and consumed by
/// [`MbusHwOps::free_irq`]. Deliberately neither `Clone` nor `Copy`: once a
/// cookie has been passed to `free_irq` it is gone, and the type system
/// rejects any further use.
pub struct IrqCookie(u64);

impl IrqCookie {
    /// Wrap a table implementation's raw handle value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Unwrap the raw handle value, consuming the cookie.
    pub fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for IrqCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IrqCookie({:#x})", self.0)
    }
}

/// Hardware operations supported by a device on the bus.
///
/// Implemented by the hardware publisher; the bus only guarantees the table
/// is attached before registration and stays reachable from the device for
/// its bound lifetime.
pub trait MbusHwOps: Send + Sync + fmt::Debug {
    /// Request an interrupt for `intr_src`, with an optional threaded
    /// handler that runs when the primary handler returns
    /// [`IrqReturn::WakeThread`].
    fn request_threaded_irq(
        &self,
        dev: &MbusDevice,
        handler: IrqHandler,
        thread_fn: Option<IrqHandler>,
        name: &str,
        intr_src: i32,
    ) -> Result<IrqCookie, Box<dyn std::error::Error + Send + Sync>>;

    /// Free a previously requested interrupt, consuming its cookie.
    fn free_irq(&self, dev: &MbusDevice, cookie: IrqCookie);

    /// Acknowledge interrupt `num` on the device.
    fn ack_interrupt(&self, dev: &MbusDevice, num: i32);
}
