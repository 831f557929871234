//! Error types for bus registration and binding.

use thiserror::Error;

/// Boxed error returned by a driver's probe hook when it declines a device.
pub type ProbeError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the registration operations.
#[derive(Debug, Error)]
pub enum MbusError {
    /// The index space is exhausted; fatal to this registration attempt only.
    #[error("device index space exhausted")]
    AllocationFailed,

    /// A driver with this name is already registered, or the device object
    /// was already registered once.
    #[error("already registered: {name}")]
    AlreadyRegistered { name: String },

    /// The first matching driver's probe hook declined the device. The
    /// device remains registered and unbound; no further candidate is tried.
    #[error("probe rejected by driver {driver}")]
    ProbeRejected {
        driver: String,
        #[source]
        source: ProbeError,
    },
}
