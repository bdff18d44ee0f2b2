//! Error types for rfal-core
//!
//! This module provides a no_std compatible error type shared by the
//! context and by flash device drivers. Device drivers return the same
//! type so that their failures can be propagated verbatim.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Generic failure (also used for fatal partition table misconfiguration)
    Fail,

    // Lifecycle errors
    /// The context is already initialized
    AlreadyInitialized,
    /// The context has not been initialized
    NotInitialized,
    /// Nothing has been registered with the context yet
    NotRegistered,

    // Usage errors
    /// Invalid argument (zero size, out of bounds range, unresolved partition)
    InvalidArgument,
    /// Flash device does not provide the mandatory read/write/erase operations
    InvalidCapabilities,

    // Registry errors
    /// The same device or partition table is already registered
    AlreadyRegistered,
    /// All slots of the registry table are occupied
    ResourceExhausted,
    /// No device or partition matched the lookup
    NotFound,

    /// The context lock is held by someone else
    Busy,

    /// Device-level I/O failure
    Io,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "operation failed"),
            Self::AlreadyInitialized => write!(f, "already initialized"),
            Self::NotInitialized => write!(f, "not initialized"),
            Self::NotRegistered => write!(f, "no flash device or partition table registered"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::InvalidCapabilities => {
                write!(f, "flash device lacks mandatory read/write/erase operations")
            }
            Self::AlreadyRegistered => write!(f, "already registered"),
            Self::ResourceExhausted => write!(f, "no free slot left"),
            Self::NotFound => write!(f, "not found"),
            Self::Busy => write!(f, "context is busy"),
            Self::Io => write!(f, "flash I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
