//! rfal-core - Flash abstraction layer core
//!
//! This crate binds named logical partitions to named flash devices and
//! dispatches partition-relative read/write/erase requests to the owning
//! device after bounds checking. It is designed to be `no_std` compatible
//! for use in firmware.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), the
//!   `MutexLock` lock kind and TOML layout loading
//! - `alloc` - Enable heap allocation
//!
//! # Example
//!
//! ```ignore
//! use rfal_core::{Fal, FlagLock, Partition};
//!
//! static TABLE: [Partition<'static>; 2] = [
//!     Partition::new("bl", "norflash0", 0, 0x1_0000),
//!     Partition::new("app", "norflash0", 0x1_0000, 0x7_0000),
//! ];
//!
//! let fal: Fal<'_, FlagLock> = Fal::new();
//! fal.register_flash_device(&NOR_FLASH)?;
//! fal.register_partition_table(&TABLE)?;
//! fal.init()?;
//!
//! let app = fal.find_partition("app")?;
//! let mut header = [0u8; 64];
//! fal.read(app, 0, &mut header)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod config;
pub mod device;
pub mod error;
pub mod fal;
#[cfg(feature = "std")]
pub mod layout;
pub mod lock;
pub mod partition;

#[cfg(test)]
mod testing;

pub use device::{names_match, Capabilities, FlashDevice, FlashGeometry};
pub use error::{Error, Result};
pub use fal::Fal;
#[cfg(feature = "std")]
pub use lock::MutexLock;
pub use lock::{FlagLock, LockKind, NoLock};
pub use partition::Partition;
