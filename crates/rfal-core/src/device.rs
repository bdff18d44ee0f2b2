//! Flash device capability trait
//!
//! This module provides the `FlashDevice` trait that drivers implement to
//! expose a physical or emulated flash chip to the abstraction layer. The
//! core never looks inside a device beyond its name, geometry and the
//! operations listed here.

use crate::config::NAME_MAX;
use crate::error::Result;
use bitflags::bitflags;

bitflags! {
    /// Operations a flash device provides
    ///
    /// `READ`, `WRITE` and `ERASE` are mandatory; a device lacking any of
    /// them is rejected at registration. `INIT` and `DEINIT` are optional:
    /// internal flash usually needs neither.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Device needs `init()` before first use
        const INIT   = 1 << 0;
        /// Device needs `deinit()` on teardown
        const DEINIT = 1 << 1;
        /// Device can read
        const READ   = 1 << 2;
        /// Device can program
        const WRITE  = 1 << 3;
        /// Device can erase
        const ERASE  = 1 << 4;

        /// Operations every registered device must provide
        const REQUIRED = Self::READ.bits() | Self::WRITE.bits() | Self::ERASE.bits();
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::REQUIRED
    }
}

/// Physical layout of a flash device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlashGeometry {
    /// Start address of the device in the memory map
    pub base_addr: u32,
    /// Device length in bytes
    pub len: u32,
    /// Sector size: minimum erase granularity in bytes
    pub sector_size: u32,
    /// Page size: largest write burst that needs no wait, usually 256
    pub page_size: u32,
    /// Minimum read/write unit in bytes (1 for most NOR flash, 8 on stm32l4)
    pub io_size: u32,
}

impl FlashGeometry {
    /// Check if an address is aligned to the sector size
    pub fn is_sector_aligned(&self, addr: u32) -> bool {
        self.sector_size == 0 || addr % self.sector_size == 0
    }
}

/// Flash device driver interface
///
/// All operations take `&self`: the registry only ever holds shared
/// references to devices, and concurrent calls against different
/// partitions of the same device may happen. Drivers serialize internally
/// if their hardware needs it.
///
/// Offsets passed to `read`, `write` and `erase` are relative to the start
/// of the device; the partition offset has already been added and the
/// range has been checked against the partition length.
///
/// # Example
///
/// ```ignore
/// impl FlashDevice for InternalFlash {
///     fn name(&self) -> &str { "onchip" }
///     fn geometry(&self) -> FlashGeometry { self.geometry }
///     fn read(&self, offset: u32, buf: &mut [u8]) -> Result<()> { ... }
///     fn write(&self, offset: u32, data: &[u8]) -> Result<()> { ... }
///     fn erase(&self, offset: u32, len: u32) -> Result<()> { ... }
/// }
/// ```
pub trait FlashDevice: Sync {
    /// Device name, unique among registered devices
    fn name(&self) -> &str;

    /// Device geometry
    fn geometry(&self) -> FlashGeometry;

    /// Operations this device provides
    ///
    /// `init` and `deinit` are only called when advertised here. The default
    /// advertises neither, so a driver overriding them must override this
    /// too.
    fn capabilities(&self) -> Capabilities {
        Capabilities::REQUIRED
    }

    /// Bring the device up
    ///
    /// Called by [`Fal::init`](crate::Fal::init) only if
    /// [`capabilities`](Self::capabilities) contains [`Capabilities::INIT`].
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Shut the device down
    ///
    /// Called by [`Fal::deinit`](crate::Fal::deinit) only if
    /// [`capabilities`](Self::capabilities) contains [`Capabilities::DEINIT`].
    fn deinit(&self) -> Result<()> {
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `offset`
    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Program `data` starting at `offset`
    ///
    /// The target range should be erased first; crossing page boundaries is
    /// the driver's business.
    fn write(&self, offset: u32, data: &[u8]) -> Result<()>;

    /// Erase `len` bytes starting at `offset`
    fn erase(&self, offset: u32, len: u32) -> Result<()>;
}

/// Compare two names over at most [`NAME_MAX`] bytes
pub fn names_match(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    a[..a.len().min(NAME_MAX)] == b[..b.len().min(NAME_MAX)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match() {
        assert!(names_match("norflash0", "norflash0"));
        assert!(!names_match("norflash0", "norflash1"));
        assert!(!names_match("nor", "norflash0"));
        assert!(!names_match("", "a"));
    }

    #[test]
    fn test_names_match_is_bounded() {
        let long_a = "abcdefghijklmnopqrstuvwx-one";
        let long_b = "abcdefghijklmnopqrstuvwx-two";
        assert!(names_match(long_a, long_b));
        assert!(!names_match(&long_a[..NAME_MAX - 1], long_b));
    }

    #[test]
    fn test_required_capabilities() {
        let caps = Capabilities::default() | Capabilities::INIT;
        assert!(caps.contains(Capabilities::REQUIRED));
        assert!(!(Capabilities::READ | Capabilities::ERASE).contains(Capabilities::REQUIRED));
    }

    #[test]
    fn test_sector_alignment() {
        let geometry = FlashGeometry {
            len: 0x10000,
            sector_size: 0x1000,
            ..Default::default()
        };
        assert!(geometry.is_sector_aligned(0x2000));
        assert!(!geometry.is_sector_aligned(0x2040));
        assert!(FlashGeometry::default().is_sector_aligned(7));
    }
}
