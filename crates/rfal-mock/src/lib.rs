//! rfal-mock - In-memory flash emulator
//!
//! This crate provides a flash device that emulates a flash chip in memory.
//! It's useful for testing partition layouts and for the `rfal` tool
//! without real hardware. Images can be loaded from and saved to files so
//! that state survives between runs.

mod error;

pub use error::ImageError;

use rfal_core::error::{Error, Result};
use rfal_core::{Capabilities, FlashDevice, FlashGeometry};
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Value of an erased byte
pub const ERASED: u8 = 0xFF;

/// How programming combines with the existing contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Data replaces the existing bytes
    Overwrite,
    /// Programming can only change 1 -> 0, like real NOR flash
    #[default]
    Nor,
}

/// Device operations, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOp {
    /// `init()`
    Init,
    /// `deinit()`
    Deinit,
    /// `read()`
    Read,
    /// `write()`
    Write,
    /// `erase()`
    Erase,
}

impl MockOp {
    const COUNT: usize = 5;

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Configuration for the mock flash
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Device name
    pub name: String,
    /// Start address in the memory map
    pub base_addr: u32,
    /// Flash size in bytes
    pub size: u32,
    /// Sector size for smallest erase
    pub sector_size: u32,
    /// Page size for programming
    pub page_size: u32,
    /// Minimum I/O unit
    pub io_size: u32,
    /// Programming behavior
    pub write_mode: WriteMode,
    /// Advertised capabilities
    pub capabilities: Capabilities,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock_flash".to_string(),
            base_addr: 0,
            size: 8 * 1024 * 1024,
            sector_size: 4096,
            page_size: 256,
            io_size: 1,
            write_mode: WriteMode::Nor,
            capabilities: Capabilities::REQUIRED | Capabilities::INIT | Capabilities::DEINIT,
        }
    }
}

impl MockConfig {
    /// Configuration named `name` with the given geometry
    pub fn from_geometry(name: &str, geometry: FlashGeometry) -> Self {
        Self {
            name: name.to_string(),
            base_addr: geometry.base_addr,
            size: geometry.len,
            sector_size: geometry.sector_size,
            page_size: geometry.page_size,
            io_size: geometry.io_size,
            ..Default::default()
        }
    }

    /// Use the given write mode
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Advertise the given capabilities
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Mock flash device
///
/// Emulates a flash chip in memory. All operations take `&self`, so one
/// instance can be shared between threads and registered with a context.
pub struct MockFlash {
    config: MockConfig,
    data: Mutex<Vec<u8>>,
    initialized: AtomicBool,
    fail: AtomicU8,
    calls: [AtomicUsize; MockOp::COUNT],
}

impl MockFlash {
    /// Create a new mock flash with the given configuration, fully erased
    pub fn new(config: MockConfig) -> Self {
        let data = vec![ERASED; config.size as usize];
        Self {
            config,
            data: Mutex::new(data),
            initialized: AtomicBool::new(false),
            fail: AtomicU8::new(0),
            calls: Default::default(),
        }
    }

    /// Create a mock flash with pre-filled data
    pub fn with_data(config: MockConfig, initial_data: &[u8]) -> Self {
        let flash = Self::new(config);
        {
            let mut data = flash.memory();
            let len = core::cmp::min(initial_data.len(), data.len());
            data[..len].copy_from_slice(&initial_data[..len]);
        }
        flash
    }

    /// Get the configuration
    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Snapshot of the whole flash contents
    pub fn data(&self) -> Vec<u8> {
        self.memory().clone()
    }

    /// Check whether `init()` was called without a later `deinit()`
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Make `op` fail with [`Error::Fail`] (or succeed again)
    pub fn set_fail(&self, op: MockOp, fail: bool) {
        if fail {
            self.fail.fetch_or(op.bit(), Ordering::SeqCst);
        } else {
            self.fail.fetch_and(!op.bit(), Ordering::SeqCst);
        }
    }

    /// Number of times `op` was called
    pub fn calls(&self, op: MockOp) -> usize {
        self.calls[op as usize].load(Ordering::SeqCst)
    }

    /// Replace the flash contents with the image at `path`
    ///
    /// A shorter image leaves the rest of the flash erased.
    pub fn load_image(&self, path: impl AsRef<Path>) -> core::result::Result<(), ImageError> {
        let path = path.as_ref();
        let image = fs::read(path)?;
        if image.len() > self.config.size as usize {
            return Err(ImageError::TooLarge {
                size: image.len(),
                capacity: self.config.size,
            });
        }

        let mut data = self.memory();
        data.fill(ERASED);
        data[..image.len()].copy_from_slice(&image);
        log::debug!(
            "Loaded {} bytes into {} from {}",
            image.len(),
            self.config.name,
            path.display()
        );
        Ok(())
    }

    /// Write the whole flash contents to `path`
    pub fn save_image(&self, path: impl AsRef<Path>) -> core::result::Result<(), ImageError> {
        let path = path.as_ref();
        fs::write(path, self.memory().as_slice())?;
        log::debug!("Saved {} to {}", self.config.name, path.display());
        Ok(())
    }

    fn memory(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and apply failure injection
    fn enter(&self, op: MockOp) -> Result<()> {
        self.calls[op as usize].fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) & op.bit() != 0 {
            log::debug!("{}: injected {:?} failure", self.config.name, op);
            return Err(Error::Fail);
        }
        Ok(())
    }

    /// Byte range of an access, `Io` if it leaves the device
    fn range(&self, op: MockOp, offset: u32, len: usize) -> Result<Range<usize>> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.config.size as usize => Ok(start..end),
            _ => {
                log::warn!(
                    "{}: {:?} of {} bytes at 0x{:08X} out of bounds (size 0x{:08X})",
                    self.config.name,
                    op,
                    len,
                    offset,
                    self.config.size
                );
                Err(Error::Io)
            }
        }
    }
}

impl FlashDevice for MockFlash {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn geometry(&self) -> FlashGeometry {
        FlashGeometry {
            base_addr: self.config.base_addr,
            len: self.config.size,
            sector_size: self.config.sector_size,
            page_size: self.config.page_size,
            io_size: self.config.io_size,
        }
    }

    fn capabilities(&self) -> Capabilities {
        self.config.capabilities
    }

    fn init(&self) -> Result<()> {
        self.enter(MockOp::Init)?;
        self.initialized.store(true, Ordering::SeqCst);
        log::debug!("{}: initialized", self.config.name);
        Ok(())
    }

    fn deinit(&self) -> Result<()> {
        self.enter(MockOp::Deinit)?;
        self.initialized.store(false, Ordering::SeqCst);
        log::debug!("{}: deinitialized", self.config.name);
        Ok(())
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.enter(MockOp::Read)?;
        let range = self.range(MockOp::Read, offset, buf.len())?;
        buf.copy_from_slice(&self.memory()[range]);
        Ok(())
    }

    fn write(&self, offset: u32, data: &[u8]) -> Result<()> {
        self.enter(MockOp::Write)?;
        let range = self.range(MockOp::Write, offset, data.len())?;
        let mut memory = self.memory();
        let target = &mut memory[range];
        match self.config.write_mode {
            WriteMode::Overwrite => target.copy_from_slice(data),
            // Flash programming: can only change 1 -> 0
            WriteMode::Nor => {
                for (byte, &new) in target.iter_mut().zip(data) {
                    *byte &= new;
                }
            }
        }
        Ok(())
    }

    fn erase(&self, offset: u32, len: u32) -> Result<()> {
        self.enter(MockOp::Erase)?;
        let range = self.range(MockOp::Erase, offset, len as usize)?;
        self.memory()[range].fill(ERASED);
        Ok(())
    }
}
