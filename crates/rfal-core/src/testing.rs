//! RAM-backed flash device for unit tests

use crate::device::{Capabilities, FlashDevice, FlashGeometry};
use crate::error::{Error, Result};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::vec;
use std::vec::Vec;

pub struct RamFlash {
    name: &'static str,
    geometry: FlashGeometry,
    caps: Capabilities,
    data: Mutex<Vec<u8>>,
    pub io_calls: AtomicUsize,
    pub init_calls: AtomicUsize,
    pub deinit_calls: AtomicUsize,
    pub fail_io: AtomicBool,
    pub fail_init: AtomicBool,
}

impl RamFlash {
    pub fn new(name: &'static str, len: u32) -> Self {
        Self {
            name,
            geometry: FlashGeometry {
                base_addr: 0,
                len,
                sector_size: 4096,
                page_size: 256,
                io_size: 1,
            },
            caps: Capabilities::REQUIRED | Capabilities::INIT | Capabilities::DEINIT,
            data: Mutex::new(vec![0xFF; len as usize]),
            io_calls: AtomicUsize::new(0),
            init_calls: AtomicUsize::new(0),
            deinit_calls: AtomicUsize::new(0),
            fail_io: AtomicBool::new(false),
            fail_init: AtomicBool::new(false),
        }
    }

    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn io_calls(&self) -> usize {
        self.io_calls.load(Ordering::SeqCst)
    }

    fn access(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>> {
        self.io_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_io.load(Ordering::SeqCst) {
            return Err(Error::Io);
        }
        let start = offset as usize;
        let end = start + len;
        if end > self.geometry.len as usize {
            return Err(Error::Io);
        }
        Ok(start..end)
    }
}

impl FlashDevice for RamFlash {
    fn name(&self) -> &str {
        self.name
    }

    fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn init(&self) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(Error::Fail);
        }
        Ok(())
    }

    fn deinit(&self) -> Result<()> {
        self.deinit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<()> {
        let range = self.access(offset, buf.len())?;
        buf.copy_from_slice(&self.data.lock().unwrap()[range]);
        Ok(())
    }

    fn write(&self, offset: u32, data: &[u8]) -> Result<()> {
        let range = self.access(offset, data.len())?;
        self.data.lock().unwrap()[range].copy_from_slice(data);
        Ok(())
    }

    fn erase(&self, offset: u32, len: u32) -> Result<()> {
        let range = self.access(offset, len as usize)?;
        self.data.lock().unwrap()[range].fill(0xFF);
        Ok(())
    }
}
