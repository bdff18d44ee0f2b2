//! Bounds-checked partition I/O
//!
//! Every request goes through the same steps: lifecycle checks, argument
//! checks, a bound check against the partition length, device resolution
//! through the cache, and translation of the partition-relative offset to a
//! device offset. The lock is released before the device is called.

use super::Fal;
use crate::device::FlashDevice;
use crate::error::{Error, Result};
use crate::lock::LockKind;
use crate::partition::Partition;
use core::fmt;

#[derive(Debug, Clone, Copy)]
enum Op {
    Read,
    Write,
    Erase,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Erase => write!(f, "erase"),
        }
    }
}

impl<'a, L: LockKind, const DEVICES: usize, const TABLES: usize, const CACHE: usize>
    Fal<'a, L, DEVICES, TABLES, CACHE>
{
    /// Validate a request and resolve it to a device and device offset
    fn prepare(
        &self,
        op: Op,
        partition: &Partition<'_>,
        offset: u32,
        size: usize,
    ) -> Result<(&'a dyn FlashDevice, u32)> {
        let state = self.lock()?;

        if state.is_empty() {
            return Err(Error::NotRegistered);
        }
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }

        let size = u32::try_from(size).map_err(|_| Error::InvalidArgument)?;
        if size == 0 {
            return Err(Error::InvalidArgument);
        }
        if !partition.contains(offset, size) {
            log::error!(
                "Partition {} {} error: address 0x{:08X} out of bound 0x{:08X}",
                partition.name,
                op,
                offset as u64 + size as u64,
                partition.len
            );
            return Err(Error::InvalidArgument);
        }

        let Some(device) = state.cached_device(partition) else {
            log::error!(
                "Partition {} {} error: flash device {} not resolved",
                partition.name,
                op,
                partition.flash_name
            );
            return Err(Error::InvalidArgument);
        };

        let addr = partition
            .offset
            .checked_add(offset)
            .ok_or(Error::InvalidArgument)?;
        Ok((device, addr))
    }

    /// Read `buf.len()` bytes at partition-relative `offset`
    ///
    /// # Errors
    /// * `NotRegistered` / `NotInitialized` - lifecycle violation
    /// * `InvalidArgument` - empty buffer, range past the partition end, or
    ///   a partition that was never resolved into the cache
    /// * `Busy` - the context lock is held elsewhere
    /// * any error returned by the device
    pub fn read(&self, partition: &Partition<'_>, offset: u32, buf: &mut [u8]) -> Result<()> {
        let (device, addr) = self.prepare(Op::Read, partition, offset, buf.len())?;
        log::trace!(
            "read {} bytes from {}+0x{:X} ({} @ 0x{:08X})",
            buf.len(),
            partition.name,
            offset,
            device.name(),
            addr
        );
        device.read(addr, buf).map_err(|e| {
            log::error!(
                "Partition {} read error: flash device {} read failed: {}",
                partition.name,
                device.name(),
                e
            );
            e
        })
    }

    /// Write `data` at partition-relative `offset`
    ///
    /// The target range should have been erased first. Errors are the same
    /// as for [`read`](Self::read).
    pub fn write(&self, partition: &Partition<'_>, offset: u32, data: &[u8]) -> Result<()> {
        let (device, addr) = self.prepare(Op::Write, partition, offset, data.len())?;
        log::trace!(
            "write {} bytes to {}+0x{:X} ({} @ 0x{:08X})",
            data.len(),
            partition.name,
            offset,
            device.name(),
            addr
        );
        device.write(addr, data).map_err(|e| {
            log::error!(
                "Partition {} write error: flash device {} write failed: {}",
                partition.name,
                device.name(),
                e
            );
            e
        })
    }

    /// Erase `len` bytes at partition-relative `offset`
    ///
    /// Sector alignment is the device's business. Errors are the same as
    /// for [`read`](Self::read).
    pub fn erase(&self, partition: &Partition<'_>, offset: u32, len: u32) -> Result<()> {
        let (device, addr) = self.prepare(Op::Erase, partition, offset, len as usize)?;
        log::trace!(
            "erase {} bytes of {}+0x{:X} ({} @ 0x{:08X})",
            len,
            partition.name,
            offset,
            device.name(),
            addr
        );
        device.erase(addr, len).map_err(|e| {
            log::error!(
                "Partition {} erase error: flash device {} erase failed: {}",
                partition.name,
                device.name(),
                e
            );
            e
        })
    }

    /// Erase the whole partition
    pub fn erase_all(&self, partition: &Partition<'_>) -> Result<()> {
        self.erase(partition, 0, partition.len)
    }
}
