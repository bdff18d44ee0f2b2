//! Device and partition table registration

use super::Fal;
use crate::device::{Capabilities, FlashDevice};
use crate::error::{Error, Result};
use crate::lock::LockKind;
use crate::partition::Partition;

/// Identity comparison of two device references
fn same_device(a: &dyn FlashDevice, b: &dyn FlashDevice) -> bool {
    core::ptr::addr_eq(a, b)
}

impl<'a, L: LockKind, const DEVICES: usize, const TABLES: usize, const CACHE: usize>
    Fal<'a, L, DEVICES, TABLES, CACHE>
{
    /// Register a flash device
    ///
    /// The device is borrowed, not copied: it must stay alive and keep its
    /// name and geometry for as long as the context uses it.
    ///
    /// # Errors
    /// * `InvalidCapabilities` - the device lacks read, write or erase
    /// * `Fail` - the context is initialized
    /// * `Busy` - the context lock is held elsewhere
    /// * `AlreadyRegistered` - this very device is already registered
    /// * `ResourceExhausted` - every device slot is taken
    pub fn register_flash_device(&self, device: &'a dyn FlashDevice) -> Result<()> {
        if !device.capabilities().contains(Capabilities::REQUIRED) {
            log::error!(
                "Flash device {} does not provide read/write/erase",
                device.name()
            );
            return Err(Error::InvalidCapabilities);
        }

        let mut state = self.lock()?;
        if self.is_initialized() {
            return Err(Error::Fail);
        }

        if state
            .devices
            .iter()
            .flatten()
            .any(|registered| same_device(*registered, device))
        {
            return Err(Error::AlreadyRegistered);
        }

        match state.devices.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(device);
                log::debug!("Registered flash device {}", device.name());
                if !device
                    .capabilities()
                    .intersects(Capabilities::INIT | Capabilities::DEINIT)
                {
                    log::debug!(
                        "Flash device {} advertises neither init nor deinit, both will be skipped",
                        device.name()
                    );
                }
                Ok(())
            }
            None => {
                log::warn!(
                    "No free slot for flash device {} ({} slots)",
                    device.name(),
                    DEVICES
                );
                Err(Error::ResourceExhausted)
            }
        }
    }

    /// Register a partition table
    ///
    /// The table is borrowed as a whole; partitions keep their array order
    /// for lookups and cache construction.
    ///
    /// # Errors
    /// * `InvalidArgument` - the table is empty
    /// * `Fail` - the context is initialized
    /// * `Busy` - the context lock is held elsewhere
    /// * `AlreadyRegistered` - this very table is already registered
    /// * `ResourceExhausted` - every table slot is taken
    pub fn register_partition_table(&self, table: &'a [Partition<'a>]) -> Result<()> {
        if table.is_empty() {
            return Err(Error::InvalidArgument);
        }

        let mut state = self.lock()?;
        if self.is_initialized() {
            return Err(Error::Fail);
        }

        if state
            .tables
            .iter()
            .flatten()
            .any(|registered| core::ptr::eq(*registered, table))
        {
            return Err(Error::AlreadyRegistered);
        }

        match state.tables.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(table);
                log::debug!("Registered partition table with {} partition(s)", table.len());
                Ok(())
            }
            None => {
                log::warn!("No free partition table slot ({} slots)", TABLES);
                Err(Error::ResourceExhausted)
            }
        }
    }

    /// Remove a previously registered flash device
    ///
    /// # Errors
    /// * `Fail` - the context is initialized
    /// * `Busy` - the context lock is held elsewhere
    /// * `NotFound` - this device is not registered
    pub fn unregister_flash_device(&self, device: &dyn FlashDevice) -> Result<()> {
        let mut state = self.lock()?;
        if self.is_initialized() {
            return Err(Error::Fail);
        }

        let slot = state
            .devices
            .iter_mut()
            .find(|slot| slot.is_some_and(|registered| same_device(registered, device)))
            .ok_or(Error::NotFound)?;
        *slot = None;
        log::debug!("Unregistered flash device {}", device.name());
        Ok(())
    }

    /// Remove a previously registered partition table
    ///
    /// # Errors
    /// * `Fail` - the context is initialized
    /// * `Busy` - the context lock is held elsewhere
    /// * `NotFound` - this table is not registered
    pub fn unregister_partition_table(&self, table: &[Partition<'_>]) -> Result<()> {
        let mut state = self.lock()?;
        if self.is_initialized() {
            return Err(Error::Fail);
        }

        let slot = state
            .tables
            .iter_mut()
            .find(|slot| {
                slot.is_some_and(|registered| {
                    core::ptr::addr_eq(registered, table) && registered.len() == table.len()
                })
            })
            .ok_or(Error::NotFound)?;
        *slot = None;
        log::debug!("Unregistered partition table");
        Ok(())
    }

    /// Number of registered flash devices
    pub fn device_count(&self) -> Result<usize> {
        Ok(self.lock()?.devices.iter().flatten().count())
    }

    /// Number of registered partition tables
    pub fn table_count(&self) -> Result<usize> {
        Ok(self.lock()?.tables.iter().flatten().count())
    }

    /// Number of partitions across all registered tables
    pub fn partition_count(&self) -> Result<usize> {
        Ok(self
            .lock()?
            .tables
            .iter()
            .flatten()
            .map(|table| table.len())
            .sum())
    }
}
