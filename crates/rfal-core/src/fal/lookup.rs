//! Name and handle based lookups

use super::Fal;
use crate::device::{names_match, FlashDevice};
use crate::error::{Error, Result};
use crate::lock::LockKind;
use crate::partition::Partition;

impl<'a, L: LockKind, const DEVICES: usize, const TABLES: usize, const CACHE: usize>
    Fal<'a, L, DEVICES, TABLES, CACHE>
{
    /// Find a registered flash device by name
    ///
    /// Names are compared over their first [`NAME_MAX`](crate::config::NAME_MAX)
    /// bytes; the first registered match wins.
    pub fn find_flash_device(&self, name: &str) -> Result<&'a dyn FlashDevice> {
        self.lock()?.device_by_name(name).ok_or(Error::NotFound)
    }

    /// Find a partition by name
    ///
    /// Tables are searched in registration order, partitions in array
    /// order; the first match wins.
    pub fn find_partition(&self, name: &str) -> Result<&'a Partition<'a>> {
        let state = self.lock()?;
        let found = state
            .tables
            .into_iter()
            .flatten()
            .flat_map(|table| table.iter())
            .find(|partition| names_match(partition.name, name));
        found.ok_or(Error::NotFound)
    }

    /// Find the flash device a partition handle was resolved to
    ///
    /// This goes by handle identity, not by name: the partition must be a
    /// reference into a registered table, and the cache must have been built
    /// since that table was registered.
    pub fn find_device_for_partition(&self, partition: &Partition<'_>) -> Result<&'a dyn FlashDevice> {
        self.lock()?
            .cached_device(partition)
            .ok_or(Error::NotFound)
    }

    /// Visit every registered partition in lookup order
    ///
    /// The context lock is held during the walk, so `f` must not call back
    /// into the context (it would get [`Error::Busy`]).
    pub fn for_each_partition(&self, mut f: impl FnMut(&'a Partition<'a>)) -> Result<()> {
        let state = self.lock()?;
        state
            .tables
            .into_iter()
            .flatten()
            .flat_map(|table| table.iter())
            .for_each(&mut f);
        Ok(())
    }

    /// All registered partitions, in lookup order
    #[cfg(feature = "alloc")]
    pub fn partitions(&self) -> Result<alloc::vec::Vec<&'a Partition<'a>>> {
        let state = self.lock()?;
        Ok(state
            .tables
            .into_iter()
            .flatten()
            .flat_map(|table| table.iter())
            .collect())
    }

    /// All registered flash devices, in slot order
    #[cfg(feature = "alloc")]
    pub fn flash_devices(&self) -> Result<alloc::vec::Vec<&'a dyn FlashDevice>> {
        let state = self.lock()?;
        Ok(state.devices.iter().flatten().copied().collect())
    }
}
