//! Partition to device resolution cache

use super::{CacheEntry, Fal, State};
use crate::device::{names_match, FlashDevice};
use crate::error::{Error, Result};
use crate::lock::LockKind;
use crate::partition::Partition;

impl<'a, const DEVICES: usize, const TABLES: usize, const CACHE: usize>
    State<'a, DEVICES, TABLES, CACHE>
{
    /// First registered device whose name matches
    pub(crate) fn device_by_name(&self, name: &str) -> Option<&'a dyn FlashDevice> {
        self.devices
            .iter()
            .flatten()
            .copied()
            .find(|device| names_match(device.name(), name))
    }

    /// Device a partition handle was resolved to, by handle identity
    pub(crate) fn cached_device(&self, partition: &Partition<'_>) -> Option<&'a dyn FlashDevice> {
        self.cache
            .iter()
            .find(|entry| core::ptr::addr_eq(entry.partition, partition))
            .map(|entry| entry.device)
    }

    /// Rebuild the cache from the registered tables
    ///
    /// Tables are visited in slot order and partitions in array order.
    /// Partitions naming an unknown device are skipped, as are partitions
    /// that no longer fit in the cache. A partition starting beyond its
    /// device aborts the rebuild with `Fail`, leaving the cache partially
    /// filled.
    pub(crate) fn rebuild(&mut self) -> Result<()> {
        self.cache.clear();

        for table in self.tables.into_iter().flatten() {
            for partition in table {
                let Some(device) = self.device_by_name(partition.flash_name) else {
                    log::debug!(
                        "Flash device {} of partition {} not found, skipping",
                        partition.flash_name,
                        partition.name
                    );
                    continue;
                };

                let geometry = device.geometry();
                if partition.offset >= geometry.len {
                    log::error!(
                        "Partition {} offset 0x{:08X} out of flash {} bound (< 0x{:08X})",
                        partition.name,
                        partition.offset,
                        device.name(),
                        geometry.len
                    );
                    return Err(Error::Fail);
                }
                if partition.end() > geometry.len as u64 {
                    log::warn!(
                        "Partition {} ends at 0x{:X}, past the end of flash {} (0x{:08X})",
                        partition.name,
                        partition.end(),
                        device.name(),
                        geometry.len
                    );
                }
                if !geometry.is_sector_aligned(partition.offset)
                    || !geometry.is_sector_aligned(partition.len)
                {
                    log::warn!(
                        "Partition {} is not aligned to the {} byte sectors of {}, erasing it may fail",
                        partition.name,
                        geometry.sector_size,
                        device.name()
                    );
                }

                if self.cache.push(CacheEntry { partition, device }).is_err() {
                    log::warn!(
                        "Resolution cache full ({} entries), partition {} is unusable",
                        CACHE,
                        partition.name
                    );
                }
            }
        }

        Ok(())
    }
}

impl<'a, L: LockKind, const DEVICES: usize, const TABLES: usize, const CACHE: usize>
    Fal<'a, L, DEVICES, TABLES, CACHE>
{
    /// Rebuild the resolution cache
    ///
    /// `init()` does this already; call it again only to pick up a device
    /// whose partitions could not be resolved before.
    ///
    /// # Errors
    /// * `Fail` - a partition starts beyond the end of its device
    /// * `Busy` - the context lock is held elsewhere
    pub fn rebuild_cache(&self) -> Result<()> {
        self.lock()?.rebuild()
    }

    /// Number of partitions currently resolved
    pub fn cached_count(&self) -> Result<usize> {
        Ok(self.lock()?.cache.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::fal::Fal;
    use crate::lock::FlagLock;
    use crate::partition::Partition;
    use crate::testing::RamFlash;

    static TABLE: [Partition<'static>; 3] = [
        Partition::new("bl", "ram", 0, 0x1000),
        Partition::new("orphan", "spi", 0, 0x1000),
        Partition::new("app", "ram", 0x1000, 0x3000),
    ];

    static OUT_OF_BOUNDS: [Partition<'static>; 2] = [
        Partition::new("ok", "ram", 0, 0x1000),
        Partition::new("beyond", "ram", 0x4000, 0x1000),
    ];

    #[test]
    fn test_resolves_known_devices() {
        let flash = RamFlash::new("ram", 0x4000);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&flash).unwrap();
        fal.register_partition_table(&TABLE).unwrap();
        fal.init().unwrap();

        assert_eq!(fal.cached_count(), Ok(2));
        let device = fal.find_device_for_partition(&TABLE[2]).unwrap();
        assert_eq!(device.name(), "ram");
        assert_eq!(
            fal.find_device_for_partition(&TABLE[1]).err(),
            Some(Error::NotFound)
        );
    }

    #[test]
    fn test_offset_beyond_device_is_fatal() {
        let flash = RamFlash::new("ram", 0x4000);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&flash).unwrap();
        fal.register_partition_table(&OUT_OF_BOUNDS).unwrap();

        assert_eq!(fal.init(), Err(Error::Fail));
        assert!(!fal.is_initialized());
        // entries before the offending partition stay cached
        assert_eq!(fal.cached_count(), Ok(1));
    }

    #[test]
    fn test_cache_overflow_is_tolerated() {
        let flash = RamFlash::new("ram", 0x4000);
        let fal: Fal<'_, FlagLock, 4, 4, 1> = Fal::new();
        fal.register_flash_device(&flash).unwrap();
        fal.register_partition_table(&TABLE).unwrap();

        assert_eq!(fal.init(), Ok(()));
        assert_eq!(fal.cached_count(), Ok(1));
        assert!(fal.find_device_for_partition(&TABLE[0]).is_ok());
        assert_eq!(
            fal.find_device_for_partition(&TABLE[2]).err(),
            Some(Error::NotFound)
        );
    }

    #[test]
    fn test_rebuild_picks_up_late_device() {
        let ram = RamFlash::new("ram", 0x4000);
        let spi = RamFlash::new("spi", 0x4000);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&ram).unwrap();
        fal.register_partition_table(&TABLE).unwrap();
        fal.rebuild_cache().unwrap();
        assert_eq!(fal.cached_count(), Ok(2));

        fal.register_flash_device(&spi).unwrap();
        assert_eq!(fal.cached_count(), Ok(2));
        fal.rebuild_cache().unwrap();
        assert_eq!(fal.cached_count(), Ok(3));
        assert_eq!(
            fal.find_device_for_partition(&TABLE[1]).unwrap().name(),
            "spi"
        );
    }

    #[test]
    fn test_first_device_with_matching_name_wins() {
        let first = RamFlash::new("ram", 0x4000);
        let second = RamFlash::new("ram", 0x8000);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&first).unwrap();
        fal.register_flash_device(&second).unwrap();
        fal.register_partition_table(&TABLE).unwrap();
        fal.init().unwrap();

        let device = fal.find_device_for_partition(&TABLE[0]).unwrap();
        assert_eq!(device.geometry().len, 0x4000);
    }
}
