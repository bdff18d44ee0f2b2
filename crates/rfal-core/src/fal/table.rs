//! Partition table dump

use super::Fal;
use crate::config::NAME_MAX;
use crate::error::Result;
use crate::lock::LockKind;

/// Truncate a name to at most `NAME_MAX` bytes on a char boundary
fn bounded(name: &str) -> &str {
    if name.len() <= NAME_MAX {
        return name;
    }
    let mut end = NAME_MAX;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

impl<'a, L: LockKind, const DEVICES: usize, const TABLES: usize, const CACHE: usize>
    Fal<'a, L, DEVICES, TABLES, CACHE>
{
    /// Log every registered partition as an aligned table at info level
    ///
    /// Partitions that are not resolved to a device are marked with `*`.
    pub fn show_partition_table(&self) -> Result<()> {
        let state = self.lock()?;
        let partitions = || state.tables.into_iter().flatten().flat_map(|table| table.iter());

        if partitions().next().is_none() {
            return Ok(());
        }

        let name_width = partitions()
            .map(|p| bounded(p.name).len())
            .chain(core::iter::once("name".len()))
            .max()
            .unwrap_or(0);
        let flash_width = partitions()
            .map(|p| bounded(p.flash_name).len())
            .chain(core::iter::once("flash_dev".len()))
            .max()
            .unwrap_or(0);

        log::info!("==================== FAL partition table ====================");
        log::info!(
            "| {:<name_width$} | {:<flash_width$} |   offset   |   length   |",
            "name",
            "flash_dev"
        );
        log::info!("-------------------------------------------------------------");
        for partition in partitions() {
            let marker = if state.cached_device(partition).is_some() {
                ' '
            } else {
                '*'
            };
            log::info!(
                "|{}{:<name_width$} | {:<flash_width$} | 0x{:08X} | 0x{:08X} |",
                marker,
                bounded(partition.name),
                bounded(partition.flash_name),
                partition.offset,
                partition.len
            );
        }
        log::info!("=============================================================");
        Ok(())
    }
}
