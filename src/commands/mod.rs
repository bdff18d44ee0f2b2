//! CLI command implementations
//!
//! Every command goes through the partition dispatcher: the flash devices
//! are never accessed directly, so offsets and bounds are checked the same
//! way firmware using `rfal-core` would see them.

mod partition;
mod show;

pub use partition::{run_erase, run_read, run_write};
pub use show::run_show;

use indicatif::{ProgressBar, ProgressStyle};
use rfal_core::{Fal, MutexLock, Partition};

/// Context type used by the tool
pub type Context<'a> = Fal<'a, MutexLock>;

/// Look up a partition, with a readable error
fn find_partition<'a>(
    fal: &Context<'a>,
    name: &str,
) -> Result<&'a Partition<'a>, Box<dyn std::error::Error>> {
    fal.find_partition(name)
        .map_err(|_| format!("Partition '{}' not found in layout", name).into())
}

/// Resolve the `[offset, offset + length)` range within a partition
///
/// A missing length means "up to the partition end".
fn partition_range(
    partition: &Partition<'_>,
    offset: u32,
    length: Option<u32>,
) -> Result<u32, Box<dyn std::error::Error>> {
    if offset >= partition.len {
        return Err(format!(
            "Offset 0x{:X} is beyond the end of partition '{}' (0x{:X} bytes)",
            offset, partition.name, partition.len
        )
        .into());
    }
    let length = length.unwrap_or(partition.len - offset);
    if length == 0 || !partition.contains(offset, length) {
        return Err(format!(
            "Range 0x{:X}+0x{:X} does not fit in partition '{}' (0x{:X} bytes)",
            offset, length, partition.name, partition.len
        )
        .into());
    }
    Ok(length)
}

/// Create a progress bar with custom phase message
fn create_progress_bar(total: u64, phase: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_range() {
        let part = Partition::new("app", "nor", 0x1000, 0x2000);
        assert_eq!(partition_range(&part, 0, None).unwrap(), 0x2000);
        assert_eq!(partition_range(&part, 0x1800, None).unwrap(), 0x800);
        assert_eq!(partition_range(&part, 0x100, Some(0x10)).unwrap(), 0x10);
        assert!(partition_range(&part, 0x2000, None).is_err());
        assert!(partition_range(&part, 0x1000, Some(0x1001)).is_err());
        assert!(partition_range(&part, 0, Some(0)).is_err());
    }
}
