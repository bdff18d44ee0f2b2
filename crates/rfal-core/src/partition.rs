//! Partition types
//!
//! Partitions are plain descriptors owned by the caller, typically laid out
//! in a `static` table. The context only borrows them.

/// A named sub-range of a flash device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition<'a> {
    /// Partition name
    pub name: &'a str,
    /// Name of the flash device holding this partition
    pub flash_name: &'a str,
    /// Offset of the partition from the start of the device
    pub offset: u32,
    /// Partition length in bytes
    pub len: u32,
}

impl<'a> Partition<'a> {
    /// Create a new partition descriptor
    pub const fn new(name: &'a str, flash_name: &'a str, offset: u32, len: u32) -> Self {
        Self {
            name,
            flash_name,
            offset,
            len,
        }
    }

    /// Device offset one past the last byte of the partition
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.len as u64
    }

    /// Check if `size` bytes at partition-relative `offset` fit in the partition
    pub fn contains(&self, offset: u32, size: u32) -> bool {
        offset as u64 + size as u64 <= self.len as u64
    }
}
