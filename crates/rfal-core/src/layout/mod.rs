//! Flash layout files
//!
//! A layout describes the flash devices of a board and the partitions laid
//! out on them. Layouts are loaded from TOML (see [`Layout::from_toml_str`])
//! and turn into partition tables borrowing from the layout:
//!
//! ```ignore
//! let layout = Layout::from_toml_file("board.toml")?;
//! layout.validate()?;
//! let table = layout.partition_table();
//! fal.register_partition_table(&table)?;
//! ```

mod toml;

pub use self::toml::{format_size, parse_size};

use crate::device::{names_match, FlashGeometry};
use crate::partition::Partition;
use std::string::String;
use std::vec::Vec;

/// A flash device entry of a layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashSpec {
    /// Device name
    pub name: String,
    /// Device geometry
    pub geometry: FlashGeometry,
}

/// A partition entry of a layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    /// Partition name
    pub name: String,
    /// Name of the flash device holding the partition
    pub flash: String,
    /// Offset from the start of the device
    pub offset: u32,
    /// Length in bytes
    pub len: u32,
}

impl PartitionSpec {
    /// Borrow this entry as a partition descriptor
    pub fn as_partition(&self) -> Partition<'_> {
        Partition::new(&self.name, &self.flash, self.offset, self.len)
    }
}

/// Flash devices and partitions of a board
#[derive(Debug, Clone, Default)]
pub struct Layout {
    /// Optional name for this layout
    pub name: Option<String>,
    /// Flash devices, in declaration order
    pub flashes: Vec<FlashSpec>,
    /// Partitions, in declaration order
    pub partitions: Vec<PartitionSpec>,
}

impl Layout {
    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a flash device entry by name
    pub fn find_flash(&self, name: &str) -> Option<&FlashSpec> {
        self.flashes.iter().find(|f| names_match(&f.name, name))
    }

    /// Find a partition entry by name
    pub fn find_partition(&self, name: &str) -> Option<&PartitionSpec> {
        self.partitions.iter().find(|p| names_match(&p.name, name))
    }

    /// Partition table borrowing names from this layout
    pub fn partition_table(&self) -> Vec<Partition<'_>> {
        self.partitions.iter().map(PartitionSpec::as_partition).collect()
    }

    /// Check the layout for mistakes the registry would not reject
    ///
    /// The registry resolves names with first-match semantics and silently
    /// skips partitions on unknown devices, so duplicates and dangling
    /// device references are caught here instead.
    pub fn validate(&self) -> Result<(), LayoutError> {
        for (i, f1) in self.flashes.iter().enumerate() {
            if self.flashes[i + 1..].iter().any(|f2| names_match(&f1.name, &f2.name)) {
                return Err(LayoutError::DuplicateFlashName(f1.name.clone()));
            }
        }

        for (i, p1) in self.partitions.iter().enumerate() {
            if self.partitions[i + 1..]
                .iter()
                .any(|p2| names_match(&p1.name, &p2.name))
            {
                return Err(LayoutError::DuplicatePartitionName(p1.name.clone()));
            }

            let flash = self
                .find_flash(&p1.flash)
                .ok_or_else(|| LayoutError::UnknownFlash(p1.name.clone(), p1.flash.clone()))?;
            if p1.offset as u64 + p1.len as u64 > flash.geometry.len as u64 {
                return Err(LayoutError::PartitionOutOfBounds(p1.name.clone()));
            }
        }

        Ok(())
    }
}

/// Errors that can occur when working with layouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Two flash devices share a name
    DuplicateFlashName(String),
    /// Two partitions share a name
    DuplicatePartitionName(String),
    /// Partition refers to a flash device the layout does not declare
    UnknownFlash(String, String),
    /// Partition extends beyond its flash device
    PartitionOutOfBounds(String),
    /// Failed to parse layout file
    ParseError(String),
    /// I/O error
    IoError,
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DuplicateFlashName(name) => write!(f, "duplicate flash device name '{}'", name),
            Self::DuplicatePartitionName(name) => write!(f, "duplicate partition name '{}'", name),
            Self::UnknownFlash(part, flash) => {
                write!(f, "partition '{}' refers to unknown flash device '{}'", part, flash)
            }
            Self::PartitionOutOfBounds(name) => {
                write!(f, "partition '{}' extends beyond its flash device", name)
            }
            Self::ParseError(msg) => write!(f, "failed to parse layout: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for LayoutError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;
    use std::vec;

    fn layout() -> Layout {
        Layout {
            name: None,
            flashes: vec![FlashSpec {
                name: "nor".to_string(),
                geometry: FlashGeometry {
                    len: 0x10000,
                    sector_size: 0x1000,
                    ..Default::default()
                },
            }],
            partitions: vec![
                PartitionSpec {
                    name: "bl".to_string(),
                    flash: "nor".to_string(),
                    offset: 0,
                    len: 0x1000,
                },
                PartitionSpec {
                    name: "app".to_string(),
                    flash: "nor".to_string(),
                    offset: 0x1000,
                    len: 0xF000,
                },
            ],
        }
    }

    #[test]
    fn test_validate_ok() {
        assert_eq!(layout().validate(), Ok(()));
    }

    #[test]
    fn test_validate_duplicate_partition() {
        let mut layout = layout();
        layout.partitions[1].name = "bl".to_string();
        assert_eq!(
            layout.validate(),
            Err(LayoutError::DuplicatePartitionName("bl".to_string()))
        );
    }

    #[test]
    fn test_validate_unknown_flash() {
        let mut layout = layout();
        layout.partitions[0].flash = "spi".to_string();
        assert!(matches!(layout.validate(), Err(LayoutError::UnknownFlash(..))));
    }

    #[test]
    fn test_validate_out_of_bounds() {
        let mut layout = layout();
        layout.partitions[1].len = 0xF001;
        assert_eq!(
            layout.validate(),
            Err(LayoutError::PartitionOutOfBounds("app".to_string()))
        );
    }

    #[test]
    fn test_partition_table_borrows_layout() {
        let layout = layout();
        let table = layout.partition_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table[1], Partition::new("app", "nor", 0x1000, 0xF000));
    }
}
