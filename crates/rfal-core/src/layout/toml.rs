//! TOML layout file parsing
//!
//! Parses layout files in TOML format:
//!
//! ```toml
//! [layout]
//! name = "Mock board"
//!
//! [[flash]]
//! name = "mock_flash"
//! size = "8 MiB"
//! sector_size = "4 KiB"
//! page_size = 256
//!
//! [[partition]]
//! name = "bl"
//! flash = "mock_flash"
//! offset = 0
//! size = 64
//!
//! [[partition]]
//! name = "easyflash"
//! flash = "mock_flash"
//! offset = "10 KiB"
//! size = "20 KiB"
//! ```
//!
//! Numbers may be plain integers, hex strings (`"0x2800"`) or sizes with a
//! `KiB`/`MiB` suffix.

use std::fs;
use std::path::Path;
use std::string::{String, ToString};
use std::vec::Vec;
use std::format;

use super::{FlashSpec, Layout, LayoutError, PartitionSpec};
use crate::device::FlashGeometry;

/// TOML layout file structure
#[derive(Debug, serde::Deserialize)]
struct TomlLayoutFile {
    layout: Option<TomlLayoutMeta>,
    #[serde(default)]
    flash: Vec<TomlFlash>,
    #[serde(default)]
    partition: Vec<TomlPartition>,
}

/// Layout metadata
#[derive(Debug, serde::Deserialize)]
struct TomlLayoutMeta {
    name: Option<String>,
}

/// Flash device definition in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlFlash {
    name: String,
    #[serde(default, deserialize_with = "deserialize_size")]
    base_addr: u32,
    #[serde(deserialize_with = "deserialize_size")]
    size: u32,
    #[serde(deserialize_with = "deserialize_size")]
    sector_size: u32,
    #[serde(default = "default_page_size", deserialize_with = "deserialize_size")]
    page_size: u32,
    #[serde(default = "default_io_size", deserialize_with = "deserialize_size")]
    io_size: u32,
}

/// Partition definition in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlPartition {
    name: String,
    flash: String,
    #[serde(deserialize_with = "deserialize_size")]
    offset: u32,
    #[serde(deserialize_with = "deserialize_size")]
    size: u32,
}

fn default_page_size() -> u32 {
    256
}

fn default_io_size() -> u32 {
    1
}

/// Deserialize a u32 that can be an integer, hex (0x...) or a size string
fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrInt {
        Int(u32),
        Str(String),
    }

    match SizeOrInt::deserialize(deserializer)? {
        SizeOrInt::Int(n) => Ok(n),
        SizeOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a size string like "16 MiB", "0x1000" or "4096"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    // Try plain number first
    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    // Try hex
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
    }

    // Try with suffix
    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

/// Format a size as human-readable string
pub fn format_size(size: u32) -> String {
    if size >= 1024 * 1024 && size % (1024 * 1024) == 0 {
        format!("{} MiB", size / (1024 * 1024))
    } else if size >= 1024 && size % 1024 == 0 {
        format!("{} KiB", size / 1024)
    } else {
        format!("{}", size)
    }
}

impl Layout {
    /// Load a layout from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let content = fs::read_to_string(path).map_err(|_| LayoutError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parse a layout from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, LayoutError> {
        let file: TomlLayoutFile =
            toml::from_str(content).map_err(|e| LayoutError::ParseError(e.to_string()))?;

        let mut layout = Layout::new();
        layout.name = file.layout.and_then(|meta| meta.name);

        for flash in file.flash {
            layout.flashes.push(FlashSpec {
                name: flash.name,
                geometry: FlashGeometry {
                    base_addr: flash.base_addr,
                    len: flash.size,
                    sector_size: flash.sector_size,
                    page_size: flash.page_size,
                    io_size: flash.io_size,
                },
            });
        }

        for partition in file.partition {
            layout.partitions.push(PartitionSpec {
                name: partition.name,
                flash: partition.flash,
                offset: partition.offset,
                len: partition.size,
            });
        }

        Ok(layout)
    }

    /// Save layout to a TOML file
    pub fn to_toml_file(&self, path: impl AsRef<Path>) -> Result<(), LayoutError> {
        fs::write(path, self.to_toml_string()).map_err(|_| LayoutError::IoError)
    }

    /// Convert layout to TOML string
    pub fn to_toml_string(&self) -> String {
        let mut output = String::new();

        if let Some(name) = &self.name {
            output.push_str("[layout]\n");
            output.push_str(&format!("name = \"{}\"\n\n", name));
        }

        for flash in &self.flashes {
            let g = &flash.geometry;
            output.push_str("[[flash]]\n");
            output.push_str(&format!("name = \"{}\"\n", flash.name));
            output.push_str(&format!("base_addr = \"0x{:08X}\"\n", g.base_addr));
            output.push_str(&format!("size = \"{}\"\n", format_size(g.len)));
            output.push_str(&format!("sector_size = \"{}\"\n", format_size(g.sector_size)));
            output.push_str(&format!("page_size = {}\n", g.page_size));
            output.push_str(&format!("io_size = {}\n", g.io_size));
            output.push('\n');
        }

        for partition in &self.partitions {
            output.push_str("[[partition]]\n");
            output.push_str(&format!("name = \"{}\"\n", partition.name));
            output.push_str(&format!("flash = \"{}\"\n", partition.flash));
            output.push_str(&format!("offset = \"0x{:08X}\"\n", partition.offset));
            output.push_str(&format!("size = \"0x{:08X}\"\n", partition.len));
            output.push('\n');
        }

        output
    }
}
