//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a number as decimal, hex (0x...) or a size with a KiB/MiB suffix
fn parse_number(s: &str) -> Result<u32, String> {
    rfal_core::layout::parse_size(s)
}

#[derive(Parser)]
#[command(name = "rfal")]
#[command(author, version, about = "Flash partition tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Layout file describing flash devices and partitions (TOML format)
    #[arg(short, long)]
    pub layout: PathBuf,

    /// Directory holding flash images (<flash name>.bin)
    /// Images are loaded before and saved after modifying commands.
    /// Without it, every run starts from erased flash.
    #[arg(short = 'd', long, global = true)]
    pub image_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show flash devices and the partition table
    Show,

    /// Read partition contents to file
    Read {
        /// Partition name
        partition: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Offset within the partition
        #[arg(long, value_parser = parse_number, default_value = "0")]
        offset: u32,

        /// Number of bytes to read (default: up to the partition end)
        #[arg(long, value_parser = parse_number)]
        length: Option<u32>,
    },

    /// Write file contents to a partition
    Write {
        /// Partition name
        partition: String,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Offset within the partition
        #[arg(long, value_parser = parse_number, default_value = "0")]
        offset: u32,

        /// Do not erase the covered sectors before writing
        #[arg(long)]
        no_erase: bool,

        /// Read back and compare after writing
        #[arg(long)]
        verify: bool,
    },

    /// Erase a partition or a range of it
    Erase {
        /// Partition name
        partition: String,

        /// Offset within the partition
        #[arg(long, value_parser = parse_number, default_value = "0")]
        offset: u32,

        /// Number of bytes to erase (default: up to the partition end)
        #[arg(long, value_parser = parse_number)]
        length: Option<u32>,
    },
}

impl Commands {
    /// Whether the command changes flash contents
    pub fn modifies_flash(&self) -> bool {
        matches!(self, Commands::Write { .. } | Commands::Erase { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_write() {
        let cli = Cli::parse_from([
            "rfal", "--layout", "board.toml", "write", "app", "-i", "app.bin", "--offset", "4KiB",
            "--no-erase",
        ]);
        match cli.command {
            Commands::Write {
                partition,
                offset,
                no_erase,
                verify,
                ..
            } => {
                assert_eq!(partition, "app");
                assert_eq!(offset, 4096);
                assert!(no_erase);
                assert!(!verify);
            }
            _ => panic!("expected write command"),
        }
        assert!(Commands::Erase {
            partition: String::new(),
            offset: 0,
            length: None
        }
        .modifies_flash());
    }
}
