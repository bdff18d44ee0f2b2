//! rfal - Flash partition tool
//!
//! Drives the flash abstraction layer against in-memory flash devices
//! described by a layout file. Device contents can be persisted as image
//! files between runs.
//!
//! # Example
//!
//! ```text
//! rfal --layout board.toml --image-dir images show
//! rfal --layout board.toml --image-dir images write app -i app.bin
//! rfal --layout board.toml --image-dir images read app -o dump.bin --length 4KiB
//! ```

mod board;
mod cli;
mod commands;

use board::Board;
use clap::Parser;
use cli::{Cli, Commands};
use commands::Context;
use rfal_core::layout::Layout;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let layout = Layout::from_toml_file(&cli.layout)
        .map_err(|e| format!("Failed to load layout {:?}: {}", cli.layout, e))?;
    layout.validate()?;
    if let Some(name) = &layout.name {
        log::info!("Using layout '{}'", name);
    }

    let board = Board::from_layout(&layout, cli.image_dir.as_deref())?;
    let table = layout.partition_table();

    let fal = Context::new();
    for flash in board.flashes() {
        fal.register_flash_device(flash)?;
    }
    if table.is_empty() {
        log::warn!("Layout declares no partitions");
    } else {
        fal.register_partition_table(&table)?;
    }
    fal.init()?;

    run_and_deinit(&fal, &cli.command)?;

    if cli.command.modifies_flash() {
        match &cli.image_dir {
            Some(dir) => board.save_images(dir)?,
            None => log::warn!("No --image-dir given, changes are discarded"),
        }
    }

    Ok(())
}

/// Run a command on an initialized context, then deinitialize it
///
/// A command failure takes precedence over a deinit failure, which is then
/// only logged.
fn run_and_deinit(fal: &Context<'_>, command: &Commands) -> Result<(), Box<dyn std::error::Error>> {
    let result = run_command(fal, command);
    let deinit = fal.deinit();
    if let (Err(_), Err(e)) = (&result, &deinit) {
        log::error!("Failed to shut down flash devices: {}", e);
    }
    result?;
    deinit?;
    Ok(())
}

fn run_command(fal: &Context<'_>, command: &Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Show => commands::run_show(fal),
        Commands::Read {
            partition,
            output,
            offset,
            length,
        } => commands::run_read(fal, partition, output, *offset, *length),
        Commands::Write {
            partition,
            input,
            offset,
            no_erase,
            verify,
        } => commands::run_write(fal, partition, input, *offset, !no_erase, *verify),
        Commands::Erase {
            partition,
            offset,
            length,
        } => commands::run_erase(fal, partition, *offset, *length),
    }
}
