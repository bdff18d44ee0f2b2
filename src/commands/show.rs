//! Show flash devices and partitions

use super::Context;
use rfal_core::layout::format_size;

/// Run the show command
pub fn run_show(fal: &Context<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let devices = fal.flash_devices()?;
    println!("Flash devices: {}", devices.len());
    for device in &devices {
        let geometry = device.geometry();
        println!(
            "  {:<24} {:>8} at 0x{:08X}, {} sectors, {} byte pages",
            device.name(),
            format_size(geometry.len),
            geometry.base_addr,
            format_size(geometry.sector_size),
            geometry.page_size
        );
    }
    println!();

    println!("Partitions: {}", fal.partition_count()?);
    for partition in fal.partitions()? {
        let device = fal.find_device_for_partition(partition).ok();
        println!(
            "  {:<24} {:<24} 0x{:08X} - 0x{:08X} ({}){}",
            partition.name,
            partition.flash_name,
            partition.offset,
            partition.end().saturating_sub(1),
            format_size(partition.len),
            if device.is_some() { "" } else { " [unresolved]" }
        );
    }

    fal.show_partition_table()?;
    Ok(())
}
