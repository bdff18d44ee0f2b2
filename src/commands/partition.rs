//! Read, write and erase partition contents

use super::{create_progress_bar, find_partition, partition_range, Context};
use rfal_core::Partition;
use std::fs;
use std::path::Path;

/// Chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: u32 = 4096;

/// Chunk size for writing when the device reports no page size
const DEFAULT_PAGE_SIZE: u32 = 256;

/// Run the read command
pub fn run_read(
    fal: &Context<'_>,
    name: &str,
    output: &Path,
    offset: u32,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let partition = find_partition(fal, name)?;
    let length = partition_range(partition, offset, length)?;

    println!(
        "Reading {} bytes from partition '{}' at offset 0x{:X}",
        length, partition.name, offset
    );

    let mut data = vec![0u8; length as usize];
    let pb = create_progress_bar(length as u64, "Reading")?;
    for (i, chunk) in data.chunks_mut(READ_CHUNK_SIZE as usize).enumerate() {
        let chunk_offset = offset + i as u32 * READ_CHUNK_SIZE;
        fal.read(partition, chunk_offset, chunk)?;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Read complete");

    fs::write(output, &data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

/// Run the write command
pub fn run_write(
    fal: &Context<'_>,
    name: &str,
    input: &Path,
    offset: u32,
    erase: bool,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let partition = find_partition(fal, name)?;
    let data = fs::read(input)?;
    let length = u32::try_from(data.len()).map_err(|_| "Input file too large")?;
    if length == 0 {
        return Err(format!("Input file {:?} is empty", input).into());
    }
    partition_range(partition, offset, Some(length))?;

    let geometry = fal.find_device_for_partition(partition)?.geometry();

    println!(
        "Writing {} bytes to partition '{}' at offset 0x{:X}",
        length, partition.name, offset
    );

    if erase {
        let (erase_offset, erase_len) =
            sector_span(partition, geometry.sector_size, offset, length);
        erase_range(fal, partition, geometry.sector_size, erase_offset, erase_len)?;
    }

    let page_size = match geometry.page_size {
        0 => DEFAULT_PAGE_SIZE,
        n => n,
    };
    let pb = create_progress_bar(length as u64, "Writing")?;
    for (i, chunk) in data.chunks(page_size as usize).enumerate() {
        fal.write(partition, offset + i as u32 * page_size, chunk)?;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Write complete");

    if verify {
        let mut readback = vec![0u8; data.len()];
        fal.read(partition, offset, &mut readback)?;
        if let Some(pos) = data.iter().zip(&readback).position(|(a, b)| a != b) {
            return Err(format!(
                "Verification failed at partition offset 0x{:X}: expected 0x{:02X}, got 0x{:02X}",
                offset as usize + pos,
                data[pos],
                readback[pos]
            )
            .into());
        }
        println!("Verification passed");
    }

    Ok(())
}

/// Run the erase command
pub fn run_erase(
    fal: &Context<'_>,
    name: &str,
    offset: u32,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let partition = find_partition(fal, name)?;
    let length = partition_range(partition, offset, length)?;
    let geometry = fal.find_device_for_partition(partition)?.geometry();

    println!(
        "Erasing {} bytes of partition '{}' at offset 0x{:X}",
        length, partition.name, offset
    );
    erase_range(fal, partition, geometry.sector_size, offset, length)
}

/// Erase a partition-relative range, one device sector per call
fn erase_range(
    fal: &Context<'_>,
    partition: &Partition<'_>,
    sector_size: u32,
    offset: u32,
    length: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = create_progress_bar(length as u64, "Erasing")?;
    let end = offset as u64 + length as u64;
    let mut pos = offset as u64;

    while pos < end {
        let chunk_end = match sector_size {
            0 => end,
            size => {
                let addr = partition.offset as u64 + pos;
                let next_sector = (addr / size as u64 + 1) * size as u64;
                (next_sector - partition.offset as u64).min(end)
            }
        };
        fal.erase(partition, pos as u32, (chunk_end - pos) as u32)?;
        pb.inc(chunk_end - pos);
        pos = chunk_end;
    }

    pb.finish_with_message("Erase complete");
    Ok(())
}

/// Widen a partition-relative range to the device sectors it touches
///
/// The result is clamped to the partition, so a partition that does not
/// start or end on a sector boundary never erases its neighbours.
fn sector_span(partition: &Partition<'_>, sector_size: u32, offset: u32, length: u32) -> (u32, u32) {
    if sector_size == 0 {
        return (offset, length);
    }
    let size = sector_size as u64;
    let start = partition.offset as u64 + offset as u64;
    let end = start + length as u64;

    let aligned_start = (start / size * size).max(partition.offset as u64);
    let aligned_end = end.div_ceil(size).saturating_mul(size).min(partition.end());

    (
        (aligned_start - partition.offset as u64) as u32,
        (aligned_end - aligned_start) as u32,
    )
}
