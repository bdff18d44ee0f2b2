//! Error types for flash image files

use std::io;
use thiserror::Error;

/// Errors loading or saving a flash image
#[derive(Debug, Error)]
pub enum ImageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Image does not fit in the flash
    #[error("image of {size} bytes does not fit in {capacity} bytes of flash")]
    TooLarge { size: usize, capacity: u32 },
}
