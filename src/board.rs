//! Mock flash devices built from a layout file

use rfal_core::layout::Layout;
use rfal_mock::{ImageError, MockConfig, MockFlash};
use std::path::{Path, PathBuf};

/// The flash devices of a board, one mock per layout entry
pub struct Board {
    flashes: Vec<MockFlash>,
}

impl Board {
    /// Create the devices declared by `layout`
    ///
    /// With an image directory, each device is loaded from
    /// `<dir>/<name>.bin` when that file exists and starts erased otherwise.
    pub fn from_layout(layout: &Layout, image_dir: Option<&Path>) -> Result<Self, ImageError> {
        let mut flashes = Vec::with_capacity(layout.flashes.len());

        for spec in &layout.flashes {
            let flash = MockFlash::new(MockConfig::from_geometry(&spec.name, spec.geometry));
            if let Some(dir) = image_dir {
                let path = image_path(dir, &spec.name);
                if path.exists() {
                    flash.load_image(&path)?;
                    log::info!("Loaded {} from {}", spec.name, path.display());
                } else {
                    log::debug!("No image for {} at {}, starting erased", spec.name, path.display());
                }
            }
            flashes.push(flash);
        }

        Ok(Self { flashes })
    }

    /// The devices, in layout order
    pub fn flashes(&self) -> &[MockFlash] {
        &self.flashes
    }

    /// Save every device to `<dir>/<name>.bin`
    pub fn save_images(&self, dir: &Path) -> Result<(), ImageError> {
        std::fs::create_dir_all(dir)?;
        for flash in &self.flashes {
            let path = image_path(dir, &flash.config().name);
            flash.save_image(&path)?;
            log::info!("Saved {} to {}", flash.config().name, path.display());
        }
        Ok(())
    }
}

fn image_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.bin", name))
}
