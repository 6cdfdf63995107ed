/// Pixel decoding collaborator used by ResourceManager::create_texture

use std::path::Path;

use crate::error::{Error, Result};

/// Decoded 4-channel (RGBA8) pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelData {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 texels, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

impl PixelData {
    /// Byte count the pixel buffer must have for the given extent
    pub fn expected_len(width: u32, height: u32) -> Option<usize> {
        (width as usize).checked_mul(height as usize)?.checked_mul(4)
    }
}

/// Decodes an image file into RGBA8 pixels
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<PixelData>;
}

/// Default loader backed by the `image` crate (PNG and JPEG)
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateLoader;

impl ImageLoader for ImageCrateLoader {
    fn load(&self, path: &Path) -> Result<PixelData> {
        let decoded = image::open(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(PixelData {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

#[cfg(test)]
#[path = "texture_loader_tests.rs"]
mod tests;
