//! Default image-decode service backed by the `image` crate
//!
//! Treats locators as filesystem paths. Format is detected from the file
//! contents (falling back to the extension), so `frame.0001` without an
//! extension still decodes if the bytes are PNG/JPEG/etc.

use std::path::Path;

use image::{ImageReader, RgbaImage};
use log::debug;

use super::frame::{FrameError, Locator};
use super::traits::FrameDecoder;

/// Image file decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileDecoder;

impl ImageFileDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode image file into 8-bit RGBA
    pub fn load(path: &Path) -> Result<RgbaImage, FrameError> {
        debug!("Loading image: {}", path.display());

        let reader = ImageReader::open(path)
            .map_err(|e| FrameError::Decode(format!("{}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(|e| FrameError::Decode(format!("{}: {}", path.display(), e)))?;

        let img = reader
            .decode()
            .map_err(|e| FrameError::Decode(format!("{}: {}", path.display(), e)))?;

        Ok(img.to_rgba8())
    }
}

impl FrameDecoder for ImageFileDecoder {
    fn decode(&self, locator: &Locator) -> Result<RgbaImage, FrameError> {
        Self::load(Path::new(locator.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_decode_png_roundtrip() {
        let dir = std::env::temp_dir().join(format!("flipbook_loader_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.0001.png");

        RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let img = ImageFileDecoder::new()
            .decode(&Locator::new(path.to_string_lossy()))
            .unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1), &Rgba([10, 20, 30, 255]));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = ImageFileDecoder::new()
            .decode(&Locator::new("/definitely/not/here/frame.0001.png"))
            .unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }

    #[test]
    fn test_garbage_bytes_is_decode_error() {
        let dir = std::env::temp_dir().join(format!("flipbook_loader_bad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = ImageFileDecoder::load(&path).unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
