/// Unit tests for texture_loader.rs

use crate::error::Error;
use crate::resource::{ImageCrateLoader, ImageLoader, PixelData};

#[test]
fn test_load_png_as_rgba8() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checker.png");
    let mut img = image::RgbImage::new(2, 3);
    img.put_pixel(1, 2, image::Rgb([10, 20, 30]));
    img.save(&path).unwrap();

    let pixels = ImageCrateLoader.load(&path).unwrap();
    assert_eq!(pixels.width, 2);
    assert_eq!(pixels.height, 3);
    assert_eq!(pixels.pixels.len(), 2 * 3 * 4);
    // RGB input gains an opaque alpha channel
    let last = &pixels.pixels[(2 * 2 + 1) * 4..];
    assert_eq!(last, &[10, 20, 30, 255]);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ImageCrateLoader.load(&dir.path().join("missing.png"));
    assert!(matches!(result, Err(Error::Io(message)) if message.contains("missing.png")));
}

#[test]
fn test_expected_len() {
    assert_eq!(PixelData::expected_len(4, 2), Some(32));
    assert_eq!(PixelData::expected_len(0, 2), Some(0));
}
