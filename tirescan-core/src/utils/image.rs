//! Utility functions for loading and converting images.
//!
//! Uploaded files arrive as raw bytes, dataset samples as paths. Both end up as
//! 8-bit RGB images: alpha channels are dropped and grayscale images are expanded,
//! matching how the model was trained.

use crate::core::{ClassifierError, ProcessingStage};
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// Converts a DynamicImage to an RgbImage.
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Decodes an encoded image (PNG, JPEG, ...) from memory.
///
/// # Errors
///
/// Returns `ClassifierError::ImageDecode` when the bytes are not a supported image.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ClassifierError> {
    let img = image::load_from_memory(bytes).map_err(ClassifierError::ImageDecode)?;
    Ok(dynamic_to_rgb(img))
}

/// Loads an image from a file path and converts it to RgbImage.
///
/// # Errors
///
/// Returns `ClassifierError::ImageDecode` if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> Result<RgbImage, ClassifierError> {
    let img = image::open(path).map_err(ClassifierError::ImageDecode)?;
    Ok(dynamic_to_rgb(img))
}

/// Returns true when the path has one of the recognized image extensions.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            crate::core::IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Encodes an RGB image as PNG bytes.
///
/// Tests use it to build real uploads.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, ClassifierError> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).map_err(|e| {
        ClassifierError::processing_error(ProcessingStage::Rendering, "encode png", e)
    })?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_decode_roundtrip_png() {
        let img = RgbImage::from_pixel(8, 4, Rgb([10, 20, 30]));
        let bytes = encode_png(&img).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(3, 2), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ClassifierError::ImageDecode(_)));
        assert!(err.to_string().starts_with("cannot identify image file"));
    }

    #[test]
    fn test_grayscale_expands_to_rgb() {
        let gray = image::GrayImage::from_pixel(2, 2, image::Luma([77]));
        let mut buf = std::io::Cursor::new(Vec::new());
        gray.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        let decoded = decode_image(buf.get_ref()).unwrap();
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([77, 77, 77]));
    }

    #[test]
    fn test_image_extension_matching() {
        assert!(has_image_extension(Path::new("a/b/tire.JPG")));
        assert!(has_image_extension(Path::new("tire.png")));
        assert!(!has_image_extension(Path::new("notes.txt")));
        assert!(!has_image_extension(Path::new("README")));
    }
}
