//! Image preprocessing for the MobileNet backbone.
//!
//! Every image, whether uploaded to the service or read from the training set,
//! goes through the same steps: decode, resize to a square of `INPUT_SIZE`,
//! lay the pixels out as a batched f32 tensor and rescale them from `[0, 255]`
//! to `[0, 1]` by dividing by 255.

use crate::core::{
    ClassifierError, INPUT_CHANNELS, INPUT_SIZE, PIXEL_MAX, Tensor4D, TensorLayout,
    config::{ConfigError, ConfigValidator},
};
use crate::utils::decode_image;
use image::RgbImage;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

/// Resampling filter used when resizing to the model input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    /// Nearest neighbour, the behavior of the loader the model was trained with.
    #[default]
    Nearest,
    /// Bilinear interpolation.
    Bilinear,
    /// Bicubic interpolation.
    Bicubic,
    /// Lanczos with window 3.
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::Bicubic => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl std::str::FromStr for ResizeFilter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(ResizeFilter::Nearest),
            "bilinear" | "triangle" => Ok(ResizeFilter::Bilinear),
            "bicubic" => Ok(ResizeFilter::Bicubic),
            "lanczos3" | "lanczos" => Ok(ResizeFilter::Lanczos3),
            other => Err(ConfigError::InvalidConfig {
                message: format!("unknown resize filter '{other}'"),
            }),
        }
    }
}

/// Settings for [`ImagePreprocessor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Side length of the square model input.
    pub input_size: u32,
    /// Resampling filter used for the resize.
    pub resize_filter: ResizeFilter,
    /// Layout of the produced tensor.
    pub layout: TensorLayout,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self::get_defaults()
    }
}

impl ConfigValidator for PreprocessConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_input_size(self.input_size)
    }

    fn get_defaults() -> Self {
        Self {
            input_size: INPUT_SIZE,
            resize_filter: ResizeFilter::default(),
            layout: TensorLayout::default(),
        }
    }
}

/// Turns encoded images into normalized input tensors.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    input_size: u32,
    filter: FilterType,
    layout: TensorLayout,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::from_config(&PreprocessConfig::default())
    }
}

impl ImagePreprocessor {
    /// Creates a preprocessor from its configuration.
    pub fn from_config(config: &PreprocessConfig) -> Self {
        Self {
            input_size: config.input_size,
            filter: config.resize_filter.into(),
            layout: config.layout,
        }
    }

    /// Side length of the produced images.
    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Layout of the produced tensors.
    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Resizes an image to the model input size. Images that already have the
    /// right size are returned unchanged.
    pub fn resize(&self, img: &RgbImage) -> RgbImage {
        if img.dimensions() == (self.input_size, self.input_size) {
            return img.clone();
        }
        imageops::resize(img, self.input_size, self.input_size, self.filter)
    }

    /// Decodes and resizes an encoded image.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::ImageDecode` if the bytes are not a valid image.
    pub fn load(&self, bytes: &[u8]) -> Result<RgbImage, ClassifierError> {
        let img = decode_image(bytes)?;
        Ok(self.resize(&img))
    }

    /// Runs the full pipeline on one encoded image and returns a batch of size 1.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::ImageDecode` if the bytes are not a valid image.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<Tensor4D, ClassifierError> {
        let img = self.load(bytes)?;
        self.to_batch(std::slice::from_ref(&img))
    }

    /// Stacks already resized images into one rescaled batch tensor.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::InvalidInput` if an image does not have the
    /// configured input size.
    pub fn to_batch(&self, imgs: &[RgbImage]) -> Result<Tensor4D, ClassifierError> {
        let size = self.input_size as usize;
        if let Some((idx, img)) = imgs
            .iter()
            .enumerate()
            .find(|(_, img)| img.dimensions() != (self.input_size, self.input_size))
        {
            return Err(ClassifierError::invalid_input(format!(
                "image {idx} is {}x{}, expected {size}x{size}",
                img.width(),
                img.height()
            )));
        }

        let shape = self.layout.shape(imgs.len(), size, INPUT_CHANNELS);
        let tensor = match self.layout {
            TensorLayout::Nhwc => Tensor4D::from_shape_fn(shape, |(b, y, x, c)| {
                rescale(imgs[b].get_pixel(x as u32, y as u32)[c])
            }),
            TensorLayout::Nchw => Tensor4D::from_shape_fn(shape, |(b, c, y, x)| {
                rescale(imgs[b].get_pixel(x as u32, y as u32)[c])
            }),
        };
        Ok(tensor)
    }
}

#[inline]
fn rescale(value: u8) -> f32 {
    f32::from(value) / PIXEL_MAX
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::encode_png;
    use image::Rgb;

    fn png(width: u32, height: u32, pixel: [u8; 3]) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb(pixel))).unwrap()
    }

    #[test]
    fn test_black_image_rescales_to_zeros() {
        let tensor = ImagePreprocessor::default()
            .preprocess(&png(224, 224, [0, 0, 0]))
            .unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_white_image_rescales_to_ones() {
        let tensor = ImagePreprocessor::default()
            .preprocess(&png(224, 224, [255, 255, 255]))
            .unwrap();
        assert!(tensor.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_resizes_arbitrary_input() {
        let tensor = ImagePreprocessor::default()
            .preprocess(&png(640, 480, [51, 102, 255]))
            .unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert_eq!(tensor[[0, 100, 100, 0]], 51.0 / 255.0);
        assert_eq!(tensor[[0, 100, 100, 1]], 102.0 / 255.0);
        assert_eq!(tensor[[0, 100, 100, 2]], 1.0);
    }

    #[test]
    fn test_nchw_layout() {
        let pre = ImagePreprocessor::from_config(&PreprocessConfig {
            layout: TensorLayout::Nchw,
            ..PreprocessConfig::default()
        });
        let tensor = pre.preprocess(&png(32, 32, [0, 255, 0])).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        assert_eq!(tensor[[0, 0, 5, 5]], 0.0);
        assert_eq!(tensor[[0, 1, 5, 5]], 1.0);
    }

    #[test]
    fn test_invalid_bytes_fail_to_decode() {
        let err = ImagePreprocessor::default().preprocess(b"\x00\x01").unwrap_err();
        assert!(matches!(err, ClassifierError::ImageDecode(_)));
    }

    #[test]
    fn test_to_batch_rejects_wrong_size() {
        let pre = ImagePreprocessor::default();
        let img = RgbImage::new(10, 10);
        assert!(pre.to_batch(&[img]).is_err());
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("Bilinear".parse::<ResizeFilter>().unwrap(), ResizeFilter::Bilinear);
        assert!("cubic-ish".parse::<ResizeFilter>().is_err());
    }
}
