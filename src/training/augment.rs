//! Random geometric augmentation of training images.
//!
//! Each image gets its own rotation, shift, zoom and optional mirror, sampled
//! from the configured ranges. The affine part is applied around the image
//! centre by inverse mapping: every output pixel looks up its source position
//! and samples it bilinearly. Source positions outside the image are clamped
//! to the border, which replicates edge pixels ("nearest" fill).

use crate::core::AugmentationConfig;
use image::{Rgb, RgbImage, imageops};
use rand::Rng;

/// One concrete draw from the augmentation ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentParams {
    /// Rotation in degrees, counter-clockwise.
    pub rotation_deg: f32,
    /// Horizontal shift in pixels.
    pub shift_x: f32,
    /// Vertical shift in pixels.
    pub shift_y: f32,
    /// Horizontal zoom factor. Values above one show less of the image.
    pub zoom_x: f32,
    /// Vertical zoom factor.
    pub zoom_y: f32,
    /// Mirror left-right after the affine transform.
    pub flip: bool,
}

impl AugmentParams {
    /// Parameters that leave the image unchanged.
    pub const IDENTITY: Self = Self {
        rotation_deg: 0.0,
        shift_x: 0.0,
        shift_y: 0.0,
        zoom_x: 1.0,
        zoom_y: 1.0,
        flip: false,
    };

    fn is_affine_identity(&self) -> bool {
        self.rotation_deg == 0.0
            && self.shift_x == 0.0
            && self.shift_y == 0.0
            && self.zoom_x == 1.0
            && self.zoom_y == 1.0
    }
}

/// Samples and applies random transformations.
#[derive(Debug, Clone)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Draws transformation parameters for an image of `width` x `height`.
    pub fn sample<R: Rng>(&self, rng: &mut R, width: u32, height: u32) -> AugmentParams {
        let c = &self.config;
        let (zoom_x, zoom_y) = if c.zoom_range > 0.0 {
            let range = (1.0 - c.zoom_range)..=(1.0 + c.zoom_range);
            (rng.gen_range(range.clone()), rng.gen_range(range))
        } else {
            (1.0, 1.0)
        };
        AugmentParams {
            rotation_deg: symmetric(rng, c.rotation_range),
            shift_x: symmetric(rng, c.width_shift_range) * width as f32,
            shift_y: symmetric(rng, c.height_shift_range) * height as f32,
            zoom_x,
            zoom_y,
            flip: c.horizontal_flip && rng.gen_bool(0.5),
        }
    }

    /// Samples parameters and applies them.
    pub fn augment<R: Rng>(&self, rng: &mut R, img: &RgbImage) -> RgbImage {
        let params = self.sample(rng, img.width(), img.height());
        self.apply(img, &params)
    }

    /// Applies `params` to `img`. The output has the same size as the input.
    pub fn apply(&self, img: &RgbImage, params: &AugmentParams) -> RgbImage {
        let transformed = if params.is_affine_identity() || img.width() == 0 || img.height() == 0 {
            img.clone()
        } else {
            affine(img, params)
        };
        if params.flip {
            imageops::flip_horizontal(&transformed)
        } else {
            transformed
        }
    }
}

fn symmetric<R: Rng>(rng: &mut R, range: f32) -> f32 {
    if range > 0.0 {
        rng.gen_range(-range..=range)
    } else {
        0.0
    }
}

fn affine(img: &RgbImage, params: &AugmentParams) -> RgbImage {
    let (width, height) = img.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let (sin, cos) = params.rotation_deg.to_radians().sin_cos();

    RgbImage::from_fn(width, height, |x, y| {
        // zoom and shift in image axes, then rotate about the centre
        let u = params.zoom_x * (x as f32 - cx) + params.shift_x;
        let v = params.zoom_y * (y as f32 - cy) + params.shift_y;
        let src_x = cx + sin * v + cos * u;
        let src_y = cy + cos * v - sin * u;
        sample_bilinear(img, src_x, src_y)
    })
}

/// Bilinear lookup with coordinates clamped to the image.
fn sample_bilinear(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let max_x = (img.width() - 1) as f32;
    let max_y = (img.height() - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let x0 = x0 as u32;
    let y0 = y0 as u32;
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for (c, value) in out.iter_mut().enumerate() {
        let top = f32::from(p00[c]) * (1.0 - fx) + f32::from(p10[c]) * fx;
        let bottom = f32::from(p01[c]) * (1.0 - fx) + f32::from(p11[c]) * fx;
        let v = top * (1.0 - fy) + bottom * fy;
        *value = (v + 0.5).clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
