//! Utility functions for images.

pub mod image;

pub use self::image::{decode_image, dynamic_to_rgb, encode_png, has_image_extension, load_image};
