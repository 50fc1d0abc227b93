//! Tensor aliases and layout descriptors for batched image input.

use serde::{Deserialize, Serialize};

/// A 4-dimensional tensor represented as a 4D array of f32 values.
pub type Tensor4D = ndarray::Array4<f32>;

/// A 2-dimensional tensor represented as a 2D array of f32 values.
pub type Tensor2D = ndarray::Array2<f32>;

/// Memory layout of a batched image tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// Batch, Height, Width, Channel order (Keras / TensorFlow exports)
    #[default]
    Nhwc,
    /// Batch, Channel, Height, Width order (PyTorch exports)
    Nchw,
}

impl TensorLayout {
    /// Returns the tensor shape for `batch` square images of side `size`.
    pub fn shape(self, batch: usize, size: usize, channels: usize) -> (usize, usize, usize, usize) {
        match self {
            TensorLayout::Nhwc => (batch, size, size, channels),
            TensorLayout::Nchw => (batch, channels, size, size),
        }
    }

    /// Returns the axes that hold the spatial dimensions.
    pub fn spatial_axes(self) -> (usize, usize) {
        match self {
            TensorLayout::Nhwc => (1, 2),
            TensorLayout::Nchw => (2, 3),
        }
    }

    /// Returns the axis that holds the channels.
    pub fn channel_axis(self) -> usize {
        match self {
            TensorLayout::Nhwc => 3,
            TensorLayout::Nchw => 1,
        }
    }
}

impl std::fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TensorLayout::Nhwc => write!(f, "NHWC"),
            TensorLayout::Nchw => write!(f, "NCHW"),
        }
    }
}
