//! Frozen MobileNetV2 feature extractor executed with ONNX Runtime.

use crate::core::{ClassifierError, INPUT_CHANNELS, OrtInfer, Tensor4D, TensorLayout};
use crate::models::head::candle_error;
use candle_core::{Device, Tensor};
use ndarray::ArrayD;
use std::path::Path;
use tracing::debug;

/// Produces the feature map the classification head is trained on.
pub trait FeatureExtractor: Send + Sync {
    /// Runs the extractor on a rescaled batch and returns its features on `device`.
    fn extract(&self, batch: &Tensor4D, device: &Device) -> Result<Tensor, ClassifierError>;

    /// Number of feature channels.
    fn feature_dim(&self) -> Result<usize, ClassifierError>;
}

/// MobileNetV2 without its classification top.
///
/// The ONNX graph takes a rescaled `[N, 224, 224, 3]` batch (or `[N, 3, 224, 224]`
/// for NCHW exports) and returns the last convolutional feature map, either as
/// `[N, H, W, C]` / `[N, C, H, W]` or already pooled as `[N, C]`.
#[derive(Debug)]
pub struct MobileNetBackbone {
    engine: OrtInfer,
    layout: TensorLayout,
    input_size: u32,
}

impl MobileNetBackbone {
    /// Opens the backbone.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the ONNX file
    /// * `input_name` - Input tensor name, discovered when `None`
    /// * `output_name` - Output tensor name, the first output when `None`
    /// * `pool_size` - Number of ONNX Runtime sessions
    /// * `layout` - Layout of both the input batch and the feature map
    /// * `input_size` - Side length of the square input image
    pub fn load(
        path: &Path,
        input_name: Option<&str>,
        output_name: Option<&str>,
        pool_size: usize,
        layout: TensorLayout,
        input_size: u32,
    ) -> Result<Self, ClassifierError> {
        let engine = OrtInfer::with_pool(path, input_name, output_name, pool_size)?;
        debug!(
            model = engine.model_name(),
            input = engine.input_name(),
            shape = ?engine.primary_input_shape(),
            "opened backbone"
        );
        Ok(Self {
            engine,
            layout,
            input_size,
        })
    }

    /// Layout of the backbone tensors.
    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Runs the backbone and returns the raw feature map.
    pub fn features(&self, batch: &Tensor4D) -> Result<ArrayD<f32>, ClassifierError> {
        self.engine.infer(batch)
    }

    /// Runs the backbone and moves the feature map onto `device` for the head.
    pub fn extract_to(&self, batch: &Tensor4D, device: &Device) -> Result<Tensor, ClassifierError> {
        let features = self.features(batch)?;
        let dims = features.shape().to_vec();
        let data: Vec<f32> = features.iter().copied().collect();
        Tensor::from_vec(data, dims, device).map_err(|e| candle_error("move features to device", e))
    }

    /// Number of feature channels, found by running one blank image through
    /// the network.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::InvalidInput` if the output rank is neither 2 nor 4.
    pub fn probe_feature_dim(&self) -> Result<usize, ClassifierError> {
        let size = self.input_size as usize;
        let probe = Tensor4D::zeros(self.layout.shape(1, size, INPUT_CHANNELS));
        let features = self.features(&probe)?;
        match features.ndim() {
            2 => Ok(features.shape()[1]),
            4 => Ok(features.shape()[self.layout.channel_axis()]),
            rank => Err(ClassifierError::invalid_input(format!(
                "unexpected backbone output rank {rank} with shape {:?}",
                features.shape()
            ))),
        }
    }
}

impl FeatureExtractor for MobileNetBackbone {
    fn extract(&self, batch: &Tensor4D, device: &Device) -> Result<Tensor, ClassifierError> {
        self.extract_to(batch, device)
    }

    fn feature_dim(&self) -> Result<usize, ClassifierError> {
        self.probe_feature_dim()
    }
}
