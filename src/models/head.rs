//! Trainable classification head on top of the frozen backbone.
//!
//! Global average pooling → dropout → dense(hidden, relu) → dense(1). The head
//! produces logits; [`ClassifierHead::probabilities`] applies the sigmoid.
//! Weights are stored in safetensors under the `hidden.*` and `output.*` names.

use crate::core::{ClassifierError, SimpleError, TensorLayout};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Dropout, Linear, VarBuilder};
use std::collections::HashMap;
use std::path::Path;

/// Prefix of the hidden dense layer's tensors.
pub const HIDDEN_PREFIX: &str = "hidden";
/// Prefix of the output dense layer's tensors.
pub const OUTPUT_PREFIX: &str = "output";

pub(crate) fn candle_error(context: &str, err: candle_core::Error) -> ClassifierError {
    ClassifierError::tensor_operation(context, err)
}

/// Pooling, dropout and the two dense layers.
#[derive(Debug, Clone)]
pub struct ClassifierHead {
    hidden: Linear,
    output: Linear,
    dropout: Dropout,
    layout: TensorLayout,
    feature_dim: usize,
}

impl ClassifierHead {
    /// Creates a freshly initialized head whose variables live in `vb`.
    ///
    /// # Arguments
    ///
    /// * `feature_dim` - Channel count of the backbone feature map
    /// * `hidden_units` - Width of the hidden dense layer
    /// * `dropout` - Dropout rate applied to the pooled features during training
    /// * `layout` - Layout of the backbone feature map
    /// * `vb` - Variable builder, usually backed by a `VarMap` for training
    pub fn new(
        feature_dim: usize,
        hidden_units: usize,
        dropout: f32,
        layout: TensorLayout,
        vb: VarBuilder,
    ) -> Result<Self, ClassifierError> {
        let hidden = candle_nn::linear(feature_dim, hidden_units, vb.pp(HIDDEN_PREFIX))
            .map_err(|e| candle_error("create hidden layer", e))?;
        let output = candle_nn::linear(hidden_units, 1, vb.pp(OUTPUT_PREFIX))
            .map_err(|e| candle_error("create output layer", e))?;
        Ok(Self {
            hidden,
            output,
            dropout: Dropout::new(dropout),
            layout,
            feature_dim,
        })
    }

    /// Loads trained weights from a safetensors file.
    ///
    /// Layer sizes are read from the stored tensors, so the file alone fully
    /// describes the head.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::ModelLoad` if the file is missing, unreadable, or
    /// does not contain consistent `hidden`/`output` layers.
    pub fn load(path: &Path, layout: TensorLayout, device: &Device) -> Result<Self, ClassifierError> {
        if !path.is_file() {
            return Err(ClassifierError::model_load_error(
                path,
                "head weights not found",
                None::<SimpleError>,
            ));
        }
        let tensors = candle_core::safetensors::load(path, device).map_err(|e| {
            ClassifierError::model_load_error(path, "failed to read safetensors", Some(e))
        })?;

        let hidden_w = take(&tensors, path, &format!("{HIDDEN_PREFIX}.weight"))?;
        let hidden_b = take(&tensors, path, &format!("{HIDDEN_PREFIX}.bias"))?;
        let output_w = take(&tensors, path, &format!("{OUTPUT_PREFIX}.weight"))?;
        let output_b = take(&tensors, path, &format!("{OUTPUT_PREFIX}.bias"))?;

        let (hidden_units, feature_dim) = hidden_w.dims2().map_err(|e| {
            ClassifierError::model_load_error(path, "hidden.weight must be 2D", Some(e))
        })?;
        let (outputs, output_in) = output_w.dims2().map_err(|e| {
            ClassifierError::model_load_error(path, "output.weight must be 2D", Some(e))
        })?;
        if outputs != 1
            || output_in != hidden_units
            || hidden_b.dims() != &[hidden_units]
            || output_b.dims() != &[1]
        {
            return Err(ClassifierError::model_load_error(
                path,
                &format!(
                    "inconsistent layer shapes: hidden {:?}/{:?}, output {:?}/{:?}",
                    hidden_w.dims(),
                    hidden_b.dims(),
                    output_w.dims(),
                    output_b.dims()
                ),
                None::<SimpleError>,
            ));
        }

        Ok(Self {
            hidden: Linear::new(to_f32(hidden_w, path)?, Some(to_f32(hidden_b, path)?)),
            output: Linear::new(to_f32(output_w, path)?, Some(to_f32(output_b, path)?)),
            dropout: Dropout::new(0.0),
            layout,
            feature_dim,
        })
    }

    /// Channel count the head expects from the backbone.
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Global average pooling over the spatial axes.
    ///
    /// Feature maps that are already pooled (`[N, C]`) pass through unchanged.
    pub fn pool(&self, features: &Tensor) -> Result<Tensor, ClassifierError> {
        match features.rank() {
            2 => Ok(features.clone()),
            4 => {
                let (h, w) = self.layout.spatial_axes();
                features
                    .mean((h, w))
                    .map_err(|e| candle_error("global average pooling", e))
            }
            rank => Err(ClassifierError::invalid_input(format!(
                "backbone features must be 2D or 4D, got rank {rank} with shape {:?}",
                features.dims()
            ))),
        }
    }

    /// Computes one logit per image.
    ///
    /// Dropout is only active when `train` is true.
    pub fn logits(&self, features: &Tensor, train: bool) -> Result<Tensor, ClassifierError> {
        let pooled = self.pool(features)?;
        let channels = pooled.dim(1).map_err(|e| candle_error("read pooled width", e))?;
        if channels != self.feature_dim {
            return Err(ClassifierError::invalid_input(format!(
                "backbone produced {channels} channels, head expects {}",
                self.feature_dim
            )));
        }
        let xs = self
            .dropout
            .forward(&pooled, train)
            .map_err(|e| candle_error("dropout", e))?;
        let xs = self
            .hidden
            .forward(&xs)
            .and_then(|t| t.relu())
            .map_err(|e| candle_error("hidden layer", e))?;
        self.output
            .forward(&xs)
            .and_then(|t| t.squeeze(1))
            .map_err(|e| candle_error("output layer", e))
    }

    /// Computes one sigmoid probability per image.
    pub fn probabilities(&self, features: &Tensor) -> Result<Vec<f32>, ClassifierError> {
        let logits = self.logits(features, false)?;
        candle_nn::ops::sigmoid(&logits)
            .and_then(|p| p.to_vec1::<f32>())
            .map_err(|e| candle_error("sigmoid", e))
    }
}

fn take(tensors: &HashMap<String, Tensor>, path: &Path, name: &str) -> Result<Tensor, ClassifierError> {
    tensors.get(name).cloned().ok_or_else(|| {
        ClassifierError::model_load_error(
            path,
            &format!("missing tensor '{name}'"),
            None::<SimpleError>,
        )
    })
}

fn to_f32(tensor: Tensor, path: &Path) -> Result<Tensor, ClassifierError> {
    tensor
        .to_dtype(DType::F32)
        .map_err(|e| ClassifierError::model_load_error(path, "cannot convert weights to f32", Some(e)))
}
