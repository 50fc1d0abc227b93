//! The complete MobileNetV2 tire classifier: ONNX backbone plus candle head.

use super::{ClassifierHead, FeatureExtractor, MobileNetBackbone};
use crate::core::{
    ClassifierError, ClassifierResult, MODEL_DISPLAY_NAME, ModelConfig, ScorePredictor,
    SimpleError, Tensor4D,
};
use candle_core::Device;
use tracing::info;

/// Backbone and head loaded from the two artifact files.
///
/// The model only counts as loaded when both files open and agree on the
/// feature width.
#[derive(Debug)]
pub struct MobileNetClassifier {
    backbone: MobileNetBackbone,
    head: ClassifierHead,
    device: Device,
}

impl MobileNetClassifier {
    /// Loads the backbone and the trained head described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::ModelLoad` if either file is missing or
    /// malformed, or if the head was trained on a different feature width.
    pub fn load(config: &ModelConfig, device: Device) -> Result<Self, ClassifierError> {
        let layout = config.preprocess.layout;
        let backbone = MobileNetBackbone::load(
            &config.backbone_path,
            config.input_name.as_deref(),
            config.output_name.as_deref(),
            config.session_pool_size,
            layout,
            config.preprocess.input_size,
        )?;
        let head = ClassifierHead::load(&config.head_path, layout, &device)?;

        let feature_dim = backbone.feature_dim()?;
        if feature_dim != head.feature_dim() {
            return Err(ClassifierError::model_load_error(
                &config.head_path,
                &format!(
                    "head expects {} features but the backbone produces {feature_dim}",
                    head.feature_dim()
                ),
                None::<SimpleError>,
            ));
        }

        info!(
            backbone = %config.backbone_path.display(),
            head = %config.head_path.display(),
            feature_dim,
            "{MODEL_DISPLAY_NAME} model loaded"
        );
        Ok(Self {
            backbone,
            head,
            device,
        })
    }

    /// The frozen backbone.
    pub fn backbone(&self) -> &MobileNetBackbone {
        &self.backbone
    }

    /// The trained head.
    pub fn head(&self) -> &ClassifierHead {
        &self.head
    }
}

impl ScorePredictor for MobileNetClassifier {
    fn predict(&self, input: &Tensor4D) -> ClassifierResult<Vec<f32>> {
        let features = self.backbone.extract(input, &self.device)?;
        self.head.probabilities(&features)
    }

    fn name(&self) -> &str {
        MODEL_DISPLAY_NAME
    }
}
