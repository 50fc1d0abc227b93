//! Tire Condition Classifier
//!
//! Glues the preprocessing pipeline, a [`ScorePredictor`] and the decision rule
//! together. The classifier is created once at startup and shared read-only by
//! every request; when the model could not be loaded it still exists, but every
//! classification fails with `ClassifierError::ModelNotLoaded`.

use crate::core::{ClassifierError, ClassifierResult, ProcessingStage, ScorePredictor, SimpleError};
use crate::domain::Classification;
use crate::processors::ImagePreprocessor;
use std::sync::Arc;
use tracing::debug;

/// Binary tire condition classifier.
#[derive(Clone)]
pub struct TireClassifier {
    preprocessor: ImagePreprocessor,
    model: Option<Arc<dyn ScorePredictor>>,
}

impl std::fmt::Debug for TireClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TireClassifier")
            .field("preprocessor", &self.preprocessor)
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .finish()
    }
}

impl TireClassifier {
    /// Creates a classifier backed by a loaded model.
    pub fn new(preprocessor: ImagePreprocessor, model: Arc<dyn ScorePredictor>) -> Self {
        Self {
            preprocessor,
            model: Some(model),
        }
    }

    /// Creates a classifier whose model failed to load.
    pub fn unloaded(preprocessor: ImagePreprocessor) -> Self {
        Self {
            preprocessor,
            model: None,
        }
    }

    /// Whether a model is available.
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// The preprocessing pipeline in use.
    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    /// Classifies one encoded image.
    ///
    /// # Errors
    ///
    /// * `ModelNotLoaded` if no model is available
    /// * `ImageDecode` if the bytes are not an image
    /// * any error raised by the model or the decision rule
    pub fn classify(&self, image_bytes: &[u8]) -> ClassifierResult<Classification> {
        let model = self.model.as_ref().ok_or(ClassifierError::ModelNotLoaded)?;

        let input = self.preprocessor.preprocess(image_bytes)?;
        let scores = model.predict(&input)?;
        let score = scores.first().copied().ok_or_else(|| {
            ClassifierError::processing_error(
                ProcessingStage::PostProcessing,
                "model returned no score",
                SimpleError::new(format!("empty output from {}", model.name())),
            )
        })?;

        let result = Classification::from_score(score)?;
        debug!(score, condition = %result.condition, "classified image");
        Ok(result)
    }

    /// Classifies several encoded images in order.
    ///
    /// The first failure aborts the whole batch and no partial results are returned.
    pub fn classify_all<B: AsRef<[u8]>>(
        &self,
        images: &[B],
    ) -> ClassifierResult<Vec<Classification>> {
        images
            .iter()
            .map(|bytes| self.classify(bytes.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tensor4D;
    use crate::domain::TireCondition;
    use crate::utils::encode_png;
    use image::{Rgb, RgbImage};

    /// Scores an image by its mean pixel value.
    struct MeanScore;

    impl ScorePredictor for MeanScore {
        fn predict(&self, input: &Tensor4D) -> ClassifierResult<Vec<f32>> {
            Ok(input
                .outer_iter()
                .map(|img| img.mean().unwrap_or(0.0))
                .collect())
        }
    }

    struct Fixed(f32);

    impl ScorePredictor for Fixed {
        fn predict(&self, _input: &Tensor4D) -> ClassifierResult<Vec<f32>> {
            Ok(vec![self.0])
        }
    }

    fn png(pixel: [u8; 3]) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(16, 16, Rgb(pixel))).unwrap()
    }

    #[test]
    fn test_unloaded_rejects_before_decoding() {
        let classifier = TireClassifier::unloaded(ImagePreprocessor::default());
        let err = classifier.classify(b"not even an image").unwrap_err();
        assert!(matches!(err, ClassifierError::ModelNotLoaded));
    }

    #[test]
    fn test_classify_maps_score() {
        let classifier =
            TireClassifier::new(ImagePreprocessor::default(), Arc::new(MeanScore));
        let white = classifier.classify(&png([255, 255, 255])).unwrap();
        assert_eq!(white.condition, TireCondition::Normal);
        assert_eq!(white.confidence, 1.0);

        let black = classifier.classify(&png([0, 0, 0])).unwrap();
        assert_eq!(black.condition, TireCondition::Cracked);
        assert_eq!(black.confidence, 1.0);
    }

    #[test]
    fn test_boundary_score() {
        let classifier = TireClassifier::new(ImagePreprocessor::default(), Arc::new(Fixed(0.5)));
        let result = classifier.classify(&png([1, 2, 3])).unwrap();
        assert_eq!(result.condition, TireCondition::Cracked);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_classify_all_preserves_order() {
        let classifier =
            TireClassifier::new(ImagePreprocessor::default(), Arc::new(MeanScore));
        let images = vec![png([255, 255, 255]), png([0, 0, 0]), png([255, 255, 255])];
        let results = classifier.classify_all(&images).unwrap();
        let conditions: Vec<_> = results.iter().map(|r| r.condition).collect();
        assert_eq!(
            conditions,
            vec![
                TireCondition::Normal,
                TireCondition::Cracked,
                TireCondition::Normal
            ]
        );
    }

    #[test]
    fn test_classify_all_aborts_on_bad_image() {
        let classifier =
            TireClassifier::new(ImagePreprocessor::default(), Arc::new(MeanScore));
        let images = vec![png([255, 255, 255]), b"garbage".to_vec()];
        assert!(matches!(
            classifier.classify_all(&images),
            Err(ClassifierError::ImageDecode(_))
        ));
    }

    #[test]
    fn test_empty_model_output() {
        struct Empty;
        impl ScorePredictor for Empty {
            fn predict(&self, _input: &Tensor4D) -> ClassifierResult<Vec<f32>> {
                Ok(Vec::new())
            }
        }
        let classifier = TireClassifier::new(ImagePreprocessor::default(), Arc::new(Empty));
        assert!(classifier.classify(&png([0, 0, 0])).is_err());
    }
}
