//! Tire condition labels and the score-to-label decision rule.

use crate::core::{CLASS_LABELS, ClassifierError, ClassifierResult, DECISION_THRESHOLD};
use serde::{Deserialize, Serialize};

/// Condition of a tire as predicted by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TireCondition {
    /// The sidewall or tread shows cracks.
    Cracked,
    /// No visible damage.
    Normal,
}

impl TireCondition {
    /// Class index of this condition, as assigned by sorted dataset folder names.
    pub fn index(self) -> usize {
        match self {
            TireCondition::Cracked => 0,
            TireCondition::Normal => 1,
        }
    }

    /// Returns the condition for a class index, if any.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(TireCondition::Cracked),
            1 => Some(TireCondition::Normal),
            _ => None,
        }
    }

    /// Label string used in API responses.
    pub fn as_str(self) -> &'static str {
        CLASS_LABELS[self.index()]
    }
}

impl std::fmt::Display for TireCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one image.
///
/// Serializes as `{"class": "Cracked"|"Normal", "confidence": <float>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Predicted condition.
    #[serde(rename = "class")]
    pub condition: TireCondition,
    /// Certainty in the predicted condition, in `[0, 1]` for valid scores.
    pub confidence: f64,
}

impl Classification {
    /// Maps a sigmoid score to a condition and a confidence.
    ///
    /// Scores strictly greater than 0.5 are `Normal` with the score as
    /// confidence; everything else, 0.5 included, is `Cracked` with confidence
    /// `1 - score`. The subtraction happens in `f32` before widening, so the
    /// reported confidence is exactly the single-precision result.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::InvalidScore` for NaN or infinite scores.
    pub fn from_score(score: f32) -> ClassifierResult<Self> {
        if !score.is_finite() {
            return Err(ClassifierError::InvalidScore { score });
        }

        let (condition, confidence) = if score > DECISION_THRESHOLD {
            (TireCondition::Normal, score)
        } else {
            (TireCondition::Cracked, 1.0 - score)
        };

        Ok(Self {
            condition,
            confidence: f64::from(confidence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_boundary_is_cracked() {
        let result = Classification::from_score(0.5).unwrap();
        assert_eq!(result.condition, TireCondition::Cracked);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_extremes() {
        let normal = Classification::from_score(1.0).unwrap();
        assert_eq!(normal.condition, TireCondition::Normal);
        assert_eq!(normal.confidence, 1.0);

        let cracked = Classification::from_score(0.0).unwrap();
        assert_eq!(cracked.condition, TireCondition::Cracked);
        assert_eq!(cracked.confidence, 1.0);
    }

    #[test]
    fn test_confidence_is_single_precision() {
        let result = Classification::from_score(0.7).unwrap();
        assert_eq!(result.confidence, f64::from(0.7f32));
        let result = Classification::from_score(0.2).unwrap();
        assert_eq!(result.confidence, f64::from(1.0f32 - 0.2f32));
    }

    #[test]
    fn test_rejects_nan() {
        assert!(matches!(
            Classification::from_score(f32::NAN),
            Err(ClassifierError::InvalidScore { .. })
        ));
        assert!(Classification::from_score(f32::INFINITY).is_err());
    }

    #[test]
    fn test_serializes_with_class_key() {
        let json = serde_json::to_value(Classification::from_score(0.75).unwrap()).unwrap();
        assert_eq!(json["class"], "Normal");
        assert_eq!(json["confidence"], 0.75);
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_label_indices_follow_sorted_folders() {
        assert_eq!(TireCondition::Cracked.index(), 0);
        assert_eq!(TireCondition::from_index(1), Some(TireCondition::Normal));
        assert_eq!(TireCondition::from_index(2), None);
        assert_eq!(TireCondition::Normal.to_string(), "Normal");
    }

    proptest! {
        #[test]
        fn prop_scores_above_threshold_are_normal(score in 0.5f32..=1.0f32) {
            prop_assume!(score > 0.5);
            let result = Classification::from_score(score).unwrap();
            prop_assert_eq!(result.condition, TireCondition::Normal);
            prop_assert_eq!(result.confidence, f64::from(score));
        }

        #[test]
        fn prop_scores_at_or_below_threshold_are_cracked(score in 0.0f32..=0.5f32) {
            let result = Classification::from_score(score).unwrap();
            prop_assert_eq!(result.condition, TireCondition::Cracked);
            prop_assert_eq!(result.confidence, f64::from(1.0f32 - score));
        }

        #[test]
        fn prop_confidence_in_unit_interval(score in 0.0f32..=1.0f32) {
            let result = Classification::from_score(score).unwrap();
            prop_assert!((0.0..=1.0).contains(&result.confidence));
        }
    }
}
