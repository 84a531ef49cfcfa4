//! Pretrained classifier and label encoder.
//!
//! The classifier is a capability trait so any model family can sit behind the
//! pipeline; the bundled implementation evaluates gradient-boosted trees saved
//! in the XGBoost JSON format.

pub mod artifacts;
pub mod encoder;
pub mod gbtree;

pub use artifacts::{ArtifactError, Artifacts};
pub use encoder::LabelEncoder;
pub use gbtree::GradientBoostedTrees;

use thiserror::Error;

use crate::features::FeatureVector;

/// Errors raised by model construction or inference
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid label encoder: {0}")]
    InvalidEncoder(String),

    #[error("Unsupported objective: {0}")]
    UnsupportedObjective(String),

    #[error("Feature vector has {actual} values, model expects {expected}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Class index {index} is outside the {classes} trained classes")]
    UnknownClass { index: usize, classes: usize },

    #[error("Label {0:?} is not a trained class")]
    UnknownLabel(String),

    #[error("Model produced invalid output: {0}")]
    InvalidOutput(String),
}

/// A trained classifier over fixed-length feature vectors.
///
/// Implementations are immutable after loading and must tolerate concurrent
/// calls from several request handlers.
pub trait Classifier: Send + Sync {
    /// Length of the feature vectors the model accepts
    fn num_features(&self) -> usize;

    /// Number of classes in the probability distribution
    fn num_classes(&self) -> usize;

    /// Class probabilities, in training-time class order
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ModelError>;

    /// Most probable class index
    fn predict(&self, features: &[f32]) -> Result<usize, ModelError> {
        let proba = self.predict_proba(features)?;
        argmax(&proba).ok_or_else(|| ModelError::InvalidOutput("empty distribution".to_string()))
    }
}

/// Run one feature vector through a classifier.
///
/// Returns the predicted class index together with the full distribution,
/// after checking the distribution is well formed.
pub fn classify(
    classifier: &dyn Classifier,
    features: &FeatureVector,
) -> Result<(usize, Vec<f32>), ModelError> {
    let proba = classifier.predict_proba(features.as_slice())?;

    if proba.len() != classifier.num_classes() {
        return Err(ModelError::InvalidOutput(format!(
            "{} probabilities for {} classes",
            proba.len(),
            classifier.num_classes()
        )));
    }
    if proba.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(ModelError::InvalidOutput("non-finite or negative probability".to_string()));
    }

    let index = argmax(&proba)
        .ok_or_else(|| ModelError::InvalidOutput("empty distribution".to_string()))?;
    Ok((index, proba))
}

/// Check an input has the length the model was trained on
pub fn check_feature_len(expected: usize, features: &[f32]) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::FeatureMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

/// Index of the largest value; ties go to the lowest index
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f32>);

    impl Classifier for Fixed {
        fn num_features(&self) -> usize {
            2
        }

        fn num_classes(&self) -> usize {
            3
        }

        fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
            check_feature_len(self.num_features(), features)?;
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_argmax_ties_lowest_index() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[1.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_default_predict_uses_argmax() {
        let model = Fixed(vec![0.1, 0.7, 0.2]);
        assert_eq!(model.predict(&[0.0, 0.0]).unwrap(), 1);
    }

    #[test]
    fn test_classify_rejects_wrong_length() {
        let model = Fixed(vec![0.1, 0.7, 0.2]);
        let result = classify(&model, &FeatureVector::new(vec![0.0; 40]));
        assert!(matches!(
            result,
            Err(ModelError::FeatureMismatch {
                expected: 2,
                actual: 40
            })
        ));
    }

    #[test]
    fn test_classify_rejects_short_distribution() {
        let model = Fixed(vec![0.5, 0.5]);
        let result = classify(&model, &FeatureVector::new(vec![0.0; 2]));
        assert!(matches!(result, Err(ModelError::InvalidOutput(_))));
    }

    #[test]
    fn test_classify_rejects_nan() {
        let model = Fixed(vec![0.5, f32::NAN, 0.5]);
        let result = classify(&model, &FeatureVector::new(vec![0.0; 2]));
        assert!(matches!(result, Err(ModelError::InvalidOutput(_))));
    }

    #[test]
    fn test_classify_returns_index_and_distribution() {
        let model = Fixed(vec![0.6, 0.3, 0.1]);
        let (index, proba) = classify(&model, &FeatureVector::new(vec![1.0, 2.0])).unwrap();
        assert_eq!(index, 0);
        assert_eq!(proba, vec![0.6, 0.3, 0.1]);
    }
}
