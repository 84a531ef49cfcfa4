//! Startup loading of the classifier and label encoder.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::{Classifier, GradientBoostedTrees, LabelEncoder, ModelError};

/// Fatal errors while loading the prebuilt artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact not found at path: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    #[error("Classifier has {model} classes but label encoder has {encoder}")]
    ClassCountMismatch { model: usize, encoder: usize },
}

/// The loaded, read-only model pair shared by every request
#[derive(Clone)]
pub struct Artifacts {
    classifier: Arc<dyn Classifier>,
    encoder: Arc<LabelEncoder>,
}

impl std::fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifacts")
            .field("num_features", &self.classifier.num_features())
            .field("classes", &self.encoder.classes())
            .finish()
    }
}

impl Artifacts {
    /// Pair a classifier with its encoder, checking they were trained together
    pub fn new(
        classifier: Arc<dyn Classifier>,
        encoder: Arc<LabelEncoder>,
    ) -> Result<Self, ArtifactError> {
        if classifier.num_classes() != encoder.len() {
            return Err(ArtifactError::ClassCountMismatch {
                model: classifier.num_classes(),
                encoder: encoder.len(),
            });
        }
        Ok(Self {
            classifier,
            encoder,
        })
    }

    /// Load an XGBoost JSON model and a JSON label encoder from disk
    pub fn load(model_path: &Path, encoder_path: &Path) -> Result<Self, ArtifactError> {
        info!("Loading classifier from {:?}", model_path);
        let content = read_artifact(model_path)?;
        let model =
            GradientBoostedTrees::from_json_str(&content).map_err(|source| ArtifactError::Invalid {
                path: model_path.to_path_buf(),
                source,
            })?;

        info!("Loading label encoder from {:?}", encoder_path);
        let content = read_artifact(encoder_path)?;
        let encoder =
            LabelEncoder::from_json_str(&content).map_err(|source| ArtifactError::Invalid {
                path: encoder_path.to_path_buf(),
                source,
            })?;

        let artifacts = Self::new(Arc::new(model), Arc::new(encoder))?;
        info!(
            "Artifacts ready: {} features, {} classes {:?}",
            artifacts.classifier.num_features(),
            artifacts.classifier.num_classes(),
            artifacts.encoder.classes()
        );
        Ok(artifacts)
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }
}

fn read_artifact(path: &Path) -> Result<String, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{emotion_model_json, write_artifacts, EMOTION_CLASSES};

    #[test]
    fn test_load_fixture_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (model_path, encoder_path) = write_artifacts(dir.path());

        let artifacts = Artifacts::load(&model_path, &encoder_path).unwrap();
        assert_eq!(artifacts.classifier().num_features(), 40);
        assert_eq!(artifacts.classifier().num_classes(), 3);
        assert_eq!(artifacts.encoder().classes(), EMOTION_CLASSES);
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (_, encoder_path) = write_artifacts(dir.path());

        let result = Artifacts::load(&dir.path().join("nope.json"), &encoder_path);
        assert!(matches!(result, Err(ArtifactError::NotFound(_))));
    }

    #[test]
    fn test_corrupt_encoder_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (model_path, encoder_path) = write_artifacts(dir.path());
        std::fs::write(&encoder_path, "cnumpy.core.multiarray").unwrap();

        let result = Artifacts::load(&model_path, &encoder_path);
        assert!(matches!(result, Err(ArtifactError::Invalid { .. })));
    }

    #[test]
    fn test_class_count_mismatch() {
        let model = GradientBoostedTrees::from_json_str(&emotion_model_json(40)).unwrap();
        let encoder = LabelEncoder::new(vec!["happy".to_string(), "sad".to_string()]).unwrap();

        let result = Artifacts::new(Arc::new(model), Arc::new(encoder));
        assert!(matches!(
            result,
            Err(ArtifactError::ClassCountMismatch {
                model: 3,
                encoder: 2
            })
        ));
    }
}
