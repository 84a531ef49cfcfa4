//! Upload to prediction: decode, extract features, classify, present.

use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use crate::audio::{decode_wav, AudioClip, DecodeError, TARGET_SAMPLE_RATE};
use crate::features::{FeatureError, MfccConfig, MfccExtractor};
use crate::model::{classify, Artifacts, ModelError};
use crate::presentation::{present, Prediction};

/// Per-request failure, recovered at the request boundary
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Features(#[from] FeatureError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Broad failure class, used to choose how an error is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The upload is not usable audio
    Decode,
    /// Features or model could not produce a prediction
    Inference,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Decode(_) => ErrorKind::Decode,
            PipelineError::Features(FeatureError::ClipTooShort { .. })
            | PipelineError::Features(FeatureError::SampleRateMismatch { .. }) => ErrorKind::Decode,
            PipelineError::Features(_) | PipelineError::Model(_) => ErrorKind::Inference,
        }
    }
}

/// Fatal mismatch between the feature front end and the loaded model
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Features(#[from] FeatureError),

    #[error("Features must be computed at {supported} Hz, configured for {configured} Hz")]
    SampleRate { configured: u32, supported: u32 },

    #[error("Extractor produces {extractor} coefficients but the classifier expects {model}")]
    DimensionMismatch { extractor: usize, model: usize },
}

/// Immutable pipeline shared by all requests
#[derive(Debug)]
pub struct EmotionPipeline {
    extractor: MfccExtractor,
    artifacts: Artifacts,
}

impl EmotionPipeline {
    pub fn new(config: MfccConfig, artifacts: Artifacts) -> Result<Self, SetupError> {
        // Uploads are always resampled to the target rate before extraction
        if config.sample_rate != TARGET_SAMPLE_RATE {
            return Err(SetupError::SampleRate {
                configured: config.sample_rate,
                supported: TARGET_SAMPLE_RATE,
            });
        }

        let extractor = MfccExtractor::new(config)?;

        let model = artifacts.classifier().num_features();
        if extractor.n_coefficients() != model {
            return Err(SetupError::DimensionMismatch {
                extractor: extractor.n_coefficients(),
                model,
            });
        }

        Ok(Self {
            extractor,
            artifacts,
        })
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Run the full pipeline on uploaded WAV bytes
    pub fn run(&self, bytes: &[u8]) -> Result<Prediction, PipelineError> {
        let started = Instant::now();

        let clip = decode_wav(bytes)?;
        debug!(
            "Upload decoded: {} samples at {} Hz ({:.2}s)",
            clip.len(),
            clip.sample_rate,
            clip.duration_secs()
        );

        let clip = clip.into_target_rate()?;
        let prediction = self.run_clip(&clip)?;

        info!(
            "Predicted {} ({}) in {:?}",
            prediction.label,
            prediction.confidence_display(),
            started.elapsed()
        );
        Ok(prediction)
    }

    /// Extract, classify and present an already decoded 16kHz clip
    pub fn run_clip(&self, clip: &AudioClip) -> Result<Prediction, PipelineError> {
        let features = self.extractor.extract(clip)?;
        let (index, probabilities) = classify(self.artifacts.classifier(), &features)?;
        let encoder = self.artifacts.encoder();
        let label = encoder.inverse_transform(index)?;

        debug!("Class {} -> {:?}, distribution {:?}", index, label, probabilities);

        Ok(present(label, &probabilities, encoder.classes()))
    }
}
