//! MFCC feature extraction.
//!
//! Turns a 16kHz mono clip into a fixed-length vector by:
//! 1. Computing a centered mel power spectrogram
//! 2. Converting to decibels and applying an orthonormal DCT per frame
//! 3. Averaging the cepstral coefficients over time

pub mod config;
pub mod mel;
pub mod mfcc;

pub use config::MfccConfig;
pub use mfcc::MfccExtractor;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during feature extraction
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Clip too short for analysis: {samples} samples, need at least {required}")]
    ClipTooShort { samples: usize, required: usize },

    #[error("Expected {expected} Hz audio, got {actual} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    #[error("Invalid feature configuration: {0}")]
    InvalidConfig(String),

    #[error("FFT failed: {0}")]
    Fft(String),

    #[error("Audio or features contain non-finite values")]
    NonFinite,
}

/// Fixed-length summary of a clip, one value per cepstral coefficient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}
