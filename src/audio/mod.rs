//! Audio input: WAV decoding, mono downmix and resampling to the analysis rate.

pub mod decoder;
pub mod resampler;

pub use decoder::{decode_wav, downmix_to_mono, AudioClip, SUPPORTED_SAMPLE_RATES};
pub use resampler::{AudioResampler, TARGET_SAMPLE_RATE};

use thiserror::Error;

/// Errors raised while turning uploaded bytes into an analysable clip
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Not a valid WAV file: {0}")]
    InvalidWav(String),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error("Sample {0} is not a finite number")]
    NonFiniteSample(usize),

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Resampling failed: {0}")]
    Resample(String),
}

impl From<hound::Error> for DecodeError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::Unsupported => {
                DecodeError::UnsupportedFormat("unsupported WAV feature".to_string())
            }
            other => DecodeError::InvalidWav(other.to_string()),
        }
    }
}
