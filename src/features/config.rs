//! Configuration for MFCC feature extraction.

use serde::{Deserialize, Serialize};

use super::FeatureError;

/// Parameters of the MFCC front end.
///
/// Defaults follow the conventional librosa settings the emotion models are
/// trained with; changing them invalidates any pretrained classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfccConfig {
    /// Sample rate of input audio
    pub sample_rate: u32,

    /// Number of cepstral coefficients kept per frame
    pub n_mfcc: usize,

    /// FFT size, also the analysis window length
    pub n_fft: usize,

    /// Hop length between frames (in samples)
    pub hop_length: usize,

    /// Number of mel frequency bands
    pub n_mels: usize,

    /// Minimum frequency for mel filterbank (Hz)
    pub fmin: f32,

    /// Maximum frequency for mel filterbank (Hz); Nyquist when unset
    pub fmax: Option<f32>,

    /// Dynamic range kept below the loudest bin (dB); unlimited when unset
    pub top_db: Option<f32>,

    /// Clips shorter than this are rejected
    pub min_clip_samples: usize,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            n_mfcc: 40,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            fmin: 0.0,
            fmax: None,
            top_db: Some(80.0),
            min_clip_samples: 2048, // one analysis window
        }
    }
}

impl MfccConfig {
    /// Upper edge of the filterbank in Hz
    pub fn effective_fmax(&self) -> f32 {
        self.fmax.unwrap_or(self.sample_rate as f32 / 2.0)
    }

    /// Number of frequency bins produced by the real FFT
    pub fn n_fft_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn validate(&self) -> Result<(), FeatureError> {
        let nyquist = self.sample_rate as f32 / 2.0;

        if self.sample_rate == 0 {
            return Err(FeatureError::InvalidConfig("sample_rate must be > 0".to_string()));
        }
        if self.n_fft < 2 || self.n_fft % 2 != 0 {
            return Err(FeatureError::InvalidConfig(format!(
                "n_fft must be even and >= 2, got {}",
                self.n_fft
            )));
        }
        if self.hop_length == 0 {
            return Err(FeatureError::InvalidConfig("hop_length must be > 0".to_string()));
        }
        if self.n_mels == 0 {
            return Err(FeatureError::InvalidConfig("n_mels must be > 0".to_string()));
        }
        if self.n_mfcc == 0 || self.n_mfcc > self.n_mels {
            return Err(FeatureError::InvalidConfig(format!(
                "n_mfcc must be in 1..={}, got {}",
                self.n_mels, self.n_mfcc
            )));
        }
        let fmax = self.effective_fmax();
        if self.fmin < 0.0 || fmax <= self.fmin || fmax > nyquist {
            return Err(FeatureError::InvalidConfig(format!(
                "filterbank range {}..{} Hz is invalid for {} Hz audio",
                self.fmin, fmax, self.sample_rate
            )));
        }
        if let Some(top_db) = self.top_db {
            if top_db < 0.0 {
                return Err(FeatureError::InvalidConfig("top_db must be non-negative".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mfcc_config_defaults() {
        let config = MfccConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.n_mfcc, 40);
        assert_eq!(config.n_fft, 2048);
        assert_eq!(config.hop_length, 512);
        assert_eq!(config.n_mels, 128);
        assert_eq!(config.effective_fmax(), 8000.0);
        assert_eq!(config.n_fft_bins(), 1025);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let odd_fft = MfccConfig {
            n_fft: 1023,
            ..Default::default()
        };
        assert!(odd_fft.validate().is_err());

        let too_many_coeffs = MfccConfig {
            n_mfcc: 200,
            ..Default::default()
        };
        assert!(too_many_coeffs.validate().is_err());

        let above_nyquist = MfccConfig {
            fmax: Some(9000.0),
            ..Default::default()
        };
        assert!(above_nyquist.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MfccConfig = serde_json::from_str(r#"{"n_mfcc": 13}"#).unwrap();
        assert_eq!(config.n_mfcc, 13);
        assert_eq!(config.n_mels, 128);
    }
}
