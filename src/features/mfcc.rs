use std::f64::consts::PI;
use tracing::debug;

use super::config::MfccConfig;
use super::mel::MelSpectrogram;
use super::{FeatureError, FeatureVector};
use crate::audio::AudioClip;

/// Floor applied before taking the log of mel energies
const AMIN: f32 = 1e-10;

/// Time-averaged MFCC extractor.
///
/// Stateless after construction; `extract` takes `&self` and is safe to share
/// between request handlers.
pub struct MfccExtractor {
    config: MfccConfig,
    mel: MelSpectrogram,
    dct: Vec<Vec<f32>>,
}

impl std::fmt::Debug for MfccExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfccExtractor")
            .field("config", &self.config)
            .finish()
    }
}

impl MfccExtractor {
    pub fn new(config: MfccConfig) -> Result<Self, FeatureError> {
        let mel = MelSpectrogram::new(&config)?;
        let dct = dct_ortho_matrix(config.n_mfcc, config.n_mels);
        Ok(Self { config, mel, dct })
    }

    pub fn config(&self) -> &MfccConfig {
        &self.config
    }

    /// Length of every vector this extractor produces
    pub fn n_coefficients(&self) -> usize {
        self.config.n_mfcc
    }

    /// Per-frame MFCCs: one `Vec` of `n_mfcc` coefficients per frame
    pub fn mfcc_frames(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>, FeatureError> {
        let mut spec = self.mel.compute(samples)?;
        power_to_db(&mut spec, self.config.top_db);

        Ok(spec
            .iter()
            .map(|frame| {
                self.dct
                    .iter()
                    .map(|basis| basis.iter().zip(frame).map(|(b, x)| b * x).sum::<f32>())
                    .collect()
            })
            .collect())
    }

    /// Extract the time-averaged MFCC vector from a 16kHz mono clip
    pub fn extract(&self, clip: &AudioClip) -> Result<FeatureVector, FeatureError> {
        if clip.sample_rate != self.config.sample_rate {
            return Err(FeatureError::SampleRateMismatch {
                expected: self.config.sample_rate,
                actual: clip.sample_rate,
            });
        }

        let required = self.config.min_clip_samples.max(1);
        if clip.len() < required {
            return Err(FeatureError::ClipTooShort {
                samples: clip.len(),
                required,
            });
        }

        // The dB floor would otherwise turn NaN energies into silence
        if clip.samples.iter().any(|s| !s.is_finite()) {
            return Err(FeatureError::NonFinite);
        }

        let frames = self.mfcc_frames(&clip.samples)?;
        let n_frames = frames.len() as f32;

        let mut mean = vec![0.0f32; self.config.n_mfcc];
        for frame in &frames {
            for (m, c) in mean.iter_mut().zip(frame) {
                *m += c;
            }
        }
        for m in mean.iter_mut() {
            *m /= n_frames;
        }

        if mean.iter().any(|v| !v.is_finite()) {
            return Err(FeatureError::NonFinite);
        }

        debug!(
            "Extracted {} MFCCs over {} frames ({:.2}s)",
            mean.len(),
            frames.len(),
            clip.duration_secs()
        );

        Ok(FeatureVector::new(mean))
    }
}

/// Convert power to decibels in place, relative to a reference of 1.0.
///
/// With `top_db`, values are floored at `max - top_db` across the whole
/// spectrogram.
fn power_to_db(spec: &mut [Vec<f32>], top_db: Option<f32>) {
    let mut max_db = f32::NEG_INFINITY;
    for v in spec.iter_mut().flatten() {
        *v = 10.0 * v.max(AMIN).log10();
        max_db = max_db.max(*v);
    }

    if let Some(top_db) = top_db {
        let floor = max_db - top_db;
        for v in spec.iter_mut().flatten() {
            *v = v.max(floor);
        }
    }
}

/// Rows of the orthonormal DCT-II, truncated to the first `n_out` coefficients
fn dct_ortho_matrix(n_out: usize, n_in: usize) -> Vec<Vec<f32>> {
    let n = n_in as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| (scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos()) as f32)
                .collect()
        })
        .collect()
}
