//! Mel power spectrogram.
//!
//! Centered STFT frames with a periodic Hann window, power spectrum via
//! realfft, then a Slaney-style mel filterbank with area normalisation.

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::sync::Arc;

use super::config::MfccConfig;
use super::FeatureError;

/// Linear part of the Slaney mel scale: Hz per mel below `MIN_LOG_HZ`
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Mel spectrogram generator with pre-computed filterbank and FFT plan.
///
/// Holds no per-call buffers so one instance can serve concurrent requests.
pub struct MelSpectrogram {
    n_fft: usize,
    hop_length: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    filterbank: Vec<Vec<f32>>,
    window: Vec<f32>,
}

impl MelSpectrogram {
    pub fn new(config: &MfccConfig) -> Result<Self, FeatureError> {
        config.validate()?;

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.n_fft);

        Ok(Self {
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            fft,
            filterbank: create_mel_filterbank(
                config.n_mels,
                config.n_fft,
                config.sample_rate as f32,
                config.fmin,
                config.effective_fmax(),
            ),
            window: hann_window(config.n_fft),
        })
    }

    pub fn n_mels(&self) -> usize {
        self.filterbank.len()
    }

    /// Number of frames a clip of `len` samples produces once centered
    pub fn n_frames(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Compute the mel power spectrogram.
    ///
    /// Returns one `Vec` of `n_mels` energies per frame.
    pub fn compute(&self, audio: &[f32]) -> Result<Vec<Vec<f32>>, FeatureError> {
        if audio.is_empty() {
            return Err(FeatureError::ClipTooShort {
                samples: 0,
                required: 1,
            });
        }

        let pad = self.n_fft / 2;
        let mut padded = vec![0.0f32; audio.len() + 2 * pad];
        padded[pad..pad + audio.len()].copy_from_slice(audio);

        let n_frames = self.n_frames(audio.len());
        let mut fft_input = self.fft.make_input_vec();
        let mut fft_output: Vec<Complex<f32>> = self.fft.make_output_vec();
        let mut power = vec![0.0f32; fft_output.len()];
        let mut mel_spec = Vec::with_capacity(n_frames);

        for frame_idx in 0..n_frames {
            let start = frame_idx * self.hop_length;
            let frame = &padded[start..start + self.n_fft];

            for ((dst, &sample), &w) in fft_input.iter_mut().zip(frame).zip(&self.window) {
                *dst = sample * w;
            }

            self.fft
                .process(&mut fft_input, &mut fft_output)
                .map_err(|e| FeatureError::Fft(e.to_string()))?;

            for (p, c) in power.iter_mut().zip(&fft_output) {
                *p = c.re * c.re + c.im * c.im;
            }

            let mel_frame: Vec<f32> = self
                .filterbank
                .iter()
                .map(|filter| filter.iter().zip(&power).map(|(f, p)| f * p).sum::<f32>())
                .collect();

            mel_spec.push(mel_frame);
        }

        Ok(mel_spec)
    }
}

/// Periodic Hann window, as used for spectral analysis
fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos()) as f32)
        .collect()
}

/// Convert frequency to the Slaney mel scale (linear below 1 kHz, log above)
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Convert Slaney mel back to frequency
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Create an area-normalised triangular mel filterbank.
///
/// Returns `n_mels` filters, each with `n_fft / 2 + 1` weights.
pub fn create_mel_filterbank(
    n_mels: usize,
    n_fft: usize,
    sample_rate: f32,
    fmin: f32,
    fmax: f32,
) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let sr = sample_rate as f64;

    let fft_freqs: Vec<f64> = (0..n_bins).map(|i| i as f64 * sr / n_fft as f64).collect();

    // n_mels + 2 edges, equally spaced in mel
    let mel_min = hz_to_mel(fmin as f64);
    let mel_max = hz_to_mel(fmax as f64);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut filterbank = Vec::with_capacity(n_mels);

    for i in 0..n_mels {
        let (left, center, right) = (mel_f[i], mel_f[i + 1], mel_f[i + 2]);
        let enorm = 2.0 / (right - left);

        let filter = fft_freqs
            .iter()
            .map(|&f| {
                let lower = (f - left) / (center - left);
                let upper = (right - f) / (right - center);
                (lower.min(upper).max(0.0) * enorm) as f32
            })
            .collect();

        filterbank.push(filter);
    }

    filterbank
}
