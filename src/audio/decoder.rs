use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use tracing::debug;

use super::resampler::{AudioResampler, TARGET_SAMPLE_RATE};
use super::DecodeError;

/// Header sample rates accepted from uploads
pub const SUPPORTED_SAMPLE_RATES: std::ops::RangeInclusive<u32> = 4_000..=384_000;

/// Decoded mono waveform with its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Convert to the 16kHz analysis rate. Clips already at 16kHz pass through.
    pub fn into_target_rate(self) -> Result<AudioClip, DecodeError> {
        if self.sample_rate == TARGET_SAMPLE_RATE {
            return Ok(self);
        }

        debug!(
            "Resampling {} samples from {} Hz to {} Hz",
            self.samples.len(),
            self.sample_rate,
            TARGET_SAMPLE_RATE
        );

        let mut resampler = AudioResampler::new(self.sample_rate)?;
        let samples = resampler.resample_all(&self.samples)?;
        Ok(AudioClip::new(samples, TARGET_SAMPLE_RATE))
    }
}

/// Decode an in-memory WAV file into a mono clip at its native sample rate.
///
/// Integer PCM is scaled into [-1, 1) and multi-channel audio is averaged
/// down to a single channel.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioClip, DecodeError> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(DecodeError::UnsupportedFormat("zero channels".to_string()));
    }
    if !SUPPORTED_SAMPLE_RATES.contains(&spec.sample_rate) {
        return Err(DecodeError::UnsupportedFormat(format!(
            "sample rate {} Hz outside {}..={} Hz",
            spec.sample_rate,
            SUPPORTED_SAMPLE_RATES.start(),
            SUPPORTED_SAMPLE_RATES.end()
        )));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(DecodeError::UnsupportedFormat(format!(
                    "{}-bit float samples",
                    spec.bits_per_sample
                )));
            }
            reader.into_samples::<f32>().collect::<Result<_, _>>()?
        }
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(DecodeError::UnsupportedFormat(format!(
                    "{}-bit integer samples",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    if let Some(pos) = interleaved.iter().position(|s| !s.is_finite()) {
        return Err(DecodeError::NonFiniteSample(pos));
    }

    let samples = downmix_to_mono(&interleaved, spec.channels as usize);
    if samples.is_empty() {
        return Err(DecodeError::EmptyAudio);
    }

    debug!(
        "Decoded WAV: {} Hz, {} channels, {} bits, {} frames",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        samples.len()
    );

    Ok(AudioClip::new(samples, spec.sample_rate))
}

/// Average interleaved frames down to one channel. A trailing partial frame is dropped.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
