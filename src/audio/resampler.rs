use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use super::DecodeError;

/// Sample rate the feature extractor expects
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Input chunk size fed to the FFT resampler
const CHUNK_FRAMES: usize = 1024;

/// Audio resampler wrapper for converting a clip's native rate to 16kHz
pub struct AudioResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<Vec<f32>>,
    output_buffer: Vec<Vec<f32>>,
    input_frames: usize,
    source_rate: u32,
}

impl AudioResampler {
    /// Create a new resampler from `source_rate` to 16kHz
    pub fn new(source_rate: u32) -> Result<Self, DecodeError> {
        if source_rate == 0 {
            return Err(DecodeError::Resample("source sample rate is zero".to_string()));
        }

        let ratio = TARGET_SAMPLE_RATE as f64 / source_rate as f64;
        debug!(
            "Creating resampler: {} Hz -> {} Hz (ratio: {:.4})",
            source_rate, TARGET_SAMPLE_RATE, ratio
        );

        let channels = 1; // Mono

        let resampler = FftFixedIn::new(
            source_rate as usize,
            TARGET_SAMPLE_RATE as usize,
            CHUNK_FRAMES,
            2, // sub_chunks for quality
            channels,
        )
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

        // The resampler may round the chunk size to fit the rate ratio
        let input_frames = resampler.input_frames_next();
        let input_buffer = resampler.input_buffer_allocate(true);
        let output_buffer = resampler.output_buffer_allocate(true);

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            input_frames,
            source_rate,
        })
    }

    /// Get the number of input frames needed for the next process call
    pub fn input_frames_next(&self) -> usize {
        self.input_frames
    }

    /// Process one chunk of exactly `input_frames_next()` samples
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, DecodeError> {
        if input.len() != self.input_frames {
            return Err(DecodeError::Resample(format!(
                "Input length {} doesn't match expected {}",
                input.len(),
                self.input_frames
            )));
        }

        self.input_buffer[0].copy_from_slice(input);

        let (_, output_frames) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;

        Ok(self.output_buffer[0][..output_frames].to_vec())
    }

    /// Resample a whole clip.
    ///
    /// The tail is zero-padded to a full chunk and the resampler delay is
    /// trimmed, so the result holds exactly `ceil(len * 16000 / source_rate)`
    /// samples.
    pub fn resample_all(&mut self, samples: &[f32]) -> Result<Vec<f32>, DecodeError> {
        self.resampler.reset();

        let expected = expected_output_len(samples.len(), self.source_rate);
        let delay = self.resampler.output_delay();
        let needed = expected + delay;

        // Each chunk yields roughly CHUNK_FRAMES * ratio samples; allow slack for
        // the delay before giving up.
        let max_chunks = samples.len() / self.input_frames + delay / 16 + 16;

        let mut output = Vec::with_capacity(needed + self.output_buffer[0].len());
        let mut chunk = vec![0.0f32; self.input_frames];
        let mut offset = 0;
        let mut chunks = 0;

        while output.len() < needed {
            if chunks > max_chunks {
                return Err(DecodeError::Resample(format!(
                    "resampler produced {} of {} samples",
                    output.len(),
                    needed
                )));
            }

            chunk.fill(0.0);
            if offset < samples.len() {
                let end = (offset + self.input_frames).min(samples.len());
                chunk[..end - offset].copy_from_slice(&samples[offset..end]);
            }
            offset += self.input_frames;
            chunks += 1;

            output.extend_from_slice(&self.process(&chunk)?);
        }

        output.drain(..delay);
        output.truncate(expected);
        Ok(output)
    }

    /// Reset the resampler state
    pub fn reset(&mut self) {
        self.resampler.reset();
    }
}

/// Number of 16kHz samples that represent `len` samples at `source_rate`
pub fn expected_output_len(len: usize, source_rate: u32) -> usize {
    (len as u64 * TARGET_SAMPLE_RATE as u64).div_ceil(source_rate as u64) as usize
}
