//! Speech emotion recognition from uploaded WAV clips.
//!
//! An upload is decoded to 16kHz mono, summarised as a mean MFCC vector, scored
//! by a pretrained classifier and rendered as an emotion label with an emoji.

pub mod audio;
pub mod config;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod presentation;
pub mod server;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use pipeline::{EmotionPipeline, ErrorKind, PipelineError};
pub use presentation::Prediction;
