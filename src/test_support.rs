//! Shared fixtures for unit tests: small tree models, encoders and WAV bytes.

use hound::{SampleFormat, WavSpec, WavWriter};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Classes of the fixture model, in class-index order
pub(crate) const EMOTION_CLASSES: [&str; 3] = ["angry", "happy", "sad"];

/// A single-leaf tree
pub(crate) fn leaf(value: f64) -> Value {
    json!({
        "left_children": [-1],
        "right_children": [-1],
        "split_indices": [0],
        "split_conditions": [value],
        "default_left": [0]
    })
}

/// A depth-one tree: `x[feature] < threshold` goes to `left`
pub(crate) fn stump(feature: u32, threshold: f64, left: f64, right: f64, default_left: bool) -> Value {
    json!({
        "left_children": [1, -1, -1],
        "right_children": [2, -1, -1],
        "split_indices": [feature, 0, 0],
        "split_conditions": [threshold, left, right],
        "default_left": [default_left, false, false],
        "base_weights": [0.0, left, right],
        "split_type": [0, 0, 0]
    })
}

/// Three-class softprob model keyed on feature 0.
///
/// Silence drives the first MFCC far below -500, which makes "angry" win;
/// louder input favours "happy".
pub(crate) fn emotion_model_json(num_feature: usize) -> String {
    json!({
        "learner": {
            "attributes": {},
            "feature_names": [],
            "feature_types": [],
            "learner_model_param": {
                "base_score": "5E-1",
                "boost_from_average": "1",
                "num_class": "3",
                "num_feature": num_feature.to_string(),
                "num_target": "1"
            },
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "gbtree_model_param": { "num_parallel_tree": "1", "num_trees": "3" },
                    "iteration_indptr": [0, 3],
                    "tree_info": [0, 1, 2],
                    "trees": [
                        stump(0, -500.0, 2.0, -1.0, false),
                        stump(0, -500.0, 0.0, 1.5, false),
                        leaf(0.3)
                    ]
                }
            },
            "objective": {
                "name": "multi:softprob",
                "softmax_multiclass_param": { "num_class": "3" }
            }
        },
        "version": [2, 0, 3]
    })
    .to_string()
}

pub(crate) fn encoder_json() -> String {
    json!({ "classes": EMOTION_CLASSES }).to_string()
}

/// Write the fixture model and encoder into `dir`
pub(crate) fn write_artifacts(dir: &Path) -> (PathBuf, PathBuf) {
    let model_path = dir.join("xgb_model.json");
    let encoder_path = dir.join("label_encoder.json");
    std::fs::write(&model_path, emotion_model_json(40)).unwrap();
    std::fs::write(&encoder_path, encoder_json()).unwrap();
    (model_path, encoder_path)
}

/// Encode mono samples as a 16-bit PCM WAV in memory
pub(crate) fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    wav_bytes_channels(samples, sample_rate, 1)
}

/// Encode interleaved samples as a 16-bit PCM WAV with `channels` channels
pub(crate) fn wav_bytes_channels(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer
                .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Encode samples as a 32-bit float mono WAV in memory
pub(crate) fn wav_bytes_f32(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub(crate) fn sine(freq_hz: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            amplitude * (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate as f32).sin()
        })
        .collect()
}
