//! Turning a classification into what the user sees.

use serde::{Deserialize, Serialize};

/// Glyph shown when a label has no entry in the table
pub const DEFAULT_GLYPH: &str = "🔊";

/// Emotion name (lowercase) to emoji
const EMOTION_GLYPHS: [(&str, &str); 7] = [
    ("happy", "😊"),
    ("sad", "😢"),
    ("angry", "😠"),
    ("neutral", "😐"),
    ("fear", "😨"),
    ("disgust", "🤢"),
    ("surprise", "😲"),
];

/// Case-insensitive emoji lookup; unknown labels get [`DEFAULT_GLYPH`]
pub fn glyph_for(label: &str) -> &'static str {
    EMOTION_GLYPHS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label.trim()))
        .map(|(_, glyph)| *glyph)
        .unwrap_or(DEFAULT_GLYPH)
}

/// Probability of one class, as a percentage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub percent: f32,
}

/// The result rendered for one upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub display_label: String,
    pub glyph: String,
    /// Probability of the predicted class, in [0, 100]
    pub confidence: f32,
    /// Full distribution in class-index order
    pub probabilities: Vec<ClassProbability>,
}

impl Prediction {
    /// Confidence rounded for display, e.g. "87.3%"
    pub fn confidence_display(&self) -> String {
        format!("{:.1}%", self.confidence)
    }

    /// One-line summary, e.g. "😊 HAPPY (87.3%)"
    pub fn headline(&self) -> String {
        format!(
            "{} {} ({})",
            self.glyph,
            self.display_label,
            self.confidence_display()
        )
    }
}

/// Build the displayed result from a resolved label and the class distribution.
///
/// `class_labels` names each entry of `probabilities`; when it is shorter the
/// distribution is omitted rather than mislabelled.
pub fn present(label: &str, probabilities: &[f32], class_labels: &[String]) -> Prediction {
    let max = probabilities.iter().copied().fold(0.0f32, f32::max);

    let distribution = if class_labels.len() == probabilities.len() {
        class_labels
            .iter()
            .zip(probabilities)
            .map(|(label, p)| ClassProbability {
                label: label.clone(),
                percent: to_percent(*p),
            })
            .collect()
    } else {
        Vec::new()
    };

    Prediction {
        label: label.to_string(),
        display_label: label.to_uppercase(),
        glyph: glyph_for(label).to_string(),
        confidence: to_percent(max),
        probabilities: distribution,
    }
}

fn to_percent(p: f32) -> f32 {
    (p * 100.0).clamp(0.0, 100.0)
}
