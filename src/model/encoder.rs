use serde::Deserialize;
use std::collections::HashMap;

use super::ModelError;

/// On-disk shapes accepted for the encoder: a bare list of class names, or an
/// object carrying them under `classes`.
#[derive(Deserialize)]
#[serde(untagged)]
enum EncoderFile {
    Bare(Vec<String>),
    Wrapped { classes: Vec<String> },
}

/// Bidirectional mapping between class indices and label strings
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self, ModelError> {
        if classes.is_empty() {
            return Err(ModelError::InvalidEncoder("no classes".to_string()));
        }

        let mut index = HashMap::with_capacity(classes.len());
        for (i, label) in classes.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(ModelError::InvalidEncoder(format!("class {} has an empty name", i)));
            }
            if index.insert(label.clone(), i).is_some() {
                return Err(ModelError::InvalidEncoder(format!("duplicate class {:?}", label)));
            }
        }

        Ok(Self { classes, index })
    }

    pub fn from_json_str(content: &str) -> Result<Self, ModelError> {
        let file: EncoderFile = serde_json::from_str(content)
            .map_err(|e| ModelError::InvalidEncoder(format!("JSON: {}", e)))?;
        let classes = match file {
            EncoderFile::Bare(classes) => classes,
            EncoderFile::Wrapped { classes } => classes,
        };
        Self::new(classes)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Label string to class index
    pub fn transform(&self, label: &str) -> Result<usize, ModelError> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| ModelError::UnknownLabel(label.to_string()))
    }

    /// Class index to label string
    pub fn inverse_transform(&self, index: usize) -> Result<&str, ModelError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(ModelError::UnknownClass {
                index,
                classes: self.classes.len(),
            })
    }
}
