//! JSON bodies returned by the HTTP endpoints.

use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::ErrorKind;
use crate::presentation::Prediction;

/// Generic message shown to the user for any failed upload
pub const GENERIC_FAILURE: &str = "Could not process the audio file.";

/// Successful prediction
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub prediction: Prediction,
}

/// Failure category reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Upload is not usable audio
    Decode,
    /// Audio was fine but no prediction could be made
    Inference,
    /// Request itself was malformed
    Request,
}

impl From<ErrorKind> for FailureKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Decode => FailureKind::Decode,
            ErrorKind::Inference => FailureKind::Inference,
        }
    }
}

/// Error body: generic message plus diagnostic detail
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub request_id: Uuid,
    pub error: String,
    pub kind: FailureKind,
    pub detail: String,
}

/// Liveness and loaded-model summary
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub classes: Vec<String>,
    pub num_features: usize,
    pub timestamp: String,
}
