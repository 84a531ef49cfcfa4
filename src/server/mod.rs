//! HTTP front end for the emotion pipeline.
//!
//! ## Endpoints
//!
//! - `GET /` - single page with upload form, audio preview and result panel
//! - `POST /api/predict` - multipart upload with a `file` field holding a WAV clip
//! - `GET /health` - liveness plus the loaded class list
//!
//! A successful prediction returns:
//!
//! ```json
//! {
//!     "request_id": "6f1c...",
//!     "label": "happy",
//!     "display_label": "HAPPY",
//!     "glyph": "😊",
//!     "confidence": 87.3,
//!     "probabilities": [{ "label": "angry", "percent": 4.1 }, ...]
//! }
//! ```
//!
//! Failures return `{request_id, error, kind, detail}` with 422 for uploads that
//! are not usable audio, 500 for inference failures and 400/413 for malformed
//! or oversized requests.

mod handlers;
mod routes;
mod types;

pub use handlers::UPLOAD_FIELD;
pub use routes::{router, serve, AppState, ServerError};
pub use types::{ErrorResponse, FailureKind, HealthResponse, PredictResponse, GENERIC_FAILURE};
