//! Request handlers for the page, the upload endpoint and health checks.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};

use tracing::{debug, error, warn};
use uuid::Uuid;

use super::routes::AppState;
use super::types::{
    ErrorResponse, FailureKind, HealthResponse, PredictResponse, GENERIC_FAILURE,
};
use crate::pipeline::{ErrorKind, PipelineError};

/// Multipart field carrying the WAV upload
pub const UPLOAD_FIELD: &str = "file";

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// A failed request, rendered as an [`ErrorResponse`]
#[derive(Debug)]
pub struct ApiError {
    request_id: Uuid,
    status: StatusCode,
    kind: FailureKind,
    detail: String,
}

impl ApiError {
    fn request(request_id: Uuid, status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            request_id,
            status,
            kind: FailureKind::Request,
            detail: detail.into(),
        }
    }

    fn pipeline(request_id: Uuid, err: &PipelineError) -> Self {
        let status = match err.kind() {
            ErrorKind::Decode => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Inference => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            request_id,
            status,
            kind: err.kind().into(),
            detail: err.to_string(),
        }
    }

    fn internal(request_id: Uuid, detail: impl Into<String>) -> Self {
        Self {
            request_id,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: FailureKind::Inference,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            request_id: self.request_id,
            error: GENERIC_FAILURE.to_string(),
            kind: self.kind,
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let artifacts = state.pipeline.artifacts();
    Json(HealthResponse {
        healthy: true,
        classes: artifacts.encoder().classes().to_vec(),
        num_features: artifacts.classifier().num_features(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Classify one uploaded WAV file
pub async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let request_id = Uuid::new_v4();

    let bytes = match multipart {
        Ok(mut multipart) => read_upload(request_id, &mut multipart).await,
        Err(rejection) => Err(ApiError::request(
            request_id,
            rejection.status(),
            rejection.body_text(),
        )),
    }
    .inspect_err(|e| warn!("[{}] Rejected upload: {}", request_id, e.detail))?;

    debug!("[{}] Received {} byte upload", request_id, bytes.len());

    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.run(&bytes)).await;

    match outcome {
        Ok(Ok(prediction)) => Ok(Json(PredictResponse {
            request_id,
            prediction,
        })),
        Ok(Err(e)) => {
            warn!("[{}] Prediction failed ({:?}): {}", request_id, e.kind(), e);
            Err(ApiError::pipeline(request_id, &e))
        }
        Err(e) => {
            error!("[{}] Prediction task failed: {}", request_id, e);
            Err(ApiError::internal(request_id, "prediction task failed"))
        }
    }
}

/// Find the upload field and read it fully; other fields are skipped
async fn read_upload(request_id: Uuid, multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::request(request_id, e.status(), e.body_text()))?;

        let Some(field) = field else {
            return Err(ApiError::request(
                request_id,
                StatusCode::BAD_REQUEST,
                format!("missing multipart field '{}'", UPLOAD_FIELD),
            ));
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        return field
            .bytes()
            .await
            .map_err(|e| ApiError::request(request_id, e.status(), e.body_text()));
    }
}
