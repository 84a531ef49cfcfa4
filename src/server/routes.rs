//! Router construction and the serve loop.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use super::handlers::{health_handler, index_handler, predict_handler};
use crate::pipeline::EmotionPipeline;

/// Shared state for the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EmotionPipeline>,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the application router.
///
/// Uploads above `max_upload_bytes` are refused with 413 before the pipeline
/// sees them.
pub fn router(pipeline: Arc<EmotionPipeline>, max_upload_bytes: usize) -> Router {
    let state = AppState { pipeline };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve until Ctrl+C
pub async fn serve(
    pipeline: Arc<EmotionPipeline>,
    bind_addr: &str,
    max_upload_bytes: usize,
) -> Result<(), ServerError> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|source| ServerError::InvalidAddress {
            addr: bind_addr.to_string(),
            source,
        })?;

    let app = router(pipeline, max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("Received Ctrl+C, shutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::MfccConfig;
    use crate::model::{Artifacts, GradientBoostedTrees, LabelEncoder};
    use crate::test_support::{emotion_model_json, encoder_json, wav_bytes};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "voiceemotionboundary";

    fn app(max_upload_bytes: usize) -> Router {
        let model = GradientBoostedTrees::from_json_str(&emotion_model_json(40)).unwrap();
        let encoder = LabelEncoder::from_json_str(&encoder_json()).unwrap();
        let artifacts = Artifacts::new(Arc::new(model), Arc::new(encoder)).unwrap();
        let pipeline = EmotionPipeline::new(MfccConfig::default(), artifacts).unwrap();
        router(Arc::new(pipeline), max_upload_bytes)
    }

    fn multipart_body(field: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"clip.wav\"\r\n",
                field
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload(field: &str, content: &[u8]) -> Request<Body> {
        let body = multipart_body(field, content);
        Request::builder()
            .method("POST")
            .uri("/api/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(1 << 20)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["num_features"], 40);
        assert_eq!(body["classes"].as_array().unwrap().len(), 3);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_index_page() {
        let response = app(1 << 20)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("/api/predict"));
    }

    #[tokio::test]
    async fn test_predict_silence() {
        let wav = wav_bytes(&vec![0.0; 16000], 16000);
        let response = app(1 << 20).oneshot(upload("file", &wav)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["label"], "angry");
        assert_eq!(body["display_label"], "ANGRY");
        assert_eq!(body["glyph"], "😠");
        assert!(body["request_id"].is_string());

        let confidence = body["confidence"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&confidence));
        assert_eq!(body["probabilities"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_corrupt_upload_is_422() {
        let app = app(1 << 20);
        let response = app
            .clone()
            .oneshot(upload("file", b"this is not a wav file"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        assert_eq!(body["error"], "Could not process the audio file.");
        assert_eq!(body["kind"], "decode");
        assert!(!body["detail"].as_str().unwrap().is_empty());

        // Still serving after a bad upload
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_implausible_sample_rate_is_422() {
        // 1 Hz header, small enough to pass the upload limit
        let wav = wav_bytes(&vec![0.0; 1_000_000], 1);
        let app = app(4 << 20);
        let response = app.clone().oneshot(upload("file", &wav)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        assert_eq!(body["kind"], "decode");

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_short_clip_is_422() {
        let wav = wav_bytes(&[0.1; 64], 16000);
        let response = app(1 << 20).oneshot(upload("file", &wav)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_field_is_400() {
        let wav = wav_bytes(&vec![0.0; 4096], 16000);
        let response = app(1 << 20).oneshot(upload("audio", &wav)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["kind"], "request");
    }

    #[tokio::test]
    async fn test_not_multipart_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app(1 << 20).oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_oversized_upload_is_413() {
        let wav = wav_bytes(&vec![0.0; 16000], 16000);
        let response = app(1024).oneshot(upload("file", &wav)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
