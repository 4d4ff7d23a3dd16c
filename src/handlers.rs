use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::Response;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::error::*;
use crate::init::AppState;
use crate::models::{GenerationRequest, SummarizeBody};
use crate::stream::open_summary_stream;

pub fn create_app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/summarize",
            axum::routing::post(summarize_handler),
        )
        .route("/health", axum::routing::get(health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ============================================================================
// SUMMARY STREAM HANDLER
// ============================================================================

/// Handler for streaming a summary
///
/// POST /api/summarize
/// Body: `{"content": string, "style": "concise" | "detailed"}`
///
/// Returns: `text/plain` body of `0:"<fragment>"\n` frames
pub async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response> {
    let request_id = Uuid::now_v7();
    stream_summary(&state, request_id, &body)
        .await
        .inspect_err(|err| {
            log::info!("📭 [{}] summary request rejected", request_id);
            log_error(err);
        })
}

async fn stream_summary(state: &AppState, request_id: Uuid, body: &[u8]) -> Result<Response> {
    let body: SummarizeBody = serde_json::from_slice(body)?;
    let request = GenerationRequest::try_from(body)?;

    log::info!(
        "📨 [{}] summarize style={} chars={} backend={}",
        request_id,
        request.style,
        request.content.len(),
        state.source.name()
    );

    let stream = open_summary_stream(
        state.source.as_ref(),
        &request,
        state.config.fragment_delay,
    )
    .await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::internal(format!("Response build failed: {}", e)))
}

// ============================================================================
// HEALTH
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "backend": state.source.name(),
    }))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::CONCISE_SUMMARY;
    use crate::backends::{BackendError, FragmentSource, FragmentStream, MockSource};
    use crate::controller::{LifecycleController, LifecycleState};
    use crate::init::Config;
    use crate::models::SummaryStyle;
    use crate::stream::{GenerationError, HttpTransport};
    use crate::stream::{FrameDecoder, WireFrame};
    use async_trait::async_trait;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct BrokenSource;

    #[async_trait]
    impl FragmentSource for BrokenSource {
        async fn fragments(
            &self,
            _: &GenerationRequest,
        ) -> std::result::Result<FragmentStream, BackendError> {
            Err(BackendError::new("model not loaded"))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    /// Yields two words and then fails.
    struct FailsMidStream;

    #[async_trait]
    impl FragmentSource for FailsMidStream {
        async fn fragments(
            &self,
            _: &GenerationRequest,
        ) -> std::result::Result<FragmentStream, BackendError> {
            Ok(Box::pin(futures::stream::iter(vec![
                Ok("Hello".to_string()),
                Ok("there".to_string()),
                Err(BackendError::new("boom")),
            ])))
        }

        fn name(&self) -> &'static str {
            "fails-mid-stream"
        }
    }

    fn app(source: Arc<dyn FragmentSource>) -> Router {
        let config = Config {
            fragment_delay: Duration::ZERO,
            ..Config::default()
        };
        create_app_router(Arc::new(AppState { source, config }))
    }

    /// Serves the router on an ephemeral port and returns its base URL.
    async fn serve(source: Arc<dyn FragmentSource>, pacing: Duration) -> String {
        let config = Config {
            fragment_delay: pacing,
            ..Config::default()
        };
        let router = create_app_router(Arc::new(AppState { source, config }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        format!("http://{}", addr)
    }

    fn post(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/summarize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_concise_mock_stream() {
        let response = app(Arc::new(MockSource::new()))
            .oneshot(post(r#"{"content":"Test post.","style":"concise"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");

        let body = body_bytes(response).await;
        assert!(body.starts_with(b"0:\"This\"\n0:\" blog\"\n"));

        let mut decoder = FrameDecoder::new();
        let text: String = decoder
            .push(&body)
            .unwrap()
            .into_iter()
            .map(|frame| match frame {
                WireFrame::TextDelta(delta) => delta,
                WireFrame::Error(e) => panic!("unexpected error frame {e}"),
            })
            .collect();
        decoder.finish().unwrap();
        assert_eq!(text, CONCISE_SUMMARY);
    }

    #[tokio::test]
    async fn test_empty_content_is_400() {
        let response = app(Arc::new(MockSource::new()))
            .oneshot(post(r#"{"content":""}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(&body_bytes(response).await[..], b"Content is required");
    }

    #[tokio::test]
    async fn test_missing_content_is_400() {
        let response = app(Arc::new(MockSource::new()))
            .oneshot(post(r#"{"style":"detailed"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(&body_bytes(response).await[..], b"Content is required");
    }

    #[tokio::test]
    async fn test_unknown_style_is_400() {
        let response = app(Arc::new(MockSource::new()))
            .oneshot(post(r#"{"content":"Test post.","style":"verbose"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backend_failure_is_500_json() {
        let response = app(Arc::new(BrokenSource))
            .oneshot(post(r#"{"content":"Test post."}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Error generating summary",
                "details": "model not loaded"
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_500_json() {
        let response = app(Arc::new(MockSource::new()))
            .oneshot(post("not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.error, GENERATION_FAILED);
        assert!(!body.details.is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let response = app(Arc::new(MockSource::new()))
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["backend"], "mock");
    }

    #[tokio::test]
    async fn test_http_consumer_receives_full_summary() {
        let base_url = serve(Arc::new(MockSource::new()), Duration::ZERO).await;
        let controller = LifecycleController::new(Arc::new(HttpTransport::new(&base_url)));

        controller.generate(GenerationRequest::new("Test post.", SummaryStyle::Concise));
        let state = controller.wait_until_settled().await;
        assert_eq!(
            state,
            LifecycleState::Succeeded {
                text: CONCISE_SUMMARY.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_http_consumer_sees_mid_stream_backend_error() {
        for pacing in [Duration::ZERO, Duration::from_millis(10)] {
            let base_url = serve(Arc::new(FailsMidStream), pacing).await;
            let controller = LifecycleController::new(Arc::new(HttpTransport::new(&base_url)));

            controller.generate(GenerationRequest::new("Test post.", SummaryStyle::Concise));
            let state = controller.wait_until_settled().await;
            assert_eq!(
                state,
                LifecycleState::Failed {
                    error: GenerationError::Backend("boom".to_string()),
                    partial: "Hello there".to_string(),
                },
                "pacing {:?}",
                pacing
            );
        }
    }
}
