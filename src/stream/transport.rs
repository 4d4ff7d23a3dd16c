//! One-shot byte channels from a producer to the summary consumer.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use super::encoder::open_summary_stream;
use super::error::{GenerationError, StreamError};
use crate::backends::FragmentSource;
use crate::error::ErrorResponse;
use crate::models::GenerationRequest;

/// Ordered bytes, not aligned to frames. `Err` means abnormal close.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and opens the response byte stream.
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, GenerationError>;
}

// ============================================================================
// HTTP
// ============================================================================

/// Talks to a running summary server over `POST /api/summarize`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/summarize", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(StreamError::from));
            return Ok(Box::pin(bytes));
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status, body))
    }
}

fn error_from_response(status: reqwest::StatusCode, body: String) -> GenerationError {
    if status.is_client_error() {
        return if body.is_empty() {
            GenerationError::Validation(status.to_string())
        } else {
            GenerationError::Validation(body)
        };
    }
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => GenerationError::Backend(err.details),
        Err(_) => GenerationError::Transport(format!("HTTP {}: {}", status, body)),
    }
}

// ============================================================================
// In-process
// ============================================================================

/// Runs the encoder in-process against a fragment source, with no network.
#[derive(Clone)]
pub struct LocalTransport {
    source: Arc<dyn FragmentSource>,
    pacing: Duration,
    chunk_size: Option<usize>,
}

impl LocalTransport {
    pub fn new(source: Arc<dyn FragmentSource>) -> Self {
        Self {
            source,
            pacing: Duration::ZERO,
            chunk_size: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Re-slices the byte stream into pieces of at most `size` bytes,
    /// ignoring frame boundaries.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, GenerationError> {
        request.validate()?;
        let stream = open_summary_stream(self.source.as_ref(), request, self.pacing)
            .await
            .map_err(|e| GenerationError::Backend(e.message))?;

        let Some(size) = self.chunk_size else {
            return Ok(stream);
        };

        let resliced = stream.flat_map(move |item| {
            let pieces: Vec<Result<Bytes, StreamError>> = match item {
                Ok(bytes) => (0..bytes.len())
                    .step_by(size)
                    .map(|start| Ok(bytes.slice(start..(start + size).min(bytes.len()))))
                    .collect(),
                Err(e) => vec![Err(e)],
            };
            futures::stream::iter(pieces)
        });
        Ok(Box::pin(resliced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockSource;
    use crate::backends::mock::DETAILED_SUMMARY;
    use crate::models::SummaryStyle;
    use crate::stream::decoder::FrameDecoder;
    use crate::stream::frame::WireFrame;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let transport = HttpTransport::new("http://localhost:3000/");
        assert_eq!(transport.endpoint(), "http://localhost:3000/api/summarize");
    }

    #[test]
    fn test_error_mapping() {
        let err = error_from_response(
            reqwest::StatusCode::BAD_REQUEST,
            "Content is required".to_string(),
        );
        assert_eq!(err, GenerationError::Validation("Content is required".into()));

        let err = error_from_response(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"Error generating summary","details":"model offline"}"#.to_string(),
        );
        assert_eq!(err, GenerationError::Backend("model offline".into()));

        let err = error_from_response(reqwest::StatusCode::BAD_GATEWAY, "<html>".to_string());
        assert!(matches!(err, GenerationError::Transport(_)));
    }

    #[tokio::test]
    async fn test_local_transport_rejects_empty_content() {
        let transport = LocalTransport::new(Arc::new(MockSource::new()));
        let request = GenerationRequest::new("", SummaryStyle::Concise);
        let err = transport.open(&request).await.err().unwrap();
        assert_eq!(err, GenerationError::Validation("Content is required".into()));
    }

    #[tokio::test]
    async fn test_resliced_stream_decodes_identically() {
        let transport = LocalTransport::new(Arc::new(MockSource::new())).with_chunk_size(3);
        let request = GenerationRequest::new("Test post.", SummaryStyle::Detailed);
        let mut stream = transport.open(&request).await.unwrap();

        let mut decoder = FrameDecoder::new();
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            assert!(chunk.len() <= 3);
            for frame in decoder.push(&chunk).unwrap() {
                if let WireFrame::TextDelta(delta) = frame {
                    text.push_str(&delta);
                }
            }
        }
        decoder.finish().unwrap();
        assert_eq!(text, DETAILED_SUMMARY);
    }
}
