//! Fragment sources: where the summary text comes from.

pub mod mock;
pub mod ollama;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::models::GenerationRequest;

pub use mock::MockSource;
pub use ollama::OllamaSource;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Lazy, finite, non-restartable sequence of words.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Starts generation. An `Err` here means nothing was produced.
    async fn fragments(&self, request: &GenerationRequest) -> Result<FragmentStream, BackendError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Mock,
    Ollama,
}

/// Splits text on single spaces the way fragments go over the wire.
pub fn split_words(text: &str) -> FragmentStream {
    let words: Vec<Result<String, BackendError>> =
        text.split(' ').map(|w| Ok(w.to_string())).collect();
    Box::pin(futures::stream::iter(words))
}

pub fn build_source(
    kind: BackendKind,
    ai_config: &crate::init::AiConfig,
) -> Result<Arc<dyn FragmentSource>, BackendError> {
    let source: Arc<dyn FragmentSource> = match kind {
        BackendKind::Mock => Arc::new(MockSource::new()),
        BackendKind::Ollama => Arc::new(OllamaSource::new(&ai_config.url, &ai_config.model)?),
    };
    Ok(source)
}
