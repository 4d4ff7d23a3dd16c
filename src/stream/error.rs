use thiserror::Error;

/// Failure of the byte channel itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("network error: {0}")]
    Network(String),

    #[error("no data received within {0:?}")]
    Timeout(std::time::Duration),

    /// The producer gave up mid-stream and closed the channel abnormally.
    #[error("backend failed mid-stream: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Network(err.to_string())
    }
}

/// A frame that could not be decoded. Never skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("frame has no type tag separator: {0:?}")]
    MissingSeparator(String),

    #[error("unknown frame type tag {0:?}")]
    UnknownTag(String),

    #[error("frame payload is not a JSON string: {0}")]
    InvalidPayload(String),

    #[error("stream ended inside a frame ({0} bytes pending)")]
    Unterminated(usize),

    #[error("frame exceeds {0} bytes without a terminator")]
    BufferOverflow(usize),

    #[error("decoder already failed")]
    Poisoned,
}

/// Why a generation ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<StreamError> for GenerationError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Backend(details) => GenerationError::Backend(details),
            other => GenerationError::Transport(other.to_string()),
        }
    }
}

impl From<crate::error::AppError> for GenerationError {
    fn from(err: crate::error::AppError) -> Self {
        if err.code.is_client_error() {
            GenerationError::Validation(err.message)
        } else {
            GenerationError::Backend(err.details.unwrap_or(err.message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_backend_stream_error_maps_to_backend() {
        let err: GenerationError = StreamError::Backend("model crashed".into()).into();
        assert_eq!(err, GenerationError::Backend("model crashed".into()));
    }

    #[test]
    fn test_network_error_maps_to_transport() {
        let err: GenerationError = StreamError::Network("reset".into()).into();
        assert!(matches!(err, GenerationError::Transport(msg) if msg.contains("reset")));
    }

    #[test]
    fn test_app_error_mapping() {
        let err: GenerationError = AppError::validation("Content is required").into();
        assert_eq!(err, GenerationError::Validation("Content is required".into()));

        let err: GenerationError = AppError::generation_failed("offline").into();
        assert_eq!(err, GenerationError::Backend("offline".into()));
    }
}
