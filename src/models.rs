use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{AppError, Result};

pub const CONTENT_REQUIRED: &str = "Content is required";
pub const STYLE_INVALID: &str = "Style must be one of: concise, detailed";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Concise,
    Detailed,
}

/// A document to summarize. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub content: String,
    #[serde(default)]
    pub style: SummaryStyle,
}

impl GenerationRequest {
    pub fn new(content: impl Into<String>, style: SummaryStyle) -> Self {
        Self {
            content: content.into(),
            style,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(AppError::validation(CONTENT_REQUIRED));
        }
        Ok(())
    }
}

/// Raw `POST /api/summarize` body. Fields stay loose so that missing
/// content and unknown styles map to the documented 400 responses instead
/// of a deserializer rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummarizeBody {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

impl TryFrom<SummarizeBody> for GenerationRequest {
    type Error = AppError;

    fn try_from(body: SummarizeBody) -> Result<Self> {
        let style = match body.style.as_deref() {
            None => SummaryStyle::default(),
            Some(raw) => raw
                .parse::<SummaryStyle>()
                .map_err(|_| AppError::validation(STYLE_INVALID))?,
        };
        let request = GenerationRequest::new(body.content.unwrap_or_default(), style);
        request.validate()?;
        Ok(request)
    }
}
