//! Line-oriented wire frames: `<tag>:<json string>\n`.
//!
//! JSON string escaping never produces a raw `\n`, so the newline is an
//! unambiguous terminator and frames can be concatenated freely.

use bytes::Bytes;

use super::error::DecodeError;

pub const TEXT_DELTA_TAG: &str = "0";
pub const ERROR_TAG: &str = "3";
pub const FRAME_TERMINATOR: u8 = b'\n';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// `0:"..."` - a piece of the generated text.
    TextDelta(String),
    /// `3:"..."` - the producer failed, payload is the error description.
    Error(String),
}

impl WireFrame {
    pub fn tag(&self) -> &'static str {
        match self {
            WireFrame::TextDelta(_) => TEXT_DELTA_TAG,
            WireFrame::Error(_) => ERROR_TAG,
        }
    }

    fn payload(&self) -> &str {
        match self {
            WireFrame::TextDelta(text) | WireFrame::Error(text) => text,
        }
    }

    pub fn encode(&self) -> Bytes {
        // Serializing a &str cannot fail.
        let quoted = serde_json::to_string(self.payload()).unwrap_or_else(|_| "\"\"".to_string());
        let mut line = String::with_capacity(self.tag().len() + quoted.len() + 2);
        line.push_str(self.tag());
        line.push(':');
        line.push_str(&quoted);
        line.push(FRAME_TERMINATOR as char);
        Bytes::from(line)
    }

    /// Parses one frame without its terminator.
    pub fn parse(line: &[u8]) -> Result<Self, DecodeError> {
        let line = std::str::from_utf8(line).map_err(|_| DecodeError::InvalidUtf8)?;
        let (tag, payload) = line
            .split_once(':')
            .ok_or_else(|| DecodeError::MissingSeparator(line.to_string()))?;

        let text = |payload: &str| {
            serde_json::from_str::<String>(payload)
                .map_err(|e| DecodeError::InvalidPayload(e.to_string()))
        };

        match tag {
            TEXT_DELTA_TAG => Ok(WireFrame::TextDelta(text(payload)?)),
            ERROR_TAG => Ok(WireFrame::Error(text(payload)?)),
            other => Err(DecodeError::UnknownTag(other.to_string())),
        }
    }
}
