//! Frames multiplexed onto the chat response stream.
//!
//! The wire form is plain UTF-8 text, optionally followed by [`DELIMITER`]
//! and exactly one JSON tool invocation. The delimiter is never escaped, so
//! text frames must not contain it.

use bytes::Bytes;

use crate::models::ToolInvocation;

/// Separates streamed text from the trailing tool payload
pub const DELIMITER: &str = "\n\nTOOL_RESULT:";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Text(String),
    ToolResult(ToolInvocation),
}

impl StreamFrame {
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        match self {
            StreamFrame::Text(text) => Ok(Bytes::from(text.clone())),
            StreamFrame::ToolResult(invocation) => {
                let json = serde_json::to_string(invocation)?;
                Ok(Bytes::from(format!("{}{}", DELIMITER, json)))
            }
        }
    }
}

/// Remove every occurrence of the delimiter from user-visible text
pub fn strip_delimiter(text: &str) -> String {
    text.replace(DELIMITER, "")
}
