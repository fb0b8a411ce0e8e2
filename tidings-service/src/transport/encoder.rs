//! Server side: paced word stream followed by the tool frame.

use bytes::Bytes;
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, warn};

use super::frame::{self, StreamFrame};
use crate::config::AssistantConfig;
use crate::models::ToolInvocation;

/// Delays between emitted frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub word_delay: Duration,
    pub settle_delay: Duration,
}

impl Cadence {
    pub fn from_config(config: &AssistantConfig) -> Self {
        Self {
            word_delay: config.word_delay(),
            settle_delay: config.settle_delay(),
        }
    }

    /// No pauses at all
    pub fn immediate() -> Self {
        Self {
            word_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
        }
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::from_config(&AssistantConfig::default())
    }
}

/// Encode one assistant turn as a byte stream.
///
/// Each space-separated word of `preface` is emitted with a trailing space,
/// one per `word_delay`. With an invocation, the stream then pauses for
/// `settle_delay` and emits the delimiter and JSON payload as one frame.
/// The stream ends after that and never yields again.
pub fn encode(
    preface: String,
    invocation: Option<ToolInvocation>,
    cadence: Cadence,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        let preface = if preface.contains(frame::DELIMITER) {
            warn!("Preface contained the stream delimiter; removing it");
            frame::strip_delimiter(&preface)
        } else {
            preface
        };

        if !preface.is_empty() {
            for word in preface.split(' ') {
                yield Ok(Bytes::from(format!("{} ", word)));
                if !cadence.word_delay.is_zero() {
                    tokio::time::sleep(cadence.word_delay).await;
                }
            }
        }

        if let Some(invocation) = invocation {
            if !cadence.settle_delay.is_zero() {
                tokio::time::sleep(cadence.settle_delay).await;
            }
            match StreamFrame::ToolResult(invocation).to_bytes() {
                Ok(bytes) => yield Ok(bytes),
                Err(e) => warn!(error = %e, "Failed to serialize tool invocation; closing with text only"),
            }
        }

        debug!("Response stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolName;
    use futures::StreamExt;

    async fn collect(stream: impl Stream<Item = Result<Bytes, Infallible>>) -> Vec<String> {
        stream
            .map(|chunk| String::from_utf8(chunk.unwrap().to_vec()).unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_words_carry_trailing_spaces() {
        let chunks = collect(encode("Hello there".to_string(), None, Cadence::immediate())).await;
        assert_eq!(chunks, vec!["Hello ", "there "]);
    }

    #[tokio::test]
    async fn test_tool_frame_is_last() {
        let invocation = ToolInvocation {
            tool_name: ToolName::GetStockPrice,
            args: serde_json::Map::new(),
            result: serde_json::json!({"symbol": "AAPL"}),
        };
        let chunks = collect(encode(
            "Quote:".to_string(),
            Some(invocation),
            Cadence::immediate(),
        ))
        .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "Quote: ");
        assert!(chunks[1].starts_with(frame::DELIMITER));
        assert!(chunks[1].ends_with('}'));
    }

    #[tokio::test]
    async fn test_delimiter_in_preface_is_removed() {
        let chunks = collect(encode(
            format!("a{}b", frame::DELIMITER),
            None,
            Cadence::immediate(),
        ))
        .await;
        assert_eq!(chunks.concat(), "ab ");
    }

    #[tokio::test]
    async fn test_words_are_paced() {
        let cadence = Cadence {
            word_delay: Duration::from_millis(10),
            settle_delay: Duration::from_millis(10),
        };
        let started = std::time::Instant::now();
        let chunks = collect(encode("one two three".to_string(), None, cadence)).await;
        assert_eq!(chunks.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
