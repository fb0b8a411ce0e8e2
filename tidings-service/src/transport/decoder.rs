//! Client side: incremental parser for the chat response stream.

use tracing::{debug, warn};

use super::frame::DELIMITER;
use crate::models::ToolInvocation;

/// Upper bound on the buffered tool payload
pub const MAX_PAYLOAD_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Accumulating text, watching for the delimiter
    Scanning,
    /// Delimiter seen, accumulating the JSON tail
    CollectingPayload,
    /// Final message produced; further input is ignored
    Done,
}

/// A fully decoded assistant turn
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub content: String,
    pub invocation: Option<ToolInvocation>,
}

/// Splits streamed text from the trailing tool payload.
///
/// Works on the cumulative stream, so the delimiter and multi-byte characters
/// may be split across increments arbitrarily.
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecoderState,
    /// Bytes of an incomplete UTF-8 sequence at the end of the last increment
    carry: Vec<u8>,
    text: String,
    payload: String,
    payload_cap: usize,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::with_payload_cap(MAX_PAYLOAD_BYTES)
    }

    pub fn with_payload_cap(payload_cap: usize) -> Self {
        Self {
            state: DecoderState::Scanning,
            carry: Vec::new(),
            text: String::new(),
            payload: String::new(),
            payload_cap,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Text safe to render: everything before the delimiter, minus any tail
    /// that could still turn out to be the start of it
    pub fn visible_text(&self) -> &str {
        match self.state {
            DecoderState::Scanning => {
                let held = partial_delimiter_len(&self.text);
                &self.text[..self.text.len() - held]
            }
            _ => &self.text,
        }
    }

    /// Feed the next increment. Returns the final message once, as soon as a
    /// complete payload has been parsed.
    pub fn push(&mut self, chunk: &[u8]) -> Option<DecodedMessage> {
        if self.state == DecoderState::Done {
            return None;
        }

        let decoded = self.decode_utf8(chunk);
        match self.state {
            DecoderState::Scanning => {
                // Only the tail that may overlap a straddling delimiter needs rescanning
                let mut from = self.text.len().saturating_sub(DELIMITER.len() - 1);
                while !self.text.is_char_boundary(from) {
                    from -= 1;
                }
                self.text.push_str(&decoded);

                if let Some(offset) = self.text[from..].find(DELIMITER) {
                    let at = from + offset;
                    self.payload = self.text[at + DELIMITER.len()..].to_string();
                    self.text.truncate(at);
                    self.state = DecoderState::CollectingPayload;
                    debug!(text_len = self.text.len(), "Stream delimiter found");
                    self.check_payload()
                } else {
                    None
                }
            }
            DecoderState::CollectingPayload => {
                self.payload.push_str(&decoded);
                self.check_payload()
            }
            DecoderState::Done => None,
        }
    }

    /// The stream ended. Returns the final message unless one was already
    /// produced by [`push`](Self::push).
    pub fn finish(&mut self) -> Option<DecodedMessage> {
        if !self.carry.is_empty() {
            self.text.push('\u{FFFD}');
            self.carry.clear();
        }

        match self.state {
            DecoderState::Done => None,
            DecoderState::Scanning => Some(self.complete(None)),
            DecoderState::CollectingPayload => {
                let invocation = self.parse_payload();
                if invocation.is_none() {
                    warn!(
                        payload_len = self.payload.len(),
                        "Stream ended with an unparseable tool payload; keeping text only"
                    );
                }
                Some(self.complete(invocation))
            }
        }
    }

    fn check_payload(&mut self) -> Option<DecodedMessage> {
        if self.payload.len() > self.payload_cap {
            warn!(
                payload_len = self.payload.len(),
                cap = self.payload_cap,
                "Tool payload exceeded buffer cap; keeping text only"
            );
            return Some(self.complete(None));
        }

        if !self.payload.trim_end().ends_with('}') {
            return None;
        }
        self.parse_payload().map(|invocation| self.complete(Some(invocation)))
    }

    fn parse_payload(&self) -> Option<ToolInvocation> {
        serde_json::from_str(self.payload.trim()).ok()
    }

    fn complete(&mut self, invocation: Option<ToolInvocation>) -> DecodedMessage {
        self.state = DecoderState::Done;
        self.payload = String::new();
        DecodedMessage {
            content: self.text.trim().to_string(),
            invocation,
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(invalid) => {
                            out.push('\u{FFFD}');
                            rest = &after[invalid..];
                        }
                        None => {
                            self.carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the delimiter
fn partial_delimiter_len(text: &str) -> usize {
    (1..DELIMITER.len())
        .rev()
        .find(|&k| text.ends_with(&DELIMITER[..k]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolName;
    use crate::transport::frame::StreamFrame;

    fn weather_invocation() -> ToolInvocation {
        let mut args = serde_json::Map::new();
        args.insert("location".to_string(), serde_json::json!("Tokyo"));
        ToolInvocation {
            tool_name: ToolName::GetWeather,
            args,
            result: serde_json::json!({"city": "Tokyo", "description": "näher, 東京 ☀"}),
        }
    }

    fn wire(text: &str, invocation: Option<&ToolInvocation>) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        if let Some(inv) = invocation {
            let frame = StreamFrame::ToolResult(inv.clone()).to_bytes().unwrap();
            bytes.extend_from_slice(&frame);
        }
        bytes
    }

    /// Feed `bytes` in fixed-size chunks, returning the final message
    fn decode_in_chunks(bytes: &[u8], size: usize) -> DecodedMessage {
        let mut decoder = StreamDecoder::new();
        for chunk in bytes.chunks(size) {
            if let Some(done) = decoder.push(chunk) {
                return done;
            }
        }
        decoder.finish().unwrap()
    }

    #[test]
    fn test_plain_text_round_trip() {
        let decoded = decode_in_chunks(&wire("Hello there ", None), 4);
        assert_eq!(decoded.content, "Hello there");
        assert!(decoded.invocation.is_none());
    }

    #[test]
    fn test_tool_round_trip_at_every_chunk_size() {
        let invocation = weather_invocation();
        let bytes = wire("Weather info: ", Some(&invocation));
        for size in 1..=bytes.len() {
            let decoded = decode_in_chunks(&bytes, size);
            assert_eq!(decoded.content, "Weather info:", "chunk size {size}");
            assert_eq!(decoded.invocation.as_ref(), Some(&invocation), "chunk size {size}");
        }
    }

    #[test]
    fn test_partial_delimiter_is_held_back() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.push(b"Hi \n\nTOOL_").is_none());
        assert_eq!(decoder.visible_text(), "Hi ");
        assert_eq!(decoder.state(), DecoderState::Scanning);

        assert!(decoder.push(b"RESULT:{\"toolName\"").is_none());
        assert_eq!(decoder.state(), DecoderState::CollectingPayload);
        assert_eq!(decoder.visible_text(), "Hi ");
    }

    #[test]
    fn test_newlines_that_are_not_the_delimiter_are_released() {
        let mut decoder = StreamDecoder::new();
        decoder.push(b"line one\n\n");
        assert_eq!(decoder.visible_text(), "line one");
        decoder.push(b"line two");
        assert_eq!(decoder.visible_text(), "line one\n\nline two");
    }

    #[test]
    fn test_split_multibyte_characters_are_reassembled() {
        let text = "Grüße aus 東京 ";
        let decoded = decode_in_chunks(text.as_bytes(), 1);
        assert_eq!(decoded.content, "Grüße aus 東京");
    }

    #[test]
    fn test_brace_inside_string_keeps_collecting() {
        let mut decoder = StreamDecoder::new();
        let payload = br#"{"toolName":"getWeather","args":{},"result":{"note":"}"}}"#;
        decoder.push(b"Text\n\nTOOL_RESULT:");
        // Ends with '}' but is not yet a complete object
        assert!(decoder.push(&payload[..payload.len() - 3]).is_none());
        assert_eq!(decoder.state(), DecoderState::CollectingPayload);
        let done = decoder.push(&payload[payload.len() - 3..]).unwrap();
        assert_eq!(done.content, "Text");
        assert!(done.invocation.is_some());
    }

    #[test]
    fn test_unparseable_tail_degrades_to_text() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.push(b"Partial answer\n\nTOOL_RESULT:{\"toolName\":").is_none());
        let done = decoder.finish().unwrap();
        assert_eq!(done.content, "Partial answer");
        assert!(done.invocation.is_none());
    }

    #[test]
    fn test_payload_cap_is_enforced() {
        let mut decoder = StreamDecoder::with_payload_cap(16);
        decoder.push(b"Text\n\nTOOL_RESULT:{\"toolName\":");
        let done = decoder.push(b"\"getWeather\",\"args\":{}").unwrap();
        assert_eq!(done.content, "Text");
        assert!(done.invocation.is_none());
        assert_eq!(decoder.state(), DecoderState::Done);
    }

    #[test]
    fn test_input_after_done_is_ignored() {
        let invocation = weather_invocation();
        let mut decoder = StreamDecoder::new();
        assert!(decoder.push(&wire("Done ", Some(&invocation))).is_some());
        assert!(decoder.push(b"trailing junk").is_none());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_partial_delimiter_len() {
        assert_eq!(partial_delimiter_len("abc"), 0);
        assert_eq!(partial_delimiter_len("abc\n"), 1);
        assert_eq!(partial_delimiter_len("abc\n\nTOOL_RESULT"), DELIMITER.len() - 1);
    }
}
