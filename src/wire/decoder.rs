//! Incremental frame decoder
//!
//! Network reads arrive in arbitrary pieces. The decoder buffers raw bytes and
//! only decodes a line once its terminating newline has arrived, so a frame
//! (or a multi-byte character) split across reads is reassembled first.

use super::error::FrameError;
use super::types::StreamFrame;
use crate::calculation::CalculationResult;
use serde_json::Value;

/// How frames are delimited on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// `text/event-stream`: `data:` lines, blank line ends a frame
    EventStream,
    /// One payload per line
    NewlineDelimited,
}

impl FrameFormat {
    /// Pick the framing from a `Content-Type` header; event-stream unless told otherwise
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return FrameFormat::EventStream;
        };
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/x-ndjson" | "application/jsonl" | "application/json-lines"
            | "text/plain" => FrameFormat::NewlineDelimited,
            _ => FrameFormat::EventStream,
        }
    }
}

/// Result of decoding one frame
pub type DecodedFrame = Result<StreamFrame, FrameError>;

/// Stateful decoder fed with raw body chunks
#[derive(Debug)]
pub struct FrameDecoder {
    format: FrameFormat,
    buffer: Vec<u8>,
    /// `data:` lines of the event being assembled
    data_lines: Vec<String>,
    /// `event:` field of the event being assembled
    event_name: Option<String>,
}

impl FrameDecoder {
    pub fn new(format: FrameFormat) -> Self {
        Self {
            format,
            buffer: Vec::new(),
            data_lines: Vec::new(),
            event_name: None,
        }
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Number of bytes waiting for a line terminator
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a chunk and collect every frame it completes, in wire order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Vec<DecodedFrame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let mut rest = std::mem::take(&mut self.buffer);
            if rest.last() == Some(&b'\r') {
                rest.pop();
            }
            let line = String::from_utf8_lossy(&rest);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        if let Some(frame) = self.dispatch_event() {
            frames.push(frame);
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<DecodedFrame> {
        match self.format {
            FrameFormat::NewlineDelimited => interpret_payload(None, line),
            FrameFormat::EventStream => {
                if line.is_empty() {
                    return self.dispatch_event();
                }
                if line.starts_with(':') {
                    return None;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                    None => (line, ""),
                };
                match field {
                    "data" => self.data_lines.push(value.to_string()),
                    "event" => self.event_name = Some(value.to_string()),
                    _ => {} // id, retry
                }
                None
            }
        }
    }

    fn dispatch_event(&mut self) -> Option<DecodedFrame> {
        let event_name = self.event_name.take();
        if self.data_lines.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data_lines).join("\n");
        interpret_payload(event_name.as_deref(), &data)
    }
}

/// Turn one payload into a frame
///
/// A payload opening with `{` is a structured event; anything else is a plain
/// text delta and is kept byte for byte.
fn interpret_payload(event_name: Option<&str>, data: &str) -> Option<DecodedFrame> {
    if data.is_empty() {
        return None;
    }
    let trimmed = data.trim();
    if trimmed == "[DONE]" {
        return Some(Ok(StreamFrame::Done));
    }
    if !trimmed.starts_with('{') {
        return Some(Ok(StreamFrame::Text(data.to_string())));
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => return Some(Err(FrameError::malformed(e.to_string()))),
    };
    Some(structured_frame(event_name, value))
}

fn structured_frame(event_name: Option<&str>, value: Value) -> DecodedFrame {
    let Value::Object(mut object) = value else {
        return Err(FrameError::malformed("event payload is not an object"));
    };

    let event_type = match object.get("type").and_then(Value::as_str) {
        Some(t) => t.to_string(),
        None => event_name
            .filter(|name| !name.is_empty() && *name != "message")
            .map(str::to_string)
            .ok_or_else(|| FrameError::malformed("missing event type"))?,
    };

    match event_type.as_str() {
        "text" => match object.remove("content") {
            Some(Value::String(content)) => Ok(StreamFrame::Text(content)),
            _ => Err(FrameError::malformed("text event without string content")),
        },
        "calculation" => object
            .remove("result")
            .and_then(CalculationResult::from_value)
            .map(StreamFrame::Calculation)
            .ok_or_else(|| FrameError::malformed("calculation event without object result")),
        "suggestions" => match object.remove("suggestions") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(FrameError::malformed("non-string suggestion")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(StreamFrame::Suggestions),
            _ => Err(FrameError::malformed("suggestions event without array")),
        },
        "error" => {
            let message = object
                .remove("content")
                .or_else(|| object.remove("message"))
                .and_then(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .unwrap_or_else(|| "Unknown server error".to_string());
            Ok(StreamFrame::Error(message))
        }
        "done" => Ok(StreamFrame::Done),
        other => Err(FrameError::UnknownType(other.to_string())),
    }
}
