//! Test doubles shared across modules
//!
//! A scripted chat backend that replays wire bytes through the real decoder,
//! a recording handler, and an in-process HTTP server.

use crate::calculation::CalculationResult;
use crate::client::{dispatch, report, ChatBackend, ChatEventHandler, StreamOutcome};
use crate::wire::{ChatError, ChatRequest, FrameDecoder, FrameFormat, StreamFrame};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

// ============================================================================
// In-process server
// ============================================================================

pub struct TestServer {
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn serve(router: axum::Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    TestServer {
        base_url: format!("http://{addr}"),
        handle,
    }
}

// ============================================================================
// Recording handler
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Chunk(String),
    Calculation(Value),
    Suggestions(Vec<String>),
    Error(String),
    Done,
}

/// Records every callback; optionally cancels a token after N chunks
#[derive(Default)]
pub struct RecordingHandler {
    pub events: Vec<Recorded>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingHandler {
    pub fn cancelling_after(chunks: usize, token: CancellationToken) -> Self {
        Self {
            events: Vec::new(),
            cancel_after: Some((chunks, token)),
        }
    }

    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                Recorded::Chunk(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Recorded::Error(_)))
            .count()
    }
}

impl ChatEventHandler for RecordingHandler {
    fn on_chunk(&mut self, delta: &str) {
        self.events.push(Recorded::Chunk(delta.to_string()));
        if let Some((after, token)) = &self.cancel_after {
            let chunks = self
                .events
                .iter()
                .filter(|e| matches!(e, Recorded::Chunk(_)))
                .count();
            if chunks >= *after {
                token.cancel();
            }
        }
    }

    fn on_calculation(&mut self, result: CalculationResult) {
        self.events.push(Recorded::Calculation(result.into_value()));
    }

    fn on_suggestions(&mut self, suggestions: Vec<String>) {
        self.events.push(Recorded::Suggestions(suggestions));
    }

    fn on_error(&mut self, error: &ChatError) {
        self.events.push(Recorded::Error(error.message.clone()));
    }

    fn on_done(&mut self) {
        self.events.push(Recorded::Done);
    }
}

// ============================================================================
// Scripted backend
// ============================================================================

/// One step of a scripted reply
#[derive(Debug, Clone)]
pub enum Step {
    /// A frame, encoded the way the backend does
    Frame(StreamFrame),
    /// Raw body bytes, for malformed or split frames
    Bytes(Vec<u8>),
    /// The caller aborts at this point
    Cancel,
    /// The connection drops
    Drop(String),
    /// Non-success status before any body
    Status(u16, String),
}

pub fn text(t: &str) -> Step {
    Step::Frame(StreamFrame::Text(t.to_string()))
}

pub fn calc(value: Value) -> Step {
    Step::Frame(StreamFrame::Calculation(
        CalculationResult::from_value(value).unwrap(),
    ))
}

/// Replays queued scripts, one per call
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, steps: Vec<Step>) -> &Self {
        self.scripts.lock().unwrap().push_back(steps);
        self
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send(
        &self,
        request: &ChatRequest,
        handler: &mut dyn ChatEventHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        let steps = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Step::Drop("No scripted response".to_string())]);

        let mut decoder = FrameDecoder::new(FrameFormat::EventStream);
        for step in steps {
            if cancel.is_cancelled() {
                return Ok(StreamOutcome::Cancelled);
            }
            let bytes = match step {
                Step::Frame(frame) => frame.to_sse().into_bytes(),
                Step::Bytes(bytes) => bytes,
                Step::Cancel => {
                    cancel.cancel();
                    continue;
                }
                Step::Drop(message) => return Err(report(handler, ChatError::network(message))),
                Step::Status(status, message) => {
                    return Err(report(handler, ChatError::http(status, message)));
                }
            };
            for frame in decoder.push(&bytes) {
                if cancel.is_cancelled() {
                    return Ok(StreamOutcome::Cancelled);
                }
                if let ControlFlow::Break(result) = dispatch(frame, handler) {
                    return result;
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }
        for frame in decoder.finish() {
            if cancel.is_cancelled() {
                return Ok(StreamOutcome::Cancelled);
            }
            if let ControlFlow::Break(result) = dispatch(frame, handler) {
                return result;
            }
        }
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }
        handler.on_done();
        Ok(StreamOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_cancel_in_final_flush_skips_done() {
        let backend = ScriptedBackend::new();
        backend.queue(vec![
            text("first"),
            Step::Bytes(b"data: {\"type\":\"text\",\"content\":\"last\"}".to_vec()),
        ]);

        let cancel = CancellationToken::new();
        let mut handler = RecordingHandler::cancelling_after(2, cancel.clone());
        let request = ChatRequest::new("hi", vec![], "user_001");
        let outcome = backend.send(&request, &mut handler, &cancel).await.unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert_eq!(
            handler.events,
            vec![Recorded::Chunk("first".into()), Recorded::Chunk("last".into())]
        );
    }
}
