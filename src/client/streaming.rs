//! Streaming chat relay
//!
//! Posts a chat request and relays the incremental response to a handler.
//! The relay keeps no conversation state of its own.

use super::handler::ChatEventHandler;
use crate::calculation::CalculationResult;
use crate::config::ClientConfig;
use crate::wire::{ChatError, ChatRequest, FrameDecoder, FrameError, FrameFormat, StreamFrame};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a chat call ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `[DONE]` arrived or the server closed the stream
    Completed,
    /// The caller's token fired; nothing was dispatched after that
    Cancelled,
}

/// Anything that can run one streaming chat call
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run the call, dispatching events to `handler` in wire order
    ///
    /// Failures are reported to `handler.on_error` exactly once and then
    /// returned. Once `cancel` fires, no further handler method runs.
    async fn send(
        &self,
        request: &ChatRequest,
        handler: &mut dyn ChatEventHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, ChatError>;
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn send(
        &self,
        request: &ChatRequest,
        handler: &mut dyn ChatEventHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, ChatError> {
        (**self).send(request, handler, cancel).await
    }
}

/// HTTP client for `POST /api/chat`
#[derive(Debug, Clone)]
pub struct StreamingChatClient {
    client: Client,
    chat_url: String,
}

impl StreamingChatClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ChatError> {
        // No overall timeout: a reply streams for as long as the model talks
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChatError::invalid_request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, config.chat_url()))
    }

    pub fn with_client(client: Client, chat_url: impl Into<String>) -> Self {
        Self {
            client,
            chat_url: chat_url.into(),
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    async fn relay(
        &self,
        request: &ChatRequest,
        handler: &mut dyn ChatEventHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, ChatError> {
        let pending = self
            .client
            .post(&self.chat_url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            result = pending => match result {
                Ok(response) => response,
                Err(e) => return Err(report(handler, ChatError::from_reqwest(&e))),
            },
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
                body = response.text() => body.unwrap_or_default(),
            };
            let detail = error_detail(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("request failed").to_string()
            });
            return Err(report(
                handler,
                ChatError::http(status.as_u16(), format!("HTTP {status}: {detail}")),
            ));
        }

        let format = FrameFormat::from_content_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let mut decoder = FrameDecoder::new(format);
        let mut body = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
                next = body.next() => next,
            };

            let (frames, ended) = match next {
                Some(Ok(bytes)) => (decoder.push(&bytes), false),
                Some(Err(e)) => {
                    return Err(report(
                        handler,
                        ChatError::network(format!("Stream interrupted: {e}")),
                    ));
                }
                None => (decoder.finish(), true),
            };

            for frame in frames {
                if cancel.is_cancelled() {
                    return Ok(StreamOutcome::Cancelled);
                }
                if let ControlFlow::Break(result) = dispatch(frame, handler) {
                    return result;
                }
            }

            if ended {
                if cancel.is_cancelled() {
                    return Ok(StreamOutcome::Cancelled);
                }
                handler.on_done();
                return Ok(StreamOutcome::Completed);
            }
        }
    }
}

#[async_trait]
impl ChatBackend for StreamingChatClient {
    async fn send(
        &self,
        request: &ChatRequest,
        handler: &mut dyn ChatEventHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, ChatError> {
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }
        self.relay(request, handler, cancel).await
    }
}

/// Route one decoded frame; `Break` ends the call
pub(crate) fn dispatch(
    frame: Result<StreamFrame, FrameError>,
    handler: &mut dyn ChatEventHandler,
) -> ControlFlow<Result<StreamOutcome, ChatError>> {
    match frame {
        Ok(StreamFrame::Text(delta)) => handler.on_chunk(&delta),
        Ok(StreamFrame::Calculation(result)) => handler.on_calculation(result),
        Ok(StreamFrame::Suggestions(suggestions)) => handler.on_suggestions(suggestions),
        Ok(StreamFrame::Error(message)) => {
            return ControlFlow::Break(Err(report(handler, ChatError::server(message))));
        }
        Ok(StreamFrame::Done) => {
            handler.on_done();
            return ControlFlow::Break(Ok(StreamOutcome::Completed));
        }
        Err(FrameError::UnknownType(event_type)) => {
            tracing::debug!(event_type = %event_type, "Ignoring unknown stream event");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed stream frame");
        }
    }
    ControlFlow::Continue(())
}

pub(crate) fn report(handler: &mut dyn ChatEventHandler, error: ChatError) -> ChatError {
    tracing::error!(
        kind = ?error.kind,
        status = ?error.status,
        error = %error.message,
        "Chat stream failed"
    );
    handler.on_error(&error);
    error
}

/// Pull a human-readable reason out of an error body (`{"detail": ...}` and friends)
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };
    ["detail", "message", "error"].iter().find_map(|key| match value.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(inner)) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}

// ============================================================================
// Logging wrapper
// ============================================================================

/// Logs every call made through the wrapped backend
pub struct LoggingBackend<B> {
    inner: B,
}

impl<B: ChatBackend> LoggingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

/// Counts events on their way to the real handler
struct CountingHandler<'a> {
    inner: &'a mut dyn ChatEventHandler,
    chunks: usize,
    calculations: usize,
}

impl ChatEventHandler for CountingHandler<'_> {
    fn on_chunk(&mut self, delta: &str) {
        self.chunks += 1;
        self.inner.on_chunk(delta);
    }

    fn on_calculation(&mut self, result: CalculationResult) {
        self.calculations += 1;
        self.inner.on_calculation(result);
    }

    fn on_suggestions(&mut self, suggestions: Vec<String>) {
        self.inner.on_suggestions(suggestions);
    }

    fn on_error(&mut self, error: &ChatError) {
        self.inner.on_error(error);
    }

    fn on_done(&mut self) {
        self.inner.on_done();
    }
}

#[async_trait]
impl<B: ChatBackend> ChatBackend for LoggingBackend<B> {
    async fn send(
        &self,
        request: &ChatRequest,
        handler: &mut dyn ChatEventHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, ChatError> {
        tracing::info!(
            persona = %request.persona_id,
            history_len = request.history.len(),
            "Chat request started"
        );

        let start = std::time::Instant::now();
        let mut counting = CountingHandler {
            inner: handler,
            chunks: 0,
            calculations: 0,
        };
        let result = self.inner.send(request, &mut counting, cancel).await;
        let duration = start.elapsed();

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    persona = %request.persona_id,
                    duration_ms = %duration.as_millis(),
                    chunks = counting.chunks,
                    calculations = counting.calculations,
                    outcome = ?outcome,
                    "Chat request finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    persona = %request.persona_id,
                    duration_ms = %duration.as_millis(),
                    chunks = counting.chunks,
                    error = %e.message,
                    retryable = e.is_retryable(),
                    "Chat request failed"
                );
            }
        }

        result
    }
}
