//! Turn driver
//!
//! Runs one user turn end to end: records the user message, opens a
//! streaming assistant placeholder, relays the backend's events into the
//! store and finalizes the placeholder exactly once however the call ends.

use super::message::{CoachAttribution, MessageId, NewMessage};
use super::store::ConversationStore;
use crate::calculation::CalculationResult;
use crate::client::{ChatBackend, ChatEventHandler, Coach, CoachApi, StreamOutcome};
use crate::wire::{ChatError, ChatErrorKind, ChatRequest};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Assistant content shown when the call failed below the application layer
pub const TRANSPORT_ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("message is empty")]
    EmptyMessage,
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed,
    /// Aborted by the caller; the reply keeps whatever text had arrived
    Cancelled,
    /// The assistant message carries an error text
    Failed(ChatError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    /// The assistant message this turn produced
    pub message_id: MessageId,
    pub outcome: TurnOutcome,
}

/// A conversation bound to one persona and one backend
pub struct ChatSession<B> {
    backend: B,
    store: ConversationStore,
    persona_id: String,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(backend: B, persona_id: impl Into<String>) -> Self {
        Self {
            backend,
            store: ConversationStore::new(),
            persona_id: persona_id.into(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }

    /// Switch the active persona; the conversation resets when it changes
    pub fn switch_persona(&mut self, persona_id: impl Into<String>) -> bool {
        let persona_id = persona_id.into();
        if persona_id == self.persona_id {
            return false;
        }
        tracing::info!(from = %self.persona_id, to = %persona_id, "Switching persona");
        self.persona_id = persona_id;
        self.store.clear_conversation();
        true
    }

    pub fn clear(&mut self) {
        self.store.clear_conversation();
    }

    /// Run one streaming turn
    ///
    /// Only blank input is an error; every failure of the call itself is
    /// recorded in the conversation and reported as [`TurnOutcome::Failed`].
    pub async fn send_message(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnReport, TurnError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        let history = self.store.history();
        self.store.add_message(NewMessage::user(text));
        let message_id = self.store.add_message(NewMessage::assistant_placeholder());
        let request = ChatRequest::new(text, history, self.persona_id.as_str());

        tracing::info!(
            persona_id = %self.persona_id,
            message_id = %message_id,
            history_len = request.history.len(),
            "Turn started"
        );

        let mut turn = TurnHandler {
            store: &mut self.store,
            message_id: &message_id,
            reply: String::new(),
        };
        let result = self.backend.send(&request, &mut turn, cancel).await;
        let reply = turn.reply;

        let (content, outcome) = match result {
            Ok(StreamOutcome::Completed) => (reply, TurnOutcome::Completed),
            Ok(StreamOutcome::Cancelled) => (reply, TurnOutcome::Cancelled),
            Err(e) if e.kind == ChatErrorKind::Server => {
                (format!("Error: {}", e.message), TurnOutcome::Failed(e))
            }
            Err(e) => (TRANSPORT_ERROR_REPLY.to_string(), TurnOutcome::Failed(e)),
        };
        self.store.update_last_message(&message_id, &content, false);

        tracing::info!(
            message_id = %message_id,
            outcome = outcome_label(&outcome),
            reply_len = content.len(),
            "Turn finished"
        );
        Ok(TurnReport {
            message_id,
            outcome,
        })
    }

    /// Run one non-streaming turn against a marketplace coach
    pub async fn send_coach_message<C: CoachApi + ?Sized>(
        &mut self,
        api: &C,
        coach: &Coach,
        text: &str,
    ) -> Result<TurnReport, TurnError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        let history = self.store.history();
        self.store.add_message(NewMessage::user(text));
        let attribution = CoachAttribution::from(coach);
        let message_id = self
            .store
            .add_message(NewMessage::assistant_placeholder().with_coach(attribution.clone()));

        tracing::info!(coach_id = %coach.id, message_id = %message_id, "Coach turn started");

        let outcome = match api
            .send_coach_message(&coach.id, text, &self.persona_id, &history)
            .await
        {
            Ok(reply) => {
                if !reply.rich_content.is_empty() {
                    self.store.set_rich_content(&message_id, reply.rich_content);
                }
                if !reply.suggestions.is_empty() {
                    self.store.add_follow_up_suggestions(reply.suggestions);
                }
                self.store
                    .update_last_message_as(&message_id, &reply.response, false, attribution);
                TurnOutcome::Completed
            }
            Err(e) => {
                tracing::warn!(coach_id = %coach.id, error = %e, "Coach turn failed");
                self.store
                    .update_last_message(&message_id, TRANSPORT_ERROR_REPLY, false);
                TurnOutcome::Failed(e)
            }
        };

        Ok(TurnReport {
            message_id,
            outcome,
        })
    }
}

fn outcome_label(outcome: &TurnOutcome) -> &'static str {
    match outcome {
        TurnOutcome::Completed => "completed",
        TurnOutcome::Cancelled => "cancelled",
        TurnOutcome::Failed(_) => "failed",
    }
}

/// Folds one call's events into the store
struct TurnHandler<'a> {
    store: &'a mut ConversationStore,
    message_id: &'a MessageId,
    /// Running accumulator; the store only ever sees the full text
    reply: String,
}

impl ChatEventHandler for TurnHandler<'_> {
    fn on_chunk(&mut self, delta: &str) {
        self.reply.push_str(delta);
        self.store
            .update_last_message(self.message_id, &self.reply, true);
    }

    fn on_calculation(&mut self, result: CalculationResult) {
        self.store.add_calculation_result(result);
    }

    fn on_suggestions(&mut self, suggestions: Vec<String>) {
        self.store.add_follow_up_suggestions(suggestions);
    }
}
