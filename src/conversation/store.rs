//! In-memory conversation log
//!
//! Append-only message list with at most one in-flight (streaming) message.
//! Every patch addresses a message by id; a patch whose target no longer
//! exists, or was already finalized, is a silent no-op so that late
//! callbacks from an abandoned turn can never corrupt the log.

use super::message::{CoachAttribution, Message, MessageId, NewMessage};
use crate::calculation::CalculationResult;
use crate::rich_content::RichContentItem;
use crate::wire::{HistoryEntry, Role};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Snapshot a UI renders from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub messages: Vec<Message>,
    /// Most recent calculation as received, before merging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_calculation: Option<CalculationResult>,
    pub suggested_follow_ups: Vec<String>,
}

/// Single-writer conversation store, owned by one session
#[derive(Debug, Default)]
pub struct ConversationStore {
    state: ConversationState,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a message, assigning a fresh id and the current time
    pub fn add_message(&mut self, new: NewMessage) -> MessageId {
        let id = MessageId::generate();
        if new.is_streaming {
            self.finalize_streaming_except(&id);
        }
        tracing::debug!(
            message_id = %id,
            role = new.role.as_str(),
            is_streaming = new.is_streaming,
            "Message added"
        );
        self.state
            .messages
            .push(new.into_message(id.clone(), Utc::now()));
        id
    }

    /// Replace the content and streaming flag of message `id`
    ///
    /// `content` is the full accumulated text, not a delta. Returns `false`
    /// (and changes nothing) when `id` is unknown or already finalized.
    pub fn update_last_message(&mut self, id: &MessageId, content: &str, is_streaming: bool) -> bool {
        self.update_last_message_as(id, content, is_streaming, CoachAttribution::default())
    }

    /// [`update_last_message`](Self::update_last_message) that also
    /// overwrites whichever attribution fields `coach` carries
    pub fn update_last_message_as(
        &mut self,
        id: &MessageId,
        content: &str,
        is_streaming: bool,
        coach: CoachAttribution,
    ) -> bool {
        let Some(index) = self.in_flight_index(id) else {
            return false;
        };
        if is_streaming {
            self.finalize_streaming_except(id);
        }

        let message = &mut self.state.messages[index];
        content.clone_into(&mut message.content);
        message.is_streaming = is_streaming;
        message.coach.apply(coach);
        if !is_streaming {
            tracing::debug!(message_id = %id, content_len = content.len(), "Message finalized");
        }
        true
    }

    /// Attach rich content to an in-flight message
    pub fn set_rich_content(&mut self, id: &MessageId, items: Vec<RichContentItem>) -> bool {
        let Some(index) = self.in_flight_index(id) else {
            return false;
        };
        self.state.messages[index].rich_content = Some(items);
        true
    }

    /// Merge a partial result into the latest assistant message
    ///
    /// `last_calculation` is overwritten whether or not a target exists.
    /// Returns `false` when there is no assistant message to merge into.
    pub fn add_calculation_result(&mut self, result: CalculationResult) -> bool {
        self.state.last_calculation = Some(result.clone());

        let Some(target) = self
            .state
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.role == Role::Assistant)
        else {
            tracing::debug!(
                keys = ?result.keys().collect::<Vec<_>>(),
                "Dropping calculation result with no assistant message"
            );
            return false;
        };

        match target.calculation_result.as_mut() {
            Some(existing) => existing.merge(result),
            None => target.calculation_result = Some(result),
        }
        true
    }

    /// Replace the follow-up suggestions wholesale
    pub fn add_follow_up_suggestions(&mut self, suggestions: Vec<String>) {
        self.state.suggested_follow_ups = suggestions;
    }

    /// Drop every message, suggestion and calculation
    ///
    /// Does not cancel an in-flight call; patches it makes afterwards land
    /// on missing ids and are ignored.
    pub fn clear_conversation(&mut self) {
        tracing::info!(dropped = self.state.messages.len(), "Conversation cleared");
        self.state = ConversationState::default();
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.state.messages.iter().find(|m| &m.id == id)
    }

    pub fn last_calculation(&self) -> Option<&CalculationResult> {
        self.state.last_calculation.as_ref()
    }

    pub fn suggested_follow_ups(&self) -> &[String] {
        &self.state.suggested_follow_ups
    }

    /// The in-flight message, if a turn is streaming
    pub fn streaming_message(&self) -> Option<&Message> {
        self.state.messages.iter().find(|m| m.is_streaming)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming_message().is_some()
    }

    /// Role/content pairs for the next request, oldest first
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state
            .messages
            .iter()
            .map(|m| HistoryEntry::new(m.role, m.content.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.messages.is_empty()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn in_flight_index(&self, id: &MessageId) -> Option<usize> {
        let Some(index) = self.state.messages.iter().position(|m| &m.id == id) else {
            tracing::debug!(message_id = %id, "Ignoring patch for missing message");
            return None;
        };
        if !self.state.messages[index].is_streaming {
            tracing::debug!(message_id = %id, "Ignoring patch for finalized message");
            return None;
        }
        Some(index)
    }

    /// Keep at most one streaming message: finalize any other in place
    fn finalize_streaming_except(&mut self, keep: &MessageId) {
        for message in &mut self.state.messages {
            if message.is_streaming && &message.id != keep {
                tracing::warn!(
                    message_id = %message.id,
                    "Finalizing abandoned streaming message"
                );
                message.is_streaming = false;
            }
        }
    }
}
