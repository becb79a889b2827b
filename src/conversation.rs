//! Conversation state and the turn driver that feeds it

mod message;
mod session;
mod store;

#[cfg(test)]
mod proptests;

pub use message::{CoachAttribution, Message, MessageId, NewMessage};
pub use session::{ChatSession, TurnError, TurnOutcome, TurnReport, TRANSPORT_ERROR_REPLY};
pub use store::{ConversationState, ConversationStore};
