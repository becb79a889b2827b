//! Coach Chat - streaming chat core for a homeownership-readiness coach
//!
//! Consumes the coach backend's incremental event stream and folds it into
//! an in-memory conversation log that a UI can render directly.

pub mod calculation;
pub mod client;
pub mod config;
pub mod conversation;
pub mod rich_content;
pub mod wire;

pub use calculation::{classify, CalculationKind, CalculationResult};
pub use client::{
    ChatBackend, ChatCallbacks, ChatEventHandler, CoachApi, MarketplaceClient, StreamOutcome,
    StreamingChatClient,
};
pub use config::ClientConfig;
pub use conversation::{
    ChatSession, CoachAttribution, ConversationState, ConversationStore, Message, MessageId,
    NewMessage, TurnError, TurnOutcome, TurnReport,
};
pub use rich_content::RichContentItem;
pub use wire::{ChatError, ChatErrorKind, ChatRequest, HistoryEntry, Role};

#[cfg(test)]
mod testing;
