//! Clients for the coach backend
//!
//! [`StreamingChatClient`] relays the chat stream to a [`ChatEventHandler`];
//! [`MarketplaceClient`] covers the non-streaming coach and consent calls.

mod handler;
mod marketplace;
mod streaming;

pub use handler::{ChatCallbacks, ChatEventHandler};
pub use marketplace::{
    fallback_questions, Coach, CoachApi, CoachCategory, CoachReply, Consent, ConsentRequest,
    ConsentStatus, MarketplaceClient,
};
pub use streaming::{ChatBackend, LoggingBackend, StreamOutcome, StreamingChatClient};

#[cfg(test)]
pub(crate) use streaming::{dispatch, report};
