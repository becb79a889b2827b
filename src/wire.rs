//! Wire format shared with the coach backend
//!
//! Request/response types, the incremental frame decoder, and the error
//! taxonomy for chat calls.

mod decoder;
mod error;
mod types;

#[cfg(test)]
mod proptests;

pub use decoder::{FrameDecoder, FrameFormat};
pub use error::{ChatError, ChatErrorKind, FrameError};
pub use types::{ChatRequest, HistoryEntry, Role, StreamFrame};
