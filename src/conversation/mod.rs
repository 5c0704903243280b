//! Turn protocol built on the session store

pub mod error;
pub mod manager;

pub use error::ChatError;
pub use manager::{ConversationManager, ConversationSettings, TurnReply};
