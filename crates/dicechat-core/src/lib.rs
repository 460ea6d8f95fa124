//! Core protocol and state logic for the dicechat client.

mod dice;
mod error;
mod initiative;
mod render;
mod session_url;

pub use dice::{append_karma, expand_step, mark_hidden, step_dice};
pub use error::ChatError;
pub use initiative::{InitiativeEntry, InitiativeTracker};
pub use render::DisplayMessage;
pub use session_url::{
    Identity, IdentityKey, persist_identity, persist_settings, recover_identity,
    recover_settings, websocket_url,
};

/// Result type for dicechat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
