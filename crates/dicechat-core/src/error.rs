//! Error types for dicechat.
//!
//! None of these are fatal to a session: transport errors recover via
//! reconnect, decode errors drop the frame or fall back to defaults, and
//! expansion errors send the message unexpanded.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Step expansion failed: {0}")]
    Expansion(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unreadable settings blob: {0}")]
    SettingsBlob(String),
}
