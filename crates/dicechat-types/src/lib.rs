//! Shared types for the dicechat client.

mod event;
mod settings;

pub use event::*;
pub use settings::*;
