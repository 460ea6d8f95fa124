//! Display projection for chat events.
//!
//! The UI layer consumes plain data; all formatting decisions live here.

use chrono::{Local, Timelike};
use dicechat_types::TextMessage;

/// A chat entry ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Server-originated notice rather than user chat.
    pub is_system: bool,
    /// Sender name; `None` for system messages.
    pub name: Option<String>,
    /// The roll expression that produced a dice result, when there is one.
    pub request_text: Option<String>,
    /// Message body: raw text, or the spelled-out dice sum.
    pub result_text: String,
    /// Local wall-clock time, `H:MM:SS`.
    pub time_label: String,
}

impl DisplayMessage {
    pub fn from_message(message: &TextMessage) -> Self {
        let (request_text, result_text) = match &message.dice_results {
            Some(results) => {
                let rolls = results
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(" + ");
                let total: i32 = results.iter().sum();
                (
                    Some(message.message.clone()),
                    format!("{rolls} = {total}"),
                )
            }
            None => (None, message.message.clone()),
        };

        Self {
            is_system: message.is_system(),
            name: message.name.clone(),
            request_text,
            result_text,
            time_label: time_label(message),
        }
    }
}

// The hour is deliberately not zero-padded while minutes and seconds
// are; this matches the long-standing display format.
fn time_label(message: &TextMessage) -> String {
    let local = message.time.with_timezone(&Local);
    format!(
        "{}:{:02}:{:02}",
        local.hour(),
        local.minute(),
        local.second()
    )
}
