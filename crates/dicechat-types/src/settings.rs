//! Durable per-user preferences.
//!
//! Settings travel inside the session URL as a base64-encoded JSON blob
//! (see `dicechat-core::session_url`). Field names stay camelCase on the
//! wire for compatibility with existing saved URLs.

use serde::{Deserialize, Serialize};

/// Saved message template, replayable from the input surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageTemplate {
    pub text: String,
}

/// Per-user preferences carried across reloads.
///
/// Always reconstructed as a whole from the settings blob; there is no
/// partial merge with previous state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Saved message templates, in user-defined order.
    #[serde(default)]
    pub message_templates: Vec<MessageTemplate>,
    /// Karma modifier appended to the next armed roll. Kept as a string
    /// because it is spliced verbatim into the roll expression.
    #[serde(default)]
    pub my_karma: String,
}

impl MessageTemplate {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let settings = SessionSettings {
            message_templates: vec![MessageTemplate::new("1d20+5")],
            my_karma: "4".into(),
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("messageTemplates"));
        assert!(json.contains("myKarma"));
    }

    #[test]
    fn test_missing_fields_default() {
        let settings: SessionSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.message_templates.is_empty());
        assert!(settings.my_karma.is_empty());
    }

    #[test]
    fn test_json_roundtrip() {
        let settings = SessionSettings {
            message_templates: vec![
                MessageTemplate::new("!![10] sword"),
                MessageTemplate::new("2d6 damage"),
            ],
            my_karma: "1d6".into(),
        };
        let json = serde_json::to_string(&settings).unwrap();
        let decoded: SessionSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, settings);
    }
}
