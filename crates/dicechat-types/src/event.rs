//! Wire events pushed by the chat server.
//!
//! Every inbound frame is a JSON object with exactly one top-level key
//! naming the event kind, which is serde's externally tagged enum
//! representation. Frames with an unrecognized key fail to decode and
//! are dropped by the connection layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event received from the chat server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerEvent {
    /// A chat line, dice roll, or server notice.
    TextMessage(TextMessage),
    /// Snapshot of the current room and its member list.
    RoomState(RoomState),
}

/// A single chat message.
///
/// A message without a `name` is a *system message*: a server-originated
/// notice (join confirmations, renames) rather than user-authored text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextMessage {
    /// Sender's display name; `None` for system messages.
    pub name: Option<String>,
    /// Raw message text. For dice rolls this is the roll expression.
    pub message: String,
    /// Individual die results when the message was a roll.
    pub dice_results: Option<Vec<i32>>,
    /// Server-side timestamp.
    #[serde(with = "time_format")]
    pub time: DateTime<Utc>,
}

/// Room snapshot: name plus current member list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomState {
    pub room_name: String,
    pub members: Vec<String>,
}

impl TextMessage {
    /// Plain chat message from a named sender.
    pub fn chat(name: &str, message: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            message: message.to_owned(),
            dice_results: None,
            time: Utc::now(),
        }
    }

    /// Server-originated system message.
    pub fn system(message: &str) -> Self {
        Self {
            name: None,
            message: message.to_owned(),
            dice_results: None,
            time: Utc::now(),
        }
    }

    /// Dice roll result from a named sender.
    pub fn roll(name: &str, message: &str, dice_results: Vec<i32>) -> Self {
        Self {
            name: Some(name.to_owned()),
            message: message.to_owned(),
            dice_results: Some(dice_results),
            time: Utc::now(),
        }
    }

    /// Whether this is a system message (no sender).
    pub fn is_system(&self) -> bool {
        self.name.is_none()
    }

    /// Sum of the individual die results, or `None` for non-roll messages.
    pub fn dice_total(&self) -> Option<i32> {
        self.dice_results
            .as_ref()
            .map(|results| results.iter().sum())
    }
}

/// Timestamp codec for the wire `time` field.
///
/// The server emits milliseconds since the Unix epoch; older builds sent
/// RFC 3339 strings, so decoding accepts both.
mod time_format {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(time.timestamp_millis())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimeVisitor;

        impl<'de> Visitor<'de> for TimeVisitor {
            type Value = DateTime<Utc>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("milliseconds since the Unix epoch or an RFC 3339 string")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                Utc.timestamp_millis_opt(value)
                    .single()
                    .ok_or_else(|| E::custom(format!("timestamp out of range: {value}")))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                self.visit_i64(value as i64)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                value
                    .parse::<DateTime<Utc>>()
                    .map_err(|e| E::custom(format!("invalid timestamp string: {e}")))
            }
        }

        deserializer.deserialize_any(TimeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_text_message() {
        let frame = r#"{"TextMessage":{"name":"Alice","message":"2d6","dice_results":[3,5],"time":1700000000000}}"#;
        let event: ServerEvent = serde_json::from_str(frame).unwrap();

        let ServerEvent::TextMessage(msg) = event else {
            panic!("expected TextMessage");
        };
        assert_eq!(msg.name.as_deref(), Some("Alice"));
        assert_eq!(msg.message, "2d6");
        assert_eq!(msg.dice_total(), Some(8));
        assert!(!msg.is_system());
    }

    #[test]
    fn test_decode_system_message() {
        let frame = r#"{"TextMessage":{"name":null,"message":"You joined room tavern","dice_results":null,"time":1700000000000}}"#;
        let event: ServerEvent = serde_json::from_str(frame).unwrap();

        let ServerEvent::TextMessage(msg) = event else {
            panic!("expected TextMessage");
        };
        assert!(msg.is_system());
        assert_eq!(msg.dice_total(), None);
    }

    #[test]
    fn test_decode_room_state() {
        let frame = r#"{"RoomState":{"room_name":"tavern","members":["Bob","Alice"]}}"#;
        let event: ServerEvent = serde_json::from_str(frame).unwrap();

        let ServerEvent::RoomState(room) = event else {
            panic!("expected RoomState");
        };
        assert_eq!(room.room_name, "tavern");
        assert_eq!(room.members, vec!["Bob", "Alice"]);
    }

    #[test]
    fn test_decode_string_timestamp() {
        let frame = r#"{"TextMessage":{"name":"Alice","message":"hi","dice_results":null,"time":"2023-11-14T22:13:20Z"}}"#;
        let event: ServerEvent = serde_json::from_str(frame).unwrap();

        let ServerEvent::TextMessage(msg) = event else {
            panic!("expected TextMessage");
        };
        assert_eq!(msg.time.timestamp_millis(), 1700000000000);
    }

    #[test]
    fn test_unknown_top_level_key_is_rejected() {
        let frame = r#"{"ServerStats":{"uptime":12}}"#;
        assert!(serde_json::from_str::<ServerEvent>(frame).is_err());
    }

    #[test]
    fn test_roundtrip_emits_millis() {
        let original = ServerEvent::TextMessage(TextMessage {
            name: Some("Bob".into()),
            message: "1d20".into(),
            dice_results: Some(vec![17]),
            time: Utc.timestamp_millis_opt(1700000000000).unwrap(),
        });
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("1700000000000"));

        let decoded: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }
}
