//! Session URL codec.
//!
//! The session URL's query string is the only durable store: display
//! name, room, and the settings blob all live there and survive a
//! restart when the user reuses the same URL. Writes rewrite the query
//! in place and preserve unrelated parameters.

use crate::{ChatError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use dicechat_types::SessionSettings;
use url::Url;

/// Identity recovered from the session URL at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
    pub room: Option<String>,
}

/// Query parameter holding one half of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey {
    Name,
    Room,
}

impl IdentityKey {
    fn param(self) -> &'static str {
        match self {
            IdentityKey::Name => "name",
            IdentityKey::Room => "room",
        }
    }
}

/// Read `name` and `room` query parameters verbatim; either may be absent.
pub fn recover_identity(url: &Url) -> Identity {
    Identity {
        name: query_param(url, "name"),
        room: query_param(url, "room"),
    }
}

/// Decode the `settings` query parameter (base64-wrapped JSON).
///
/// An absent or unreadable blob yields the default settings; corruption
/// is never fatal.
pub fn recover_settings(url: &Url) -> SessionSettings {
    let Some(blob) = query_param(url, "settings") else {
        return SessionSettings::default();
    };

    match decode_settings(&blob) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::debug!(target: "dicechat::session", "ignoring settings blob: {e}");
            SessionSettings::default()
        }
    }
}

/// Write one identity parameter back into the URL, in place.
pub fn persist_identity(url: &mut Url, key: IdentityKey, value: &str) {
    set_query_param(url, key.param(), value);
    tracing::debug!(target: "dicechat::session", "persisted {} = {value}", key.param());
}

/// Write the full settings blob back into the URL, in place.
///
/// Round-trip law: `recover_settings` after `persist_settings` yields
/// the same settings.
pub fn persist_settings(url: &mut Url, settings: &SessionSettings) -> Result<()> {
    let json = serde_json::to_string(settings)?;
    set_query_param(url, "settings", &BASE64.encode(json));
    Ok(())
}

/// Derive the WebSocket endpoint from the session URL: `https` pages use
/// `wss`, everything else `ws`; the path is always `/ws/`.
pub fn websocket_url(url: &Url) -> Result<Url> {
    let mut ws = url.clone();
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    ws.set_scheme(scheme)
        .map_err(|_| ChatError::Transport(format!("cannot derive ws scheme from {url}")))?;
    ws.set_path("/ws/");
    ws.set_query(None);
    ws.set_fragment(None);
    Ok(ws)
}

fn decode_settings(blob: &str) -> Result<SessionSettings> {
    let bytes = BASE64
        .decode(blob)
        .map_err(|e| ChatError::SettingsBlob(e.to_string()))?;
    let json =
        String::from_utf8(bytes).map_err(|e| ChatError::SettingsBlob(e.to_string()))?;
    Ok(serde_json::from_str(&json)?)
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let others: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (k, v) in &others {
        pairs.append_pair(k, v);
    }
    pairs.append_pair(key, value);
    drop(pairs);
}
