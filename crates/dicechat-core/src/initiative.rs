//! Combat initiative roster derived from the chat stream.
//!
//! Initiative rolls are plain chat messages carrying an in-band
//! annotation (the sub-protocol's wire format):
//!
//! ```text
//! "!" "!"? ...optional, exploding-roll prefix
//! "(ini" (":" <subName>)? ")" <description>
//! ```
//!
//! The sender's name keys the entry, optionally scoped by `<subName>`
//! (a summoned creature, a mount). The literal message
//! `"(clear initiative)"` resets the roster.

use dicechat_types::TextMessage;
use once_cell::sync::Lazy;
use regex::Regex;

const CLEAR_MESSAGE: &str = "(clear initiative)";

static INI_ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:!!?)?\(ini(?::(?P<sub>[^)]*))?\)(?P<desc>.*)$")
        .expect("initiative annotation regex")
});

/// One row of the initiative roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiativeEntry {
    /// Player name (the message sender).
    pub main_name: String,
    /// Sub-identity under the player, when the annotation carried one.
    pub sub_name: Option<String>,
    /// Free text following the annotation, trimmed.
    pub description: String,
    /// Rolled initiative total.
    pub result: i32,
}

/// Ordered initiative roster, highest result first.
///
/// Purely a derived view over the event stream; it has no lifecycle of
/// its own beyond the chat session.
#[derive(Debug, Default)]
pub struct InitiativeTracker {
    entries: Vec<InitiativeEntry>,
}

impl InitiativeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current roster, sorted by result descending.
    pub fn entries(&self) -> &[InitiativeEntry] {
        &self.entries
    }

    /// Feed one chat message through the tracker.
    ///
    /// Returns `true` when the roster changed.
    pub fn observe(&mut self, message: &TextMessage) -> bool {
        if message.message == CLEAR_MESSAGE {
            let had_entries = !self.entries.is_empty();
            self.entries.clear();
            if had_entries {
                tracing::debug!(target: "dicechat::initiative", "roster cleared");
            }
            return had_entries;
        }

        let Some(captures) = INI_ANNOTATION.captures(&message.message) else {
            return false;
        };
        // System messages carry no name to key an entry under.
        let Some(main_name) = message.name.clone() else {
            return false;
        };

        let sub_name = captures.name("sub").map(|m| m.as_str().to_owned());
        let description = captures
            .name("desc")
            .map(|m| m.as_str().trim().to_owned())
            .unwrap_or_default();
        let result = message.dice_total().unwrap_or(0);

        self.entries
            .retain(|e| !(e.main_name == main_name && e.sub_name == sub_name));
        self.entries.push(InitiativeEntry {
            main_name,
            sub_name,
            description,
            result,
        });
        // Stable sort: ties keep their existing relative order.
        self.entries.sort_by(|a, b| b.result.cmp(&a.result));

        true
    }
}
