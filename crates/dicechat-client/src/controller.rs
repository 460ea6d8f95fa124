//! Chat controller: the top-level orchestrator.
//!
//! Owns the session state (URL, identity, settings, initiative roster,
//! one-shot toggles) as an explicit struct and wires connection events to
//! UI updates. The UI consumes [`UiUpdate`] values over a channel and
//! feeds user input back through [`ChatController::submit`].

use dicechat_core::{
    DisplayMessage, Identity, IdentityKey, InitiativeEntry, InitiativeTracker, append_karma,
    expand_step, mark_hidden, persist_identity, persist_settings, recover_identity,
    recover_settings,
};
use dicechat_types::{MessageTemplate, RoomState, ServerEvent, SessionSettings, TextMessage};
use tokio::sync::mpsc;
use url::Url;

use crate::connection::ConnectionEvent;

/// System-message prefixes the server uses to confirm identity changes.
const NAME_CONFIRM_PREFIX: &str = "You are now known as: ";
const ROOM_CONFIRM_PREFIX: &str = "You joined room ";

/// Outbound send path, fire-and-forget.
pub trait CommandSink {
    fn send(&self, command: &str);
}

/// State pushed to the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// A chat entry to prepend.
    Chat(DisplayMessage),
    /// Room header: name plus sorted member list.
    Room { name: String, members: Vec<String> },
    /// Full initiative roster after a change.
    Initiative(Vec<InitiativeEntry>),
    /// Connected flag for the disconnected indicator.
    Connection(bool),
    /// The session URL changed; the shell should surface the new address.
    Address(Url),
}

pub struct ChatController<S: CommandSink> {
    url: Url,
    identity: Identity,
    settings: SessionSettings,
    initiative: InitiativeTracker,
    karma_armed: bool,
    hide_armed: bool,
    sink: S,
    ui: mpsc::UnboundedSender<UiUpdate>,
}

impl<S: CommandSink> ChatController<S> {
    /// Build a controller, recovering identity and settings from the
    /// session URL.
    pub fn new(url: Url, sink: S, ui: mpsc::UnboundedSender<UiUpdate>) -> Self {
        let identity = recover_identity(&url);
        let settings = recover_settings(&url);
        tracing::debug!(
            target: "dicechat::controller",
            "recovered identity name={:?} room={:?}, {} template(s)",
            identity.name,
            identity.room,
            settings.message_templates.len()
        );

        Self {
            url,
            identity,
            settings,
            initiative: InitiativeTracker::new(),
            karma_armed: false,
            hide_armed: false,
            sink,
            ui,
        }
    }

    /// Dispatch one connection event.
    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => self.on_open(),
            ConnectionEvent::Frame(ServerEvent::TextMessage(msg)) => self.on_text_message(msg),
            ConnectionEvent::Frame(ServerEvent::RoomState(room)) => self.on_room_state(room),
            ConnectionEvent::Closed => self.emit(UiUpdate::Connection(false)),
        }
    }

    /// Submit user input: step expansion always, karma and hide only when
    /// armed. Both toggles are consumed by this one submission.
    pub fn submit(&mut self, draft: &str) {
        let karma_armed = std::mem::take(&mut self.karma_armed);
        let hide_armed = std::mem::take(&mut self.hide_armed);

        if draft.is_empty() {
            return;
        }

        let mut outgoing = match expand_step(draft) {
            Ok(text) => text,
            Err(e) => {
                // Not fatal: the server sees the unexpanded text.
                tracing::debug!(target: "dicechat::dice", "sending unexpanded: {e}");
                draft.to_owned()
            }
        };
        if karma_armed && !self.settings.my_karma.is_empty() {
            outgoing = append_karma(&outgoing, &self.settings.my_karma);
        }
        if hide_armed {
            outgoing = mark_hidden(&outgoing);
        }

        self.sink.send(&outgoing);
    }

    /// Arm the karma modifier for exactly one submission.
    pub fn arm_karma(&mut self) {
        self.karma_armed = true;
    }

    /// Arm hide-roll for exactly one submission.
    pub fn arm_hide(&mut self) {
        self.hide_armed = true;
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Template text by 1-based index, as shown to the user.
    pub fn template(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.settings.message_templates.get(i))
            .map(|t| t.text.as_str())
    }

    pub fn set_karma(&mut self, value: &str) {
        self.settings.my_karma = value.to_owned();
        self.flush_settings();
    }

    pub fn add_template(&mut self, text: &str) {
        self.settings
            .message_templates
            .push(MessageTemplate::new(text));
        self.flush_settings();
    }

    /// Replace the settings wholesale (the "stop editing" action).
    pub fn update_settings(&mut self, settings: SessionSettings) {
        self.settings = settings;
        self.flush_settings();
    }

    pub fn session_url(&self) -> &Url {
        &self.url
    }

    fn on_open(&mut self) {
        // Name before room: room membership may be name-scoped server-side.
        if let Some(name) = &self.identity.name {
            self.sink.send(&format!("/name {name}"));
        }
        if let Some(room) = &self.identity.room {
            self.sink.send(&format!("/join {room}"));
        }
        self.emit(UiUpdate::Connection(true));
    }

    fn on_text_message(&mut self, msg: TextMessage) {
        self.emit(UiUpdate::Chat(DisplayMessage::from_message(&msg)));

        if msg.is_system() {
            self.absorb_system_notice(&msg.message);
        } else if self.initiative.observe(&msg) {
            self.emit(UiUpdate::Initiative(self.initiative.entries().to_vec()));
        }
    }

    fn on_room_state(&mut self, room: RoomState) {
        let mut members = room.members;
        // Upstream order is unspecified; always re-sort.
        members.sort();
        self.emit(UiUpdate::Room {
            name: room.room_name,
            members,
        });
    }

    /// Pick up confirmed name/room changes from server notices and make
    /// them durable in the session URL.
    fn absorb_system_notice(&mut self, text: &str) {
        if let Some(name) = text.strip_prefix(NAME_CONFIRM_PREFIX) {
            self.identity.name = Some(name.to_owned());
            persist_identity(&mut self.url, IdentityKey::Name, name);
            self.emit(UiUpdate::Address(self.url.clone()));
        } else if let Some(room) = text.strip_prefix(ROOM_CONFIRM_PREFIX) {
            self.identity.room = Some(room.to_owned());
            persist_identity(&mut self.url, IdentityKey::Room, room);
            self.emit(UiUpdate::Address(self.url.clone()));
        }
    }

    fn flush_settings(&mut self) {
        match persist_settings(&mut self.url, &self.settings) {
            Ok(()) => self.emit(UiUpdate::Address(self.url.clone())),
            Err(e) => {
                tracing::warn!(target: "dicechat::session", "failed to persist settings: {e}")
            }
        }
    }

    fn emit(&self, update: UiUpdate) {
        // The receiver only disappears during shutdown.
        let _ = self.ui.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Rc<RefCell<Vec<String>>>,
    }

    impl CommandSink for RecordingSink {
        fn send(&self, command: &str) {
            self.sent.borrow_mut().push(command.to_owned());
        }
    }

    fn controller(
        url: &str,
    ) -> (
        ChatController<RecordingSink>,
        RecordingSink,
        mpsc::UnboundedReceiver<UiUpdate>,
    ) {
        let sink = RecordingSink::default();
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let controller =
            ChatController::new(Url::parse(url).unwrap(), sink.clone(), ui_tx);
        (controller, sink, ui_rx)
    }

    #[test]
    fn test_open_replays_name_then_room() {
        let (mut c, sink, mut ui) = controller("http://localhost:8080/?name=Bob&room=tavern");
        c.handle_event(ConnectionEvent::Opened);

        assert_eq!(*sink.sent.borrow(), vec!["/name Bob", "/join tavern"]);
        assert_eq!(ui.try_recv().unwrap(), UiUpdate::Connection(true));
    }

    #[test]
    fn test_open_without_identity_replays_nothing() {
        let (mut c, sink, _ui) = controller("http://localhost:8080/");
        c.handle_event(ConnectionEvent::Opened);
        assert!(sink.sent.borrow().is_empty());
    }

    #[test]
    fn test_system_room_notice_updates_url() {
        let (mut c, _sink, mut ui) = controller("http://localhost:8080/?name=Bob");
        c.handle_event(ConnectionEvent::Frame(ServerEvent::TextMessage(
            TextMessage::system("You joined room tavern"),
        )));

        let identity = recover_identity(c.session_url());
        assert_eq!(identity.room.as_deref(), Some("tavern"));
        assert_eq!(identity.name.as_deref(), Some("Bob"));

        // Chat render first, then the address change.
        assert!(matches!(ui.try_recv().unwrap(), UiUpdate::Chat(_)));
        assert!(matches!(ui.try_recv().unwrap(), UiUpdate::Address(_)));
    }

    #[test]
    fn test_system_name_notice_updates_url() {
        let (mut c, _sink, _ui) = controller("http://localhost:8080/?name=Bob");
        c.handle_event(ConnectionEvent::Frame(ServerEvent::TextMessage(
            TextMessage::system("You are now known as: Robert"),
        )));

        assert_eq!(
            recover_identity(c.session_url()).name.as_deref(),
            Some("Robert")
        );
    }

    #[test]
    fn test_karma_is_one_shot() {
        let (mut c, sink, _ui) = controller("http://localhost:8080/");
        c.set_karma("4");
        c.arm_karma();

        c.submit("1d20 attack");
        c.submit("1d20 attack");

        assert_eq!(
            *sink.sent.borrow(),
            vec!["1d20+4 attack", "1d20 attack"]
        );
    }

    #[test]
    fn test_empty_karma_appends_nothing() {
        let (mut c, sink, _ui) = controller("http://localhost:8080/");
        c.arm_karma();
        c.submit("1d20");
        assert_eq!(*sink.sent.borrow(), vec!["1d20"]);
    }

    #[test]
    fn test_hide_is_one_shot_and_applied_after_karma() {
        let (mut c, sink, _ui) = controller("http://localhost:8080/");
        c.set_karma("4");
        c.arm_karma();
        c.arm_hide();

        c.submit("!![10]+5 sword");
        c.submit("2d6");

        assert_eq!(
            *sink.sent.borrow(),
            vec!["1d10+1d6+5+4* sword", "2d6"]
        );
    }

    #[test]
    fn test_failed_expansion_sends_original() {
        let (mut c, sink, _ui) = controller("http://localhost:8080/");
        c.submit("![99] too strong");
        assert_eq!(*sink.sent.borrow(), vec!["![99] too strong"]);
    }

    #[test]
    fn test_room_state_members_are_sorted() {
        let (mut c, _sink, mut ui) = controller("http://localhost:8080/");
        c.handle_event(ConnectionEvent::Frame(ServerEvent::RoomState(RoomState {
            room_name: "tavern".into(),
            members: vec!["carol".into(), "Alice".into(), "Bob".into()],
        })));

        let UiUpdate::Room { name, members } = ui.try_recv().unwrap() else {
            panic!("expected Room update");
        };
        assert_eq!(name, "tavern");
        // Case-sensitive lexicographic order.
        assert_eq!(members, vec!["Alice", "Bob", "carol"]);
    }

    #[test]
    fn test_initiative_roster_is_emitted_on_change() {
        let (mut c, _sink, mut ui) = controller("http://localhost:8080/");
        c.handle_event(ConnectionEvent::Frame(ServerEvent::TextMessage(
            TextMessage::roll("Alice", "(ini) spear", vec![7, 4]),
        )));

        assert!(matches!(ui.try_recv().unwrap(), UiUpdate::Chat(_)));
        let UiUpdate::Initiative(roster) = ui.try_recv().unwrap() else {
            panic!("expected Initiative update");
        };
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].result, 11);
    }

    #[test]
    fn test_non_initiative_chat_emits_no_roster() {
        let (mut c, _sink, mut ui) = controller("http://localhost:8080/");
        c.handle_event(ConnectionEvent::Frame(ServerEvent::TextMessage(
            TextMessage::chat("Alice", "hello"),
        )));

        assert!(matches!(ui.try_recv().unwrap(), UiUpdate::Chat(_)));
        assert!(ui.try_recv().is_err());
    }

    #[test]
    fn test_settings_edit_persists_to_url() {
        let (mut c, _sink, mut ui) = controller("http://localhost:8080/?name=Bob");
        c.add_template("!![10]+5 sword");
        c.set_karma("1d6");

        let settings = recover_settings(c.session_url());
        assert_eq!(settings.message_templates.len(), 1);
        assert_eq!(settings.my_karma, "1d6");
        assert!(matches!(ui.try_recv().unwrap(), UiUpdate::Address(_)));
    }

    #[test]
    fn test_template_lookup_is_one_based() {
        let (mut c, _sink, _ui) = controller("http://localhost:8080/");
        c.add_template("2d6");
        assert_eq!(c.template(1), Some("2d6"));
        assert_eq!(c.template(0), None);
        assert_eq!(c.template(2), None);
    }
}
