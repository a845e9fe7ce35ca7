//! sendkey-protocol: types shared by the coordinator, the remapper contexts,
//! and the CLI settings surface.
//!
//! - [`Settings`]: the two-field preference pair plus conflict resolution.
//! - [`MsgToContext`]: coordinator-to-context notifications.
//! - [`rpc`]: method and notification names used over MRPC.
//! - [`ipc`]: channel aliases, the msgpack codec, and heartbeat timing.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use keychord::Chord;

pub mod rpc;

/// Which preference slot an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSlot {
    /// The chord that sends the message.
    Send,
    /// The chord that inserts a newline.
    Newline,
}

impl ActionSlot {
    /// Parses a slot name. Case-insensitive.
    pub fn from_spec(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "send" => Some(Self::Send),
            "newline" => Some(Self::Newline),
            _ => None,
        }
    }

    /// Stable lowercase name for this slot.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Newline => "newline",
        }
    }

    /// The other slot.
    pub fn other(self) -> Self {
        match self {
            Self::Send => Self::Newline,
            Self::Newline => Self::Send,
        }
    }
}

impl fmt::Display for ActionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user's two remapping preferences.
///
/// The send ≠ newline invariant is maintained by [`Settings::assign`], the
/// only mutation path the settings surface uses. The store and the
/// coordinator persist whatever they are handed without validating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Chord that sends the message.
    pub send: Chord,
    /// Chord that inserts a newline.
    pub newline: Chord,
}

impl Default for Settings {
    /// The canonical defaults: Enter sends, Shift+Enter inserts a newline.
    fn default() -> Self {
        Self {
            send: Chord::Enter,
            newline: Chord::ShiftEnter,
        }
    }
}

impl Settings {
    /// Returns true when the two slots hold distinct chords.
    pub fn is_valid(&self) -> bool {
        self.send != self.newline
    }

    /// The chord currently assigned to `slot`.
    pub fn get(&self, slot: ActionSlot) -> Chord {
        match slot {
            ActionSlot::Send => self.send,
            ActionSlot::Newline => self.newline,
        }
    }

    fn set(&mut self, slot: ActionSlot, chord: Chord) {
        match slot {
            ActionSlot::Send => self.send = chord,
            ActionSlot::Newline => self.newline = chord,
        }
    }

    /// Assigns `chord` to `slot`, resolving a collision with the other slot.
    ///
    /// If the other slot already holds `chord`, it is reassigned to the first
    /// entry of [`Chord::ALL`] that neither slot uses, so the pair always
    /// leaves this method valid. Returns the reassigned chord when a
    /// collision was resolved.
    pub fn assign(&mut self, slot: ActionSlot, chord: Chord) -> Option<Chord> {
        self.set(slot, chord);
        let other = slot.other();
        if self.get(other) != chord {
            return None;
        }
        // The set has four chords and one is taken, so a free one exists.
        let replacement = Chord::ALL
            .into_iter()
            .find(|c| *c != chord)
            .unwrap_or(Chord::Enter);
        self.set(other, replacement);
        Some(replacement)
    }
}

/// Messages pushed from the coordinator to connected contexts.
///
/// The wire form is internally tagged so a payload reads as
/// `{ "type": "SETTINGS_UPDATED", "settings": … }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MsgToContext {
    /// The settings changed; carries the full new pair. Contexts replace
    /// their cache and rebind editors on receipt.
    #[serde(rename = "SETTINGS_UPDATED")]
    SettingsUpdated {
        /// The new preference pair.
        settings: Settings,
    },
    /// Periodic liveness signal (milliseconds since the Unix epoch).
    #[serde(rename = "HEARTBEAT")]
    Heartbeat {
        /// Send time, for staleness diagnostics.
        ms: u64,
    },
}

/// Coordinator status snapshot returned by the `status` RPC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoordinatorStatus {
    /// Count of connected contexts observed by the coordinator.
    pub clients_connected: usize,
    /// Idle shutdown timeout in seconds; 0 means idle shutdown is disabled.
    pub idle_timeout_secs: u64,
    /// Absolute path of the settings file in use.
    pub settings_path: String,
}

/// IPC-related helpers: channel aliases, message codec, heartbeat timing.
pub mod ipc {
    use super::MsgToContext;

    /// Tokio unbounded sender for context messages.
    pub type ContextTx = tokio::sync::mpsc::UnboundedSender<MsgToContext>;
    /// Tokio unbounded receiver for context messages.
    pub type ContextRx = tokio::sync::mpsc::UnboundedReceiver<MsgToContext>;

    /// Create a standard unbounded context channel (sender, receiver).
    pub fn context_channel() -> (ContextTx, ContextRx) {
        tokio::sync::mpsc::unbounded_channel::<MsgToContext>()
    }

    /// Codec for encoding/decoding context messages used by the IPC layer.
    pub mod codec;

    /// Heartbeat timing shared by the coordinator and its clients.
    pub mod heartbeat {
        use std::time::Duration;

        /// How often the coordinator emits a heartbeat.
        pub fn interval() -> Duration {
            Duration::from_secs(1)
        }

        /// How long a client waits without any message before assuming the
        /// coordinator is gone.
        pub fn timeout() -> Duration {
            Duration::from_secs(10)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_canonical_pair() {
        let s = Settings::default();
        assert_eq!(s.send, Chord::Enter);
        assert_eq!(s.newline, Chord::ShiftEnter);
        assert!(s.is_valid());
    }

    #[test]
    fn assign_without_collision() {
        let mut s = Settings::default();
        let moved = s.assign(ActionSlot::Send, Chord::CtrlEnter);
        assert_eq!(moved, None);
        assert_eq!(s.send, Chord::CtrlEnter);
        assert_eq!(s.newline, Chord::ShiftEnter);
        assert!(s.is_valid());
    }

    #[test]
    fn assign_resolves_collision() {
        let mut s = Settings::default();
        // Claim the newline chord for send; newline must move to the first
        // free canonical entry, which is plain Enter.
        let moved = s.assign(ActionSlot::Send, Chord::ShiftEnter);
        assert_eq!(moved, Some(Chord::Enter));
        assert_eq!(s.send, Chord::ShiftEnter);
        assert_eq!(s.newline, Chord::Enter);
        assert!(s.is_valid());
    }

    #[test]
    fn assign_collision_skips_taken_entry() {
        let mut s = Settings {
            send: Chord::Enter,
            newline: Chord::ShiftEnter,
        };
        // Claim Enter for newline; send moves to the first entry that is not
        // Enter, i.e. Shift+Enter.
        let moved = s.assign(ActionSlot::Newline, Chord::Enter);
        assert_eq!(moved, Some(Chord::ShiftEnter));
        assert_eq!(s.newline, Chord::Enter);
        assert_eq!(s.send, Chord::ShiftEnter);
        assert!(s.is_valid());
    }

    #[test]
    fn fully_custom_mapping_is_reachable() {
        let mut s = Settings::default();
        assert_eq!(s.assign(ActionSlot::Newline, Chord::Enter), Some(Chord::ShiftEnter));
        assert_eq!(s.assign(ActionSlot::Send, Chord::AltEnter), None);
        assert_eq!(s.newline, Chord::Enter);
        assert_eq!(s.send, Chord::AltEnter);
    }

    #[test]
    fn slot_specs() {
        assert_eq!(ActionSlot::from_spec("send"), Some(ActionSlot::Send));
        assert_eq!(ActionSlot::from_spec("NEWLINE"), Some(ActionSlot::Newline));
        assert_eq!(ActionSlot::from_spec("both"), None);
        assert_eq!(ActionSlot::Send.other(), ActionSlot::Newline);
    }
}
