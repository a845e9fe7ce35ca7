use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{KeyEvent, Modifiers};

/// One of the four remappable Enter chords.
///
/// This set is closed: every settings slot holds exactly one of these, and
/// conflict resolution walks them in the canonical order of [`Chord::ALL`].
/// None of them carries meta, so events with meta held match nothing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Chord {
    /// Plain Enter.
    Enter,
    /// Shift+Enter.
    ShiftEnter,
    /// Alt+Enter.
    AltEnter,
    /// Ctrl+Enter.
    CtrlEnter,
}

impl Chord {
    /// All chords in canonical order. Conflict resolution picks the first
    /// entry not already taken.
    pub const ALL: [Self; 4] = [Self::Enter, Self::ShiftEnter, Self::AltEnter, Self::CtrlEnter];

    /// The exact modifier set this chord requires.
    pub fn modifiers(self) -> Modifiers {
        match self {
            Self::Enter => Modifiers::NONE,
            Self::ShiftEnter => Modifiers::SHIFT,
            Self::AltEnter => Modifiers::ALT,
            Self::CtrlEnter => Modifiers::CTRL,
        }
    }

    /// Parses a chord specification of the form "shift+enter".
    ///
    /// Case-insensitive; modifier aliases follow `Modifier::from_spec` and
    /// "return" is accepted for the key. Specs outside the closed set (extra
    /// modifiers, meta, non-Enter keys) fail.
    pub fn parse(s: &str) -> Option<Self> {
        let ev = KeyEvent::parse(s)?;
        Self::from_event(&ev)
    }

    /// Returns the chord an event corresponds to, if any. This is an exact
    /// modifier-set match on an Enter press.
    pub fn from_event(ev: &KeyEvent) -> Option<Self> {
        if !ev.key.is_enter() {
            return None;
        }
        Self::ALL.into_iter().find(|c| c.modifiers() == ev.modifiers)
    }

    /// Returns true when the event is exactly this chord.
    pub fn matches(self, ev: &KeyEvent) -> bool {
        ev.key.is_enter() && ev.modifiers == self.modifiers()
    }

    /// The canonical spec string for this chord, always lowercased.
    pub fn as_spec(self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::ShiftEnter => "shift+enter",
            Self::AltEnter => "alt+enter",
            Self::CtrlEnter => "ctrl+enter",
        }
    }

    /// The key event this chord describes, used for synthetic dispatch.
    pub fn to_event(self) -> KeyEvent {
        KeyEvent::enter(self.modifiers())
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_spec())
    }
}

impl TryFrom<String> for Chord {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("not a recognized chord: {:?}", s))
    }
}

impl From<Chord> for String {
    fn from(c: Chord) -> Self {
        c.as_spec().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Key;

    #[test]
    fn parse_all_canonical_specs() {
        for c in Chord::ALL {
            assert_eq!(Chord::parse(c.as_spec()), Some(c), "roundtrip {}", c);
        }
    }

    #[test]
    fn parse_aliases() {
        assert_eq!(Chord::parse("Return"), Some(Chord::Enter));
        assert_eq!(Chord::parse("SHIFT+ENTER"), Some(Chord::ShiftEnter));
        assert_eq!(Chord::parse("opt+enter"), Some(Chord::AltEnter));
        assert_eq!(Chord::parse("control+return"), Some(Chord::CtrlEnter));
    }

    #[test]
    fn parse_rejects_outside_the_set() {
        assert_eq!(Chord::parse("meta+enter"), None);
        assert_eq!(Chord::parse("ctrl+shift+enter"), None);
        assert_eq!(Chord::parse("shift+a"), None);
        assert_eq!(Chord::parse("space"), None);
    }

    #[test]
    fn event_matching_is_exact() {
        let plain = KeyEvent::enter(Modifiers::NONE);
        assert!(Chord::Enter.matches(&plain));
        assert!(!Chord::ShiftEnter.matches(&plain));

        // Meta disqualifies even when the rest of the set lines up.
        let mut mods = Modifiers::SHIFT;
        mods.meta = true;
        let meta_shift = KeyEvent::enter(mods);
        assert!(!Chord::ShiftEnter.matches(&meta_shift));
        assert_eq!(Chord::from_event(&meta_shift), None);

        let other = KeyEvent::new(Key::Other("a".into()), Modifiers::NONE);
        assert_eq!(Chord::from_event(&other), None);
    }

    #[test]
    fn serde_as_spec_string() {
        let s = ron::to_string(&Chord::CtrlEnter).expect("ser");
        assert_eq!(s, "\"ctrl+enter\"");
        let c: Chord = ron::from_str("\"shift+enter\"").expect("de");
        assert_eq!(c, Chord::ShiftEnter);
        assert!(ron::from_str::<Chord>("\"meta+enter\"").is_err());
    }
}
