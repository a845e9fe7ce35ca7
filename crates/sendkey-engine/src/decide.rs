//! Pure classification of one observed key event against a settings pair.
//!
//! This is the whole remapping policy in one place; everything else in the
//! crate is plumbing that carries a [`Decision`] to its effect.

use keychord::{Chord, KeyEvent};
use sendkey_protocol::Settings;

/// The chord the host surface treats as "send" on its own.
pub const NATIVE_SEND: Chord = Chord::Enter;
/// The chord the host surface treats as "insert newline" on its own.
pub const NATIVE_NEWLINE: Chord = Chord::ShiftEnter;

/// What the remapper should do with one observed key event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Not an Enter press; never intercepted.
    NotEnter,
    /// The guard was raised: one of our own synthetic events looping back.
    /// Fall through so the host applies its native behavior.
    SyntheticIgnored,
    /// Matched the newline preference, which is the host-native newline
    /// chord; the host already does the right thing.
    NativeNewline,
    /// Matched the newline preference; suppress and redispatch the native
    /// newline chord.
    InsertNewline,
    /// Matched the send preference, which is the host-native send chord; the
    /// host already does the right thing.
    NativeSend,
    /// Matched the send preference; suppress and trigger a send.
    TriggerSend,
    /// An Enter chord matching neither preference; the host handles it.
    PassThrough,
}

impl Decision {
    /// Whether the remapper consumes the native event for this decision.
    pub fn suppresses(self) -> bool {
        matches!(self, Self::InsertNewline | Self::TriggerSend)
    }
}

/// Classify one event.
///
/// Order matters and is fixed: non-Enter first, then the guard, then the
/// newline preference, then the send preference. When both preferences hold
/// the same chord (an invalid pair this layer does not reject), the newline
/// branch wins.
pub fn decide(settings: &Settings, guard_raised: bool, event: &KeyEvent) -> Decision {
    if !event.key.is_enter() {
        return Decision::NotEnter;
    }
    if guard_raised {
        return Decision::SyntheticIgnored;
    }
    if settings.newline.matches(event) {
        return if settings.newline == NATIVE_NEWLINE {
            Decision::NativeNewline
        } else {
            Decision::InsertNewline
        };
    }
    if settings.send.matches(event) {
        return if settings.send == NATIVE_SEND {
            Decision::NativeSend
        } else {
            Decision::TriggerSend
        };
    }
    Decision::PassThrough
}

#[cfg(test)]
mod tests {
    use keychord::{Key, Modifiers};

    use super::*;

    fn enter(mods: Modifiers) -> KeyEvent {
        KeyEvent::enter(mods)
    }

    fn settings(send: Chord, newline: Chord) -> Settings {
        Settings { send, newline }
    }

    #[test]
    fn defaults_are_fully_transparent() {
        let s = Settings::default();
        assert_eq!(
            decide(&s, false, &enter(Modifiers::NONE)),
            Decision::NativeSend
        );
        assert_eq!(
            decide(&s, false, &enter(Modifiers::SHIFT)),
            Decision::NativeNewline
        );
        assert_eq!(
            decide(&s, false, &enter(Modifiers::ALT)),
            Decision::PassThrough
        );
        assert_eq!(
            decide(&s, false, &enter(Modifiers::CTRL)),
            Decision::PassThrough
        );
    }

    #[test]
    fn non_enter_is_never_intercepted() {
        let s = settings(Chord::CtrlEnter, Chord::Enter);
        let ev = KeyEvent::new(Key::Other("a".into()), Modifiers::CTRL);
        assert_eq!(decide(&s, false, &ev), Decision::NotEnter);
        // Even with the guard up, non-Enter keys classify as NotEnter.
        assert_eq!(decide(&s, true, &ev), Decision::NotEnter);
    }

    #[test]
    fn guard_short_circuits_classification() {
        let s = settings(Chord::ShiftEnter, Chord::Enter);
        // Without the guard this would be a send trigger.
        assert_eq!(
            decide(&s, false, &enter(Modifiers::SHIFT)),
            Decision::TriggerSend
        );
        assert_eq!(
            decide(&s, true, &enter(Modifiers::SHIFT)),
            Decision::SyntheticIgnored
        );
    }

    #[test]
    fn remapped_newline_is_suppressed() {
        // newline=Enter, send=Alt+Enter: the fully customized pair.
        let s = settings(Chord::AltEnter, Chord::Enter);
        assert_eq!(
            decide(&s, false, &enter(Modifiers::NONE)),
            Decision::InsertNewline
        );
        assert_eq!(
            decide(&s, false, &enter(Modifiers::ALT)),
            Decision::TriggerSend
        );
        assert_eq!(
            decide(&s, false, &enter(Modifiers::SHIFT)),
            Decision::PassThrough
        );
    }

    #[test]
    fn meta_disqualifies_both_preferences() {
        let s = settings(Chord::Enter, Chord::ShiftEnter);
        let mut mods = Modifiers::NONE;
        mods.meta = true;
        assert_eq!(decide(&s, false, &enter(mods)), Decision::PassThrough);
        let mut shift_meta = Modifiers::SHIFT;
        shift_meta.meta = true;
        assert_eq!(decide(&s, false, &enter(shift_meta)), Decision::PassThrough);
    }

    #[test]
    fn newline_wins_a_tied_pair() {
        // An invalid pair (both slots Ctrl+Enter) must still behave
        // deterministically: the newline branch is checked first.
        let s = settings(Chord::CtrlEnter, Chord::CtrlEnter);
        assert_eq!(
            decide(&s, false, &enter(Modifiers::CTRL)),
            Decision::InsertNewline
        );
    }

    #[test]
    fn suppression_is_limited_to_remapped_decisions() {
        assert!(Decision::InsertNewline.suppresses());
        assert!(Decision::TriggerSend.suppresses());
        for d in [
            Decision::NotEnter,
            Decision::SyntheticIgnored,
            Decision::NativeNewline,
            Decision::NativeSend,
            Decision::PassThrough,
        ] {
            assert!(!d.suppresses(), "{:?} must not suppress", d);
        }
    }
}
