use std::fmt;

use crate::{Modifier, Modifiers};

/// The non-modifier key of a key event.
///
/// The remapper only ever distinguishes Enter from everything else, so every
/// other key is carried as its lowercased spec string.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Key {
    /// The Enter / Return key.
    Enter,
    /// Any other key, identified by its spec string (e.g. "a", "tab").
    Other(String),
}

impl Key {
    /// Parses a key specification string. Case-insensitive; "return" is an
    /// alias for Enter. Never fails: unknown specs become `Other`.
    pub fn from_spec(s: &str) -> Self {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "enter" | "return" => Self::Enter,
            _ => Self::Other(lower),
        }
    }

    /// Returns the canonical spec string for this key.
    pub fn to_spec(&self) -> &str {
        match self {
            Self::Enter => "enter",
            Self::Other(s) => s,
        }
    }

    /// Returns true for the Enter key.
    pub fn is_enter(&self) -> bool {
        matches!(self, Self::Enter)
    }
}

/// One observed key press: the key plus the modifiers held at press time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyEvent {
    /// The pressed key.
    pub key: Key,
    /// Modifiers held when the key went down.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Creates an event for `key` with the given modifiers.
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Creates an Enter press with the given modifiers.
    pub fn enter(modifiers: Modifiers) -> Self {
        Self::new(Key::Enter, modifiers)
    }

    /// Parses an event specification of the form "ctrl+shift+enter".
    ///
    /// Components are separated by "+"; the last component is the key spec,
    /// everything before it must parse as a modifier.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let key_raw = parts.pop()?;
        if key_raw.is_empty() {
            return None;
        }
        let key = Key::from_spec(key_raw);
        let mut modifiers = Modifiers::NONE;
        for p in parts {
            modifiers.insert(Modifier::from_spec(p)?);
        }
        Some(Self { key, modifiers })
    }
}

impl fmt::Display for KeyEvent {
    /// The parseable spec form: modifiers in canonical order, then the key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key.to_spec())
        } else {
            write!(f, "{}+{}", self.modifiers, self.key.to_spec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_key() {
        let ev = KeyEvent::parse("enter").expect("parse");
        assert_eq!(ev.key, Key::Enter);
        assert!(ev.modifiers.is_empty());
    }

    #[test]
    fn parse_with_modifiers() {
        let ev = KeyEvent::parse("ctrl+Shift+Enter").expect("parse");
        assert_eq!(ev.key, Key::Enter);
        assert!(ev.modifiers.ctrl);
        assert!(ev.modifiers.shift);
        assert!(!ev.modifiers.alt);
        assert_eq!(ev.to_string(), "ctrl+shift+enter");
    }

    #[test]
    fn parse_other_key() {
        let ev = KeyEvent::parse("cmd+K").expect("parse");
        assert_eq!(ev.key, Key::Other("k".into()));
        assert!(ev.modifiers.meta);
        assert!(!ev.key.is_enter());
    }

    #[test]
    fn parse_rejects_bad_modifier() {
        assert_eq!(KeyEvent::parse("bogus+enter"), None);
        assert_eq!(KeyEvent::parse(""), None);
    }

    #[test]
    fn return_is_enter_alias() {
        assert_eq!(Key::from_spec("Return"), Key::Enter);
        assert_eq!(Key::from_spec("Return").to_spec(), "enter");
    }
}
