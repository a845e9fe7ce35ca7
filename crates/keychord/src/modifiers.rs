use std::fmt;

use serde::{Deserialize, Serialize};

/// Modifier keys a composer surface reports on key events.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Modifier {
    Shift,
    Alt,
    Ctrl,
    Meta,
}

impl Modifier {
    /// Parses a modifier specification string.
    ///
    /// Case-insensitive; accepts common alias words (control, opt/option,
    /// cmd/command/super for meta).
    pub fn from_spec(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "shift" => Some(Self::Shift),
            "alt" | "opt" | "option" => Some(Self::Alt),
            "ctrl" | "control" => Some(Self::Ctrl),
            "meta" | "cmd" | "command" | "super" => Some(Self::Meta),
            _ => None,
        }
    }

    /// Returns the canonical spec string for this modifier, always lowercased.
    pub fn to_spec(self) -> &'static str {
        match self {
            Self::Shift => "shift",
            Self::Alt => "alt",
            Self::Ctrl => "ctrl",
            Self::Meta => "meta",
        }
    }
}

/// The set of modifiers held for one key event or chord.
///
/// Equality is exact set equality. The remapper relies on this: an event with
/// meta held never equals a chord's modifier set, because no chord carries
/// meta.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    /// Shift held.
    pub shift: bool,
    /// Alt (Option) held.
    pub alt: bool,
    /// Control held.
    pub ctrl: bool,
    /// Meta (Command / Super) held.
    pub meta: bool,
}

impl Modifiers {
    /// The empty modifier set.
    pub const NONE: Self = Self {
        shift: false,
        alt: false,
        ctrl: false,
        meta: false,
    };

    /// Shift only.
    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };

    /// Alt only.
    pub const ALT: Self = Self {
        alt: true,
        ..Self::NONE
    };

    /// Ctrl only.
    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    /// Returns true when no modifier is held.
    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }

    /// Adds a modifier to the set.
    pub fn insert(&mut self, m: Modifier) {
        match m {
            Modifier::Shift => self.shift = true,
            Modifier::Alt => self.alt = true,
            Modifier::Ctrl => self.ctrl = true,
            Modifier::Meta => self.meta = true,
        }
    }

    /// Returns true when the given modifier is held.
    pub fn contains(self, m: Modifier) -> bool {
        match m {
            Modifier::Shift => self.shift,
            Modifier::Alt => self.alt,
            Modifier::Ctrl => self.ctrl,
            Modifier::Meta => self.meta,
        }
    }

    /// Held modifiers in canonical order (ctrl, alt, shift, meta).
    pub fn iter(self) -> impl Iterator<Item = Modifier> {
        [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Meta]
            .into_iter()
            .filter(move |m| self.contains(*m))
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for m in self.iter() {
            if !first {
                write!(f, "+")?;
            }
            write!(f, "{}", m.to_spec())?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_specs() {
        assert_eq!(Modifier::from_spec("shift"), Some(Modifier::Shift));
        assert_eq!(Modifier::from_spec("alt"), Some(Modifier::Alt));
        assert_eq!(Modifier::from_spec("opt"), Some(Modifier::Alt));
        assert_eq!(Modifier::from_spec("CTRL"), Some(Modifier::Ctrl));
        assert_eq!(Modifier::from_spec("cmd"), Some(Modifier::Meta));
        assert_eq!(Modifier::from_spec("hyper"), None);
    }

    #[test]
    fn exact_set_equality() {
        let mut a = Modifiers::NONE;
        a.insert(Modifier::Shift);
        assert_eq!(a, Modifiers::SHIFT);

        // Any extra modifier breaks equality.
        a.insert(Modifier::Meta);
        assert_ne!(a, Modifiers::SHIFT);
        assert!(!a.is_empty());
    }

    #[test]
    fn display_canonical_order() {
        let mut m = Modifiers::NONE;
        m.insert(Modifier::Shift);
        m.insert(Modifier::Ctrl);
        assert_eq!(m.to_string(), "ctrl+shift");
        assert_eq!(Modifiers::NONE.to_string(), "");
    }
}
