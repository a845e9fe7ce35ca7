//! keychord: key chords and key events for the sendkey remapper.
//!
//! - `Modifier` / `Modifiers`: modifier keys and an exact-match modifier set.
//! - `Key` / `KeyEvent`: a pressed key with the modifiers held at press time.
//! - `Chord`: the closed set of remappable Enter chords, with parsing and a
//!   canonical ordering used for conflict resolution.
//!
//! Matching is always exact: a chord matches an event only when the event's
//! modifier set equals the chord's, so a held meta key disqualifies every
//! chord in the set.

mod modifiers;
pub use modifiers::{Modifier, Modifiers};

mod event;
pub use event::{Key, KeyEvent};

mod chord;
pub use chord::Chord;
