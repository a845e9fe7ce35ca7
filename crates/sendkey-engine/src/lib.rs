//! sendkey-engine: intercepts Enter presses in a composer surface and remaps
//! them to the user's configured send / newline actions.
//!
//! One [`Remapper`] serves one document context. It owns:
//! - a settings cache, replaced wholesale when the coordinator pushes an
//!   update;
//! - per-editor bindings, each capturing the settings current at install
//!   time ([`EditorBindings`]);
//! - a guard flag marking the window during which our own synthetic events
//!   are in flight ([`SyntheticGuard`]);
//! - a dispatcher that suppresses now and re-emits later
//!   ([`SyntheticDispatcher`]).
//!
//! The host surface is injected behind the [`EditorHost`] trait; the crate
//! ships [`ScriptedPage`], an in-memory host used by the tests and the
//! interactive driver.

pub use keychord::{Chord, Key, KeyEvent, Modifiers};
pub use sendkey_protocol::Settings;

mod bindings;
mod decide;
mod dispatch;
mod error;
mod guard;
mod remapper;
pub mod scripted;
mod surface;

pub use bindings::{Binding, EditorBindings};
pub use decide::{Decision, NATIVE_NEWLINE, NATIVE_SEND, decide};
pub use dispatch::{GUARD_RELEASE_DELAY, SYNTH_DISPATCH_DELAY, SyntheticDispatcher};
pub use error::{Error, Result};
pub use guard::SyntheticGuard;
pub use remapper::{Outcome, Remapper};
pub use scripted::ScriptedPage;
pub use surface::{ControlSelector, EditorHost, EditorId, MutationBatch, SendControl};
