//! Capture-phase interception and remapping.

use std::{fmt, sync::Arc};

use keychord::KeyEvent;
use parking_lot::{Mutex, RwLock};
use sendkey_protocol::Settings;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::{
    bindings::{Binding, EditorBindings},
    decide::{Decision, NATIVE_NEWLINE, decide},
    dispatch::SyntheticDispatcher,
    guard::SyntheticGuard,
    surface::{ControlSelector, EditorHost, EditorId},
};

/// What [`Remapper::on_key`] did with one observed event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The editor has no binding; the event was never ours to touch.
    Unbound,
    /// Classified but deliberately left to the host.
    Untouched(Decision),
    /// Suppressed; a synthetic native newline is on its way.
    NewlineScheduled,
    /// Suppressed; a send control was clicked via this selector.
    SentViaControl(ControlSelector),
    /// Suppressed; no usable control, a synthetic native send is on its way.
    SentSynthetic,
}

impl Outcome {
    /// Whether the native event must be consumed.
    pub fn suppresses(&self) -> bool {
        matches!(
            self,
            Self::NewlineScheduled | Self::SentViaControl(_) | Self::SentSynthetic
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "unbound editor"),
            Self::Untouched(Decision::NotEnter) => write!(f, "not enter"),
            Self::Untouched(Decision::SyntheticIgnored) => write!(f, "synthetic (guard up)"),
            Self::Untouched(Decision::NativeNewline) => write!(f, "native newline"),
            Self::Untouched(Decision::NativeSend) => write!(f, "native send"),
            Self::Untouched(Decision::PassThrough) => write!(f, "pass-through"),
            Self::Untouched(d) => write!(f, "untouched ({d:?})"),
            Self::NewlineScheduled => write!(f, "newline scheduled"),
            Self::SentViaControl(sel) => write!(f, "send via {}", sel.as_str()),
            Self::SentSynthetic => write!(f, "send via synthetic enter"),
        }
    }
}

/// The remapping engine for one host surface.
///
/// Owns the settings cache and the per-editor binding table. Classification
/// of an event always uses the settings captured by that editor's binding,
/// so behavior only changes when [`Remapper::apply_settings`] rebinds.
#[derive(Clone)]
pub struct Remapper {
    host: Arc<dyn EditorHost>,
    settings: Arc<RwLock<Settings>>,
    bindings: Arc<Mutex<EditorBindings>>,
    guard: SyntheticGuard,
    dispatcher: SyntheticDispatcher,
}

impl Remapper {
    /// Create a remapper over `host` seeded with `settings`.
    pub fn new(host: Arc<dyn EditorHost>, settings: Settings) -> Self {
        let guard = SyntheticGuard::new();
        let dispatcher = SyntheticDispatcher::new(Arc::clone(&host), guard.clone());
        Self {
            host,
            settings: Arc::new(RwLock::new(settings)),
            bindings: Arc::new(Mutex::new(EditorBindings::new())),
            guard,
            dispatcher,
        }
    }

    /// Bind every editor currently present on the host.
    pub async fn install(&self) {
        let present = self.host.editors().await;
        let settings = *self.settings.read();
        let mut bindings = self.bindings.lock();
        bindings.ensure(&present, &settings);
        debug!("bound {} editors", bindings.len());
    }

    /// Follow host mutations, binding added editors and dropping removed
    /// ones, until the feed closes or `cancel` fires.
    pub fn spawn_mutation_pump(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let mut feed = self.host.mutations();
        let settings = Arc::clone(&self.settings);
        let bindings = Arc::clone(&self.bindings);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    batch = feed.recv() => match batch {
                        Some(batch) => {
                            let current = *settings.read();
                            bindings.lock().sync(&batch, &current);
                        }
                        None => break,
                    },
                }
            }
        })
    }

    /// Replace the settings cache and refresh every binding's capture.
    pub fn apply_settings(&self, settings: Settings) {
        info!(send = %settings.send, newline = %settings.newline, "settings applied");
        *self.settings.write() = settings;
        self.bindings.lock().rebind_all(&settings);
    }

    /// The current settings cache.
    pub fn settings(&self) -> Settings {
        *self.settings.read()
    }

    /// The shared synthetic-event guard.
    pub fn guard(&self) -> SyntheticGuard {
        self.guard.clone()
    }

    /// Bound editors and their captures.
    pub fn bindings_snapshot(&self) -> Vec<(EditorId, Binding)> {
        self.bindings.lock().snapshot()
    }

    /// Handle one capture-phase key event on `editor`.
    ///
    /// Never fails: dispatch and probe errors degrade to a fallback path or
    /// a dropped keystroke, and the outcome reports what actually happened.
    pub async fn on_key(&self, editor: EditorId, event: &KeyEvent) -> Outcome {
        let Some(binding) = self.bindings.lock().get(editor) else {
            return Outcome::Unbound;
        };
        let decision = decide(&binding.settings, self.guard.is_raised(), event);
        trace!(editor = %editor, ?decision, "{}", event);
        match decision {
            Decision::NotEnter
            | Decision::SyntheticIgnored
            | Decision::NativeNewline
            | Decision::NativeSend
            | Decision::PassThrough => Outcome::Untouched(decision),
            Decision::InsertNewline => {
                self.dispatcher.dispatch_chord(editor, NATIVE_NEWLINE);
                Outcome::NewlineScheduled
            }
            Decision::TriggerSend => match self.dispatcher.trigger_send(editor).await {
                Some(selector) => Outcome::SentViaControl(selector),
                None => Outcome::SentSynthetic,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use keychord::Modifiers;

    use super::*;
    use crate::scripted::ScriptedPage;

    #[tokio::test(start_paused = true)]
    async fn unbound_editor_is_untouchable() {
        let page = Arc::new(ScriptedPage::new());
        let ed = page.add_editor();
        let remapper = Remapper::new(page.clone(), Settings::default());
        // No install: the editor exists but carries no binding.
        let out = remapper
            .on_key(ed, &KeyEvent::enter(Modifiers::NONE))
            .await;
        assert_eq!(out, Outcome::Unbound);
        assert!(!out.suppresses());
    }

    #[test]
    fn suppression_maps_to_remapped_outcomes() {
        assert!(Outcome::NewlineScheduled.suppresses());
        assert!(Outcome::SentViaControl(ControlSelector::TestId).suppresses());
        assert!(Outcome::SentSynthetic.suppresses());
        assert!(!Outcome::Unbound.suppresses());
        assert!(!Outcome::Untouched(Decision::NativeSend).suppresses());
    }
}
