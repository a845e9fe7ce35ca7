//! Synthetic redispatch and send triggering.
//!
//! Suppressed events are replayed as host-native chords in two phases: the
//! guard goes up immediately, the synthetic event goes out after a short
//! settle delay, and the guard comes down again a beat later so the looped
//! back event is seen while the guard is still raised.

use std::sync::Arc;

use keychord::Chord;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::{
    decide::NATIVE_SEND,
    guard::SyntheticGuard,
    surface::{ControlSelector, EditorHost, EditorId},
};

/// Delay between raising the guard and emitting the synthetic event.
pub const SYNTH_DISPATCH_DELAY: Duration = Duration::from_millis(20);
/// Delay between emitting the synthetic event and lowering the guard.
pub const GUARD_RELEASE_DELAY: Duration = Duration::from_millis(50);

/// Emits synthetic chords and drives the send-control probe.
#[derive(Clone)]
pub struct SyntheticDispatcher {
    host: Arc<dyn EditorHost>,
    guard: SyntheticGuard,
}

impl SyntheticDispatcher {
    /// Create a dispatcher over `host`, sharing `guard` with the remapper.
    pub fn new(host: Arc<dyn EditorHost>, guard: SyntheticGuard) -> Self {
        Self { host, guard }
    }

    /// Replay `chord` into `editor` as a synthetic event.
    ///
    /// The guard is raised before this returns; emission and release run on
    /// a background task. Dispatch failures are swallowed, the worst case is
    /// a lost keystroke rather than a stuck composer.
    pub fn dispatch_chord(&self, editor: EditorId, chord: Chord) {
        self.guard.raise();
        let host = Arc::clone(&self.host);
        let guard = self.guard.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SYNTH_DISPATCH_DELAY).await;
            if let Err(e) = host.dispatch_key(editor, chord.to_event()).await {
                debug!(editor = %editor, "synthetic {} failed: {}", chord.as_spec(), e);
            }
            tokio::time::sleep(GUARD_RELEASE_DELAY).await;
            guard.lower();
        });
    }

    /// Trigger a send on `editor`.
    ///
    /// Probes send controls in fixed selector order and clicks the first
    /// enabled hit. A disabled or missing control moves the probe on; a
    /// click failure abandons the probe. When no click lands, falls back to
    /// a synthetic native send chord.
    ///
    /// Returns the selector that was clicked, or `None` for the synthetic
    /// fallback.
    pub async fn trigger_send(&self, editor: EditorId) -> Option<ControlSelector> {
        for selector in ControlSelector::PROBE_ORDER {
            let Some(control) = self.host.query_control(editor, selector).await else {
                continue;
            };
            if !control.enabled {
                debug!(
                    editor = %editor,
                    selector = selector.as_str(),
                    "send control disabled, probing on"
                );
                continue;
            }
            match self.host.click(control).await {
                Ok(()) => {
                    debug!(editor = %editor, selector = selector.as_str(), "send via control");
                    return Some(selector);
                }
                Err(e) => {
                    warn!(
                        editor = %editor,
                        selector = selector.as_str(),
                        "send control click failed: {}",
                        e
                    );
                    break;
                }
            }
        }
        debug!(editor = %editor, "send via synthetic {}", NATIVE_SEND.as_spec());
        self.dispatch_chord(editor, NATIVE_SEND);
        None
    }
}

#[cfg(test)]
mod tests {
    use keychord::Modifiers;

    use super::*;
    use crate::scripted::ScriptedPage;

    #[tokio::test(start_paused = true)]
    async fn guard_window_brackets_the_synthetic() {
        let page = Arc::new(ScriptedPage::new());
        let ed = page.add_editor();
        let guard = SyntheticGuard::new();
        let dispatcher = SyntheticDispatcher::new(page.clone(), guard.clone());
        let mut events = page.events();

        dispatcher.dispatch_chord(ed, Chord::ShiftEnter);
        assert!(guard.is_raised(), "guard must be up before emission");

        let (editor, event) = events.recv().await.unwrap();
        assert_eq!(editor, ed);
        assert_eq!(event, Chord::ShiftEnter.to_event());
        assert!(guard.is_raised(), "guard must cover the emitted event");

        tokio::time::advance(GUARD_RELEASE_DELAY).await;
        tokio::task::yield_now().await;
        assert!(!guard.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_clicks_first_enabled_control() {
        let page = Arc::new(ScriptedPage::new());
        let ed = page.add_editor_with_control(ControlSelector::AriaLabel, true);
        let dispatcher = SyntheticDispatcher::new(page.clone(), SyntheticGuard::new());

        let hit = dispatcher.trigger_send(ed).await;
        assert_eq!(hit, Some(ControlSelector::AriaLabel));
        assert_eq!(page.clicks(), vec![(ed, ControlSelector::AriaLabel)]);
        assert!(page.dispatched(ed).is_empty(), "no synthetic on a clean click");
    }

    #[tokio::test(start_paused = true)]
    async fn probe_skips_disabled_control() {
        let page = Arc::new(ScriptedPage::new());
        let ed = page.add_editor_with_control(ControlSelector::TestId, false);
        page.set_control(ed, ControlSelector::Structural, true);
        let dispatcher = SyntheticDispatcher::new(page.clone(), SyntheticGuard::new());

        let hit = dispatcher.trigger_send(ed).await;
        assert_eq!(hit, Some(ControlSelector::Structural));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_control_falls_back_to_synthetic_send() {
        let page = Arc::new(ScriptedPage::new());
        let ed = page.add_editor();
        let guard = SyntheticGuard::new();
        let dispatcher = SyntheticDispatcher::new(page.clone(), guard.clone());
        let mut events = page.events();

        let hit = dispatcher.trigger_send(ed).await;
        assert_eq!(hit, None);
        assert!(guard.is_raised(), "fallback synthetic is guarded too");

        let (_, event) = events.recv().await.unwrap();
        assert_eq!(event, keychord::KeyEvent::enter(Modifiers::NONE));
    }

    #[tokio::test(start_paused = true)]
    async fn click_failure_abandons_probe_and_goes_synthetic() {
        let page = Arc::new(ScriptedPage::new());
        let ed = page.add_editor_with_control(ControlSelector::TestId, true);
        page.set_control(ed, ControlSelector::AriaLabel, true);
        page.fail_clicks(true);
        let dispatcher = SyntheticDispatcher::new(page.clone(), SyntheticGuard::new());
        let mut events = page.events();

        let hit = dispatcher.trigger_send(ed).await;
        assert_eq!(hit, None);
        // Only the first probe hit is attempted once the click errors.
        assert_eq!(page.clicks(), vec![(ed, ControlSelector::TestId)]);

        let (_, event) = events.recv().await.unwrap();
        assert_eq!(event, keychord::KeyEvent::enter(Modifiers::NONE));
    }
}
