//! A scripted host surface.
//!
//! [`ScriptedPage`] is a fully in-memory [`EditorHost`]: editors are plain
//! text buffers with optional send controls, and every synthetic dispatch is
//! recorded and streamed instead of acted on. Callers decide what a key
//! event does by feeding it back through the remapper and then applying
//! [`ScriptedPage::apply_native`] for events that were not suppressed. The
//! crate's tests and the interactive driver both run on it.

use std::collections::HashMap;

use async_trait::async_trait;
use keychord::{Key, KeyEvent, Modifiers};
use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{
    error::{Error, Result},
    surface::{ControlSelector, EditorHost, EditorId, MutationBatch, SendControl},
};

#[derive(Default)]
struct EditorState {
    buffer: String,
    sent: Vec<String>,
    controls: HashMap<ControlSelector, bool>,
    dispatched: Vec<KeyEvent>,
}

#[derive(Default)]
struct PageState {
    next_id: u64,
    editors: HashMap<EditorId, EditorState>,
    mutation_feeds: Vec<UnboundedSender<MutationBatch>>,
    event_feeds: Vec<UnboundedSender<(EditorId, KeyEvent)>>,
    clicks: Vec<(EditorId, ControlSelector)>,
    fail_clicks: bool,
}

impl PageState {
    fn announce(&mut self, batch: MutationBatch) {
        self.mutation_feeds
            .retain(|tx| tx.send(batch.clone()).is_ok());
    }
}

/// An in-memory page of scripted composer editors.
#[derive(Default)]
pub struct ScriptedPage {
    state: Mutex<PageState>,
}

impl ScriptedPage {
    /// Create an empty page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an editor with no send control and announce it.
    pub fn add_editor(&self) -> EditorId {
        let mut state = self.state.lock();
        let id = EditorId(state.next_id);
        state.next_id += 1;
        state.editors.insert(id, EditorState::default());
        state.announce(MutationBatch {
            added: vec![id],
            removed: vec![],
        });
        id
    }

    /// Add an editor carrying one send control and announce it.
    pub fn add_editor_with_control(&self, selector: ControlSelector, enabled: bool) -> EditorId {
        let id = self.add_editor();
        self.set_control(id, selector, enabled);
        id
    }

    /// Add or update a send control on an existing editor.
    pub fn set_control(&self, editor: EditorId, selector: ControlSelector, enabled: bool) {
        let mut state = self.state.lock();
        if let Some(ed) = state.editors.get_mut(&editor) {
            ed.controls.insert(selector, enabled);
        }
    }

    /// Remove an editor and announce the removal.
    pub fn remove_editor(&self, editor: EditorId) {
        let mut state = self.state.lock();
        if state.editors.remove(&editor).is_some() {
            state.announce(MutationBatch {
                added: vec![],
                removed: vec![editor],
            });
        }
    }

    /// Announce an editor as added again, even though it already is.
    pub fn announce_added(&self, editor: EditorId) {
        self.state.lock().announce(MutationBatch {
            added: vec![editor],
            removed: vec![],
        });
    }

    /// Make every subsequent click fail, or stop doing so.
    pub fn fail_clicks(&self, fail: bool) {
        self.state.lock().fail_clicks = fail;
    }

    /// Append text to an editor's composer buffer.
    pub fn type_text(&self, editor: EditorId, text: &str) {
        let mut state = self.state.lock();
        if let Some(ed) = state.editors.get_mut(&editor) {
            ed.buffer.push_str(text);
        }
    }

    /// Apply the host-native effect of one key event.
    ///
    /// Enter sends the buffer, Shift+Enter breaks the line, single
    /// characters without modifiers type themselves, and every other chord
    /// is inert. An empty buffer never sends.
    pub fn apply_native(&self, editor: EditorId, event: &KeyEvent) {
        let mut state = self.state.lock();
        let Some(ed) = state.editors.get_mut(&editor) else {
            return;
        };
        match (&event.key, event.modifiers) {
            (Key::Enter, Modifiers::NONE) => {
                if !ed.buffer.is_empty() {
                    let msg = std::mem::take(&mut ed.buffer);
                    ed.sent.push(msg);
                }
            }
            (Key::Enter, Modifiers::SHIFT) => ed.buffer.push('\n'),
            (Key::Enter, _) => {}
            (Key::Other(text), mods) if mods.is_empty() && text.chars().count() == 1 => {
                ed.buffer.push_str(text);
            }
            (Key::Other(_), _) => {}
        }
    }

    /// The editor's current composer buffer.
    pub fn buffer(&self, editor: EditorId) -> String {
        self.state
            .lock()
            .editors
            .get(&editor)
            .map(|ed| ed.buffer.clone())
            .unwrap_or_default()
    }

    /// Messages the editor has sent, oldest first.
    pub fn sent_messages(&self, editor: EditorId) -> Vec<String> {
        self.state
            .lock()
            .editors
            .get(&editor)
            .map(|ed| ed.sent.clone())
            .unwrap_or_default()
    }

    /// Every send-control click attempt, in order.
    pub fn clicks(&self) -> Vec<(EditorId, ControlSelector)> {
        self.state.lock().clicks.clone()
    }

    /// Synthetic events dispatched into one editor, in order.
    pub fn dispatched(&self, editor: EditorId) -> Vec<KeyEvent> {
        self.state
            .lock()
            .editors
            .get(&editor)
            .map(|ed| ed.dispatched.clone())
            .unwrap_or_default()
    }

    /// A live stream of synthetic dispatches across all editors.
    pub fn events(&self) -> UnboundedReceiver<(EditorId, KeyEvent)> {
        let (tx, rx) = unbounded_channel();
        self.state.lock().event_feeds.push(tx);
        rx
    }
}

#[async_trait]
impl EditorHost for ScriptedPage {
    async fn editors(&self) -> Vec<EditorId> {
        let mut ids: Vec<EditorId> = self.state.lock().editors.keys().copied().collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    async fn query_control(
        &self,
        editor: EditorId,
        selector: ControlSelector,
    ) -> Option<SendControl> {
        let state = self.state.lock();
        let enabled = *state.editors.get(&editor)?.controls.get(&selector)?;
        Some(SendControl {
            editor,
            selector,
            enabled,
        })
    }

    async fn click(&self, control: SendControl) -> Result<()> {
        let state = &mut *self.state.lock();
        let Some(ed) = state.editors.get_mut(&control.editor) else {
            return Err(Error::EditorGone(control.editor));
        };
        // Attempts are recorded even when the click then fails.
        state.clicks.push((control.editor, control.selector));
        if state.fail_clicks {
            return Err(Error::Dispatch("scripted click failure".into()));
        }
        if !ed.buffer.is_empty() {
            let msg = std::mem::take(&mut ed.buffer);
            ed.sent.push(msg);
        }
        Ok(())
    }

    async fn dispatch_key(&self, editor: EditorId, event: KeyEvent) -> Result<()> {
        let mut state = self.state.lock();
        let Some(ed) = state.editors.get_mut(&editor) else {
            return Err(Error::EditorGone(editor));
        };
        ed.dispatched.push(event.clone());
        state
            .event_feeds
            .retain(|tx| tx.send((editor, event.clone())).is_ok());
        Ok(())
    }

    fn mutations(&self) -> UnboundedReceiver<MutationBatch> {
        let (tx, rx) = unbounded_channel();
        self.state.lock().mutation_feeds.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn native_effects_send_and_break() {
        let page = ScriptedPage::new();
        let ed = page.add_editor();
        page.type_text(ed, "hi");
        page.apply_native(ed, &KeyEvent::enter(Modifiers::SHIFT));
        page.type_text(ed, "there");
        assert_eq!(page.buffer(ed), "hi\nthere");

        page.apply_native(ed, &KeyEvent::enter(Modifiers::NONE));
        assert_eq!(page.sent_messages(ed), vec!["hi\nthere".to_string()]);
        assert_eq!(page.buffer(ed), "");

        // Empty buffer never sends.
        page.apply_native(ed, &KeyEvent::enter(Modifiers::NONE));
        assert_eq!(page.sent_messages(ed).len(), 1);
    }

    #[tokio::test]
    async fn single_characters_type_through_native_path() {
        let page = ScriptedPage::new();
        let ed = page.add_editor();
        page.apply_native(ed, &KeyEvent::new(Key::Other("a".into()), Modifiers::NONE));
        page.apply_native(ed, &KeyEvent::new(Key::Other("b".into()), Modifiers::CTRL));
        assert_eq!(page.buffer(ed), "a");
    }

    #[tokio::test]
    async fn mutation_feed_sees_adds_and_removes() {
        let page = ScriptedPage::new();
        let mut feed = page.mutations();
        let ed = page.add_editor();
        page.remove_editor(ed);

        let added = feed.recv().await.unwrap();
        assert_eq!(added.added, vec![ed]);
        let removed = feed.recv().await.unwrap();
        assert_eq!(removed.removed, vec![ed]);
    }

    #[tokio::test]
    async fn dispatch_to_removed_editor_errors() {
        let page = ScriptedPage::new();
        let ed = page.add_editor();
        page.remove_editor(ed);
        let err = page
            .dispatch_key(ed, KeyEvent::enter(Modifiers::NONE))
            .await
            .unwrap_err();
        assert_eq!(err, Error::EditorGone(ed));
    }
}
