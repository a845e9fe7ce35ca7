//! Per-editor interception bookkeeping.
//!
//! Each tracked editor holds a [`Binding`] that captured the settings in
//! effect when the binding was installed. Classification always reads the
//! captured pair, so a stale binding keeps its old behavior until
//! [`EditorBindings::rebind_all`] refreshes every capture.

use std::collections::HashMap;

use sendkey_protocol::Settings;
use tracing::debug;

use crate::surface::{EditorId, MutationBatch};

/// One installed interception hook and the settings it captured.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Binding {
    /// Settings pair captured when this binding was installed or refreshed.
    pub settings: Settings,
    /// Rebind generation this capture belongs to.
    pub generation: u64,
}

/// Tracks which editors currently have an interception hook installed.
#[derive(Debug, Default)]
pub struct EditorBindings {
    map: HashMap<EditorId, Binding>,
    generation: u64,
}

impl EditorBindings {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of editors currently bound.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no editor is bound.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The capture generation installed by the last rebind.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Look up the binding for one editor.
    pub fn get(&self, editor: EditorId) -> Option<Binding> {
        self.map.get(&editor).copied()
    }

    /// Bound editors and their captures, in no particular order.
    pub fn snapshot(&self) -> Vec<(EditorId, Binding)> {
        self.map.iter().map(|(id, b)| (*id, *b)).collect()
    }

    /// Reconcile the table against the full set of editors present now.
    ///
    /// New editors are bound with `settings`; editors no longer present are
    /// dropped. Existing bindings keep their captures untouched.
    pub fn ensure(&mut self, present: &[EditorId], settings: &Settings) {
        let removed: Vec<EditorId> = self
            .map
            .keys()
            .filter(|id| !present.contains(id))
            .copied()
            .collect();
        for id in removed {
            self.unbind(id);
        }
        for id in present {
            self.bind(*id, settings);
        }
    }

    /// Apply one mutation batch: bind added editors, drop removed ones.
    pub fn sync(&mut self, batch: &MutationBatch, settings: &Settings) {
        for id in &batch.removed {
            self.unbind(*id);
        }
        for id in &batch.added {
            self.bind(*id, settings);
        }
    }

    /// Refresh every capture to `settings` under a new generation.
    pub fn rebind_all(&mut self, settings: &Settings) {
        self.generation += 1;
        for (id, binding) in self.map.iter_mut() {
            debug!(
                editor = %id,
                generation = self.generation,
                "rebind: {} / {}",
                settings.send.as_spec(),
                settings.newline.as_spec()
            );
            binding.settings = *settings;
            binding.generation = self.generation;
        }
    }

    fn bind(&mut self, editor: EditorId, settings: &Settings) {
        if self.map.contains_key(&editor) {
            // Duplicate announcement; the existing capture stands.
            return;
        }
        debug!(editor = %editor, generation = self.generation, "bind");
        self.map.insert(
            editor,
            Binding {
                settings: *settings,
                generation: self.generation,
            },
        );
    }

    fn unbind(&mut self, editor: EditorId) {
        if self.map.remove(&editor).is_some() {
            debug!(editor = %editor, "unbind");
        }
    }
}

#[cfg(test)]
mod tests {
    use keychord::Chord;

    use super::*;

    fn ed(n: u64) -> EditorId {
        EditorId(n)
    }

    #[test]
    fn ensure_binds_and_prunes() {
        let mut b = EditorBindings::new();
        let s = Settings::default();
        b.ensure(&[ed(1), ed(2)], &s);
        assert_eq!(b.len(), 2);

        b.ensure(&[ed(2), ed(3)], &s);
        assert!(b.get(ed(1)).is_none());
        assert!(b.get(ed(2)).is_some());
        assert!(b.get(ed(3)).is_some());
    }

    #[test]
    fn duplicate_add_keeps_original_capture() {
        let mut b = EditorBindings::new();
        let first = Settings::default();
        b.sync(
            &MutationBatch {
                added: vec![ed(7)],
                removed: vec![],
            },
            &first,
        );

        let mut later = Settings::default();
        later.assign(sendkey_protocol::ActionSlot::Send, Chord::CtrlEnter);
        b.sync(
            &MutationBatch {
                added: vec![ed(7)],
                removed: vec![],
            },
            &later,
        );

        let binding = b.get(ed(7)).unwrap();
        assert_eq!(binding.settings, first);
    }

    #[test]
    fn rebind_all_bumps_generation_and_refreshes_captures() {
        let mut b = EditorBindings::new();
        b.ensure(&[ed(1), ed(2)], &Settings::default());
        assert_eq!(b.generation(), 0);

        let mut custom = Settings::default();
        custom.assign(sendkey_protocol::ActionSlot::Newline, Chord::Enter);
        b.rebind_all(&custom);

        assert_eq!(b.generation(), 1);
        for (_, binding) in b.snapshot() {
            assert_eq!(binding.settings, custom);
            assert_eq!(binding.generation, 1);
        }
    }

    #[test]
    fn remove_then_add_in_one_batch() {
        let mut b = EditorBindings::new();
        let s = Settings::default();
        b.ensure(&[ed(4)], &s);
        b.sync(
            &MutationBatch {
                added: vec![ed(5)],
                removed: vec![ed(4)],
            },
            &s,
        );
        assert!(b.get(ed(4)).is_none());
        assert!(b.get(ed(5)).is_some());
    }
}
