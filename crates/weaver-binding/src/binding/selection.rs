//! Carrying view selections across remote mutations.

use std::collections::BTreeMap;

use crate::crdt::CrdtText;
use crate::position::{RelativeSelection, relative_to_selection, selection_to_relative};
use crate::types::Selection;

use super::{Inner, SyncState, ViewKey};

impl<T: CrdtText> Inner<T> {
    /// Replace the saved selections with the current ones of every view
    /// showing the model. Only meaningful while editor and CRDT text agree,
    /// so nothing is captured mid-apply.
    pub(super) fn snapshot_selections(&self) {
        if self.state.get() != SyncState::Idle {
            return;
        }
        let mut saved = BTreeMap::new();
        for (key, view) in self.views() {
            if !self.shows_model(&**view) {
                continue;
            }
            let Some(selection) = view.selection() else {
                continue;
            };
            if let Some(rel) = self.capture(key, &selection) {
                saved.insert(key, rel);
            }
        }
        *self.saved.borrow_mut() = saved;
    }

    /// Refresh the saved selection of one view.
    pub(super) fn snapshot_view(&self, key: ViewKey, selection: &Selection) {
        if !self.shows_model(&*self.views[key.0]) {
            return;
        }
        if let Some(rel) = self.capture(key, selection) {
            self.saved.borrow_mut().insert(key, rel);
        }
    }

    fn capture(&self, key: ViewKey, selection: &Selection) -> Option<RelativeSelection<T::Cursor>> {
        match selection_to_relative(selection, &*self.model, &self.text) {
            Ok(rel) => Some(rel),
            Err(e) => {
                tracing::warn!(view = key.0, "Failed to capture selection: {e}");
                None
            }
        }
    }

    /// Put saved selections back on their views.
    ///
    /// A selection whose cursors no longer resolve leaves the view's current
    /// selection untouched.
    pub(super) fn restore_selections(&self, saved: BTreeMap<ViewKey, RelativeSelection<T::Cursor>>) {
        for (key, rel) in saved {
            let view = &self.views[key.0];
            if !self.shows_model(&**view) {
                continue;
            }
            match relative_to_selection(&rel, &*self.model, &self.text) {
                Some(selection) if view.selection() != Some(selection) => {
                    view.set_selection(selection);
                }
                Some(_) => {}
                None => tracing::debug!(view = key.0, "saved selection no longer resolves"),
            }
        }
    }
}
