//! Publishing the local selection and rendering remote ones.

use std::collections::BTreeMap;

use smol_str::format_smolstr;

use crate::awareness::{PeerState, PresenceSelection};
use crate::config::BindingOptions;
use crate::crdt::{CrdtText, PeerId};
use crate::error::BindingError;
use crate::model::EditorModel;
use crate::position::{from_logical_cursor, to_logical_cursor};
use crate::types::{Decoration, Selection, TextRange};

use super::Inner;

/// Resolve an encoded cursor, `None` if it cannot be decoded or resolved.
fn resolve_encoded<T: CrdtText>(text: &T, peer: PeerId, bytes: &[u8]) -> Option<usize> {
    match text.decode_cursor(bytes) {
        Ok(cursor) => from_logical_cursor(text, &cursor),
        Err(e) => {
            tracing::debug!(peer, "Skipping undecodable presence cursor: {e}");
            None
        }
    }
}

/// Decorations for every remote peer with a resolvable selection.
///
/// Each range spans the lower to the higher endpoint. The caret marker sits
/// after the range when the peer's head is past its anchor, before it
/// otherwise.
pub fn presence_decorations<T: CrdtText>(
    text: &T,
    model: &dyn EditorModel,
    states: &BTreeMap<PeerId, PeerState>,
    local: PeerId,
    options: &BindingOptions,
) -> Vec<Decoration> {
    let mut decorations = Vec::new();
    for (peer, state) in states {
        if *peer == local {
            continue;
        }
        let PresenceSelection::Range { anchor, head } = &state.selection else {
            continue;
        };
        let (Some(anchor), Some(head)) = (
            resolve_encoded(text, *peer, anchor),
            resolve_encoded(text, *peer, head),
        ) else {
            continue;
        };

        let sel = &options.selection_class;
        let caret = &options.selection_head_class;
        let marker = Some(format_smolstr!("{caret} {caret}-{peer}"));
        let (before_content_class, after_content_class) = if anchor < head {
            (None, marker)
        } else {
            (marker, None)
        };
        decorations.push(Decoration {
            range: TextRange::new(
                model.position_at(anchor.min(head)),
                model.position_at(anchor.max(head)),
            ),
            class_name: format_smolstr!("{sel} {sel}-{peer}"),
            before_content_class,
            after_content_class,
        });
    }
    decorations
}

impl<T: CrdtText> Inner<T> {
    /// Replace the remote-selection decorations of every view.
    ///
    /// Views showing another model only lose what we rendered earlier.
    pub(super) fn render_presence(&self) {
        let Some(awareness) = &self.awareness else {
            return;
        };
        let decorations = presence_decorations(
            &self.text,
            &*self.model,
            &awareness.all_states(),
            self.text.peer_id(),
            &self.options,
        );

        let mut rendered = std::mem::take(&mut *self.decorations.borrow_mut());
        for (key, view) in self.views() {
            let old = rendered.remove(&key).unwrap_or_default();
            if self.shows_model(&**view) {
                rendered.insert(key, view.delta_decorations(&old, decorations.clone()));
            } else if !old.is_empty() {
                view.delta_decorations(&old, Vec::new());
            }
        }
        tracing::trace!(count = decorations.len(), "rendered presence");
        *self.decorations.borrow_mut() = rendered;
    }

    /// Remove everything `render_presence` added.
    pub(super) fn clear_presence(&self) {
        let rendered = std::mem::take(&mut *self.decorations.borrow_mut());
        for (key, old) in rendered {
            if !old.is_empty() {
                self.views[key.0].delta_decorations(&old, Vec::new());
            }
        }
    }

    /// Publish `selection` as the local peer's presence.
    ///
    /// The rest of the local state is kept; without one an anonymous state
    /// is published.
    pub(super) fn publish_local_selection(&self, selection: &Selection) -> Result<(), BindingError> {
        let Some(awareness) = &self.awareness else {
            return Ok(());
        };
        let anchor = to_logical_cursor(&self.text, self.model.offset_at(selection.anchor))?;
        let head = to_logical_cursor(&self.text, self.model.offset_at(selection.head))?;

        let mut state = awareness
            .local_state()
            .unwrap_or_else(|| PeerState::anonymous(self.text.peer_id()));
        state.selection = PresenceSelection::Range {
            anchor: self.text.encode_cursor(&anchor),
            head: self.text.encode_cursor(&head),
        };
        awareness.set_local_state(state);
        Ok(())
    }
}
