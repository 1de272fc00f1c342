//! Forwarding editor changes into the CRDT.

use crate::crdt::CrdtText;
use crate::error::BindingError;
use crate::types::{ContentChange, ContentChangeEvent};

use super::{Inner, SyncState};

impl<T: CrdtText> Inner<T> {
    /// Forward one editor change event as a single CRDT commit.
    ///
    /// Changes carry offsets into the pre-edit text, so they are applied
    /// highest offset first. Events raised while a remote batch is being
    /// replayed are ignored.
    pub(super) fn forward_local_change(&self, event: &ContentChangeEvent) -> Result<(), BindingError> {
        if self.state.get() != SyncState::Idle {
            tracing::trace!(changes = event.changes.len(), "ignoring change from remote apply");
            return Ok(());
        }

        let mut changes: Vec<&ContentChange> = event.changes.iter().collect();
        changes.sort_by(|a, b| b.range_offset.cmp(&a.range_offset));

        let result = changes
            .iter()
            .try_for_each(|change| self.apply_local_change(change));
        // Whatever made it in goes out as one change.
        self.text.commit();
        result?;

        tracing::debug!(
            changes = changes.len(),
            flush = event.is_flush,
            "forwarded local change"
        );
        self.snapshot_selections();
        Ok(())
    }

    fn apply_local_change(&self, change: &ContentChange) -> Result<(), BindingError> {
        if change.range_length > 0 {
            self.text.delete(change.range_offset, change.range_length)?;
        }
        if !change.text.is_empty() {
            self.text.insert(change.range_offset, &change.text)?;
        }
        Ok(())
    }
}
