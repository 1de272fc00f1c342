//! Replaying CRDT diff batches into the editor model.

use crate::crdt::{CrdtText, DiffBatch, DiffOp, TextDiff};
use crate::error::BindingError;
use crate::types::{ModelEdit, Position, TextRange};

use super::{Inner, RemoteApplyGuard};

impl<T: CrdtText> Inner<T> {
    /// Apply one diff batch to the editor model.
    ///
    /// Local batches are echoes of changes we already forwarded and are
    /// skipped. Events are applied in order, each against the text left by
    /// the previous one. On success the views' selections are restored from
    /// the snapshot taken before the batch, and presence is re-rendered.
    pub(super) fn apply_remote_batch(&self, batch: &DiffBatch) -> Result<(), BindingError> {
        if batch.origin.is_local() {
            tracing::trace!(events = batch.events.len(), "skipping local echo");
            return Ok(());
        }

        {
            let _guard = RemoteApplyGuard::enter(&self.state);
            for diff in &batch.events {
                self.apply_text_diff(diff)?;
            }
        }

        let saved = std::mem::take(&mut *self.saved.borrow_mut());
        self.restore_selections(saved);
        self.snapshot_selections();
        self.render_presence();

        tracing::debug!(
            origin = ?batch.origin,
            events = batch.events.len(),
            "applied remote batch"
        );
        Ok(())
    }

    fn apply_text_diff(&self, diff: &TextDiff) -> Result<(), BindingError> {
        let mut index = 0;
        for op in &diff.ops {
            match op {
                DiffOp::Retain(n) => index += n,
                DiffOp::Insert(text) => {
                    let at = self.position_checked(index)?;
                    self.model
                        .apply_edits(&[ModelEdit::insert(at, text.as_str())])?;
                    index += text.chars().count();
                }
                DiffOp::Delete(n) => {
                    let start = self.position_checked(index)?;
                    let end = self.position_checked(index + n)?;
                    self.model
                        .apply_edits(&[ModelEdit::delete(TextRange::new(start, end))])?;
                }
                DiffOp::Unknown(tag) => {
                    tracing::error!(%tag, "unexpected operation in text diff");
                    return Err(BindingError::InvalidOperation(tag.clone()));
                }
            }
        }
        Ok(())
    }

    /// Position of `offset`, failing instead of clamping when the model is
    /// shorter than the diff expects.
    fn position_checked(&self, offset: usize) -> Result<Position, BindingError> {
        let position = self.model.position_at(offset);
        let resolved = self.model.offset_at(position);
        if resolved != offset {
            return Err(BindingError::OffsetOutOfBounds {
                offset,
                len: resolved,
            });
        }
        Ok(position)
    }
}
