//! Error types for binding operations.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors that can occur while synchronizing a CRDT text with an editor model.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BindingError {
    /// A diff batch contained an operation that is not retain/insert/delete.
    ///
    /// Fatal for the batch: skipping it would leave the editor permanently
    /// out of sync with the replicated text.
    #[error("invalid diff operation: {0}")]
    InvalidOperation(SmolStr),

    /// An offset fell outside the text it was applied to.
    #[error("offset {offset} out of bounds (len {len})")]
    OffsetOutOfBounds { offset: usize, len: usize },

    /// Two edits in one `apply_edits` call touched the same range.
    #[error("overlapping edits at offset {0}")]
    OverlappingEdits(usize),

    /// The CRDT backend rejected a mutation.
    #[error("crdt error: {0}")]
    Crdt(String),

    /// A logical cursor could not be decoded from its encoded form.
    #[error("failed to decode cursor: {0}")]
    CursorDecode(String),

    /// Presence payload serialization failed.
    #[error("presence encoding error: {0}")]
    Presence(#[from] postcard::Error),
}
