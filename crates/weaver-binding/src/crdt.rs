//! CRDT text contract and diff event types.
//!
//! The binding does not care how the replicated text converges. It needs
//! plain-text access, offset-based mutation grouped into commits, logical
//! cursors that survive concurrent edits, and a synchronous diff feed.

use std::fmt;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::error::BindingError;
use crate::event::Subscription;

/// Identity of one replica.
pub type PeerId = u64;

/// Where a diff batch came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Produced by a local commit. For the binding this is always the echo
    /// of an edit it already forwarded.
    Local,
    /// Changes imported from another peer.
    Remote,
    /// The document was checked out to another version.
    Checkout,
}

impl Origin {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// One step of a text diff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffOp {
    /// Skip `n` chars.
    Retain(usize),
    /// Insert text at the current index.
    Insert(String),
    /// Remove `n` chars at the current index.
    Delete(usize),
    /// Anything the source could not express as a text delta.
    Unknown(SmolStr),
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retain(n) => write!(f, "retain({n})"),
            Self::Insert(text) => write!(f, "insert({} chars)", text.chars().count()),
            Self::Delete(n) => write!(f, "delete({n})"),
            Self::Unknown(tag) => write!(f, "unknown({tag})"),
        }
    }
}

/// The ordered diff of one text event.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TextDiff {
    pub ops: Vec<DiffOp>,
}

impl TextDiff {
    pub fn new(ops: Vec<DiffOp>) -> Self {
        Self { ops }
    }

    /// Apply this diff to `text`, returning the new text.
    ///
    /// Unknown operations and out-of-range retains/deletes yield an error.
    pub fn apply_to(&self, text: &str) -> Result<String, BindingError> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut index = 0;

        for op in &self.ops {
            match op {
                DiffOp::Retain(n) | DiffOp::Delete(n) => {
                    let end = index + n;
                    if end > chars.len() {
                        return Err(BindingError::OffsetOutOfBounds {
                            offset: end,
                            len: chars.len(),
                        });
                    }
                    if let DiffOp::Retain(_) = op {
                        out.extend(&chars[index..end]);
                    }
                    index = end;
                }
                DiffOp::Insert(inserted) => out.push_str(inserted),
                DiffOp::Unknown(tag) => return Err(BindingError::InvalidOperation(tag.clone())),
            }
        }

        out.extend(&chars[index..]);
        Ok(out)
    }
}

/// A set of text events delivered together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffBatch {
    pub origin: Origin,
    pub events: Vec<TextDiff>,
}

impl DiffBatch {
    pub fn new(origin: Origin, events: Vec<TextDiff>) -> Self {
        Self { origin, events }
    }
}

/// Receives diff batches. The result is returned to whoever delivered the batch.
pub type DiffHandler = Rc<dyn Fn(&DiffBatch) -> Result<(), BindingError>>;

/// A replicated text the binding can drive.
///
/// Offsets are chars. Methods take `&self`: CRDT handles are shared and
/// mutated through interior mutability.
pub trait CrdtText {
    /// Stable logical position into the text.
    type Cursor: Clone + fmt::Debug;

    /// Identity of the local replica.
    fn peer_id(&self) -> PeerId;

    /// Current plain-text content.
    fn content(&self) -> String;

    fn len_chars(&self) -> usize;

    fn insert(&self, offset: usize, text: &str) -> Result<(), BindingError>;

    fn delete(&self, offset: usize, len: usize) -> Result<(), BindingError>;

    /// Close the pending mutations as one change. Fires a local diff batch.
    fn commit(&self);

    /// Logical cursor at `offset`. `None` only when `offset > len_chars()`.
    fn cursor_at(&self, offset: usize) -> Option<Self::Cursor>;

    /// Current offset of a logical cursor, or `None` when it cannot be resolved.
    fn cursor_pos(&self, cursor: &Self::Cursor) -> Option<usize>;

    fn encode_cursor(&self, cursor: &Self::Cursor) -> Vec<u8>;

    fn decode_cursor(&self, bytes: &[u8]) -> Result<Self::Cursor, BindingError>;

    /// Register for diff batches on this text.
    fn subscribe(&self, handler: DiffHandler) -> Subscription;
}
