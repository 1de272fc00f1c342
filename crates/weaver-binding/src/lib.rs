//! weaver-binding: keep a replicated CRDT text and an editor model in sync.
//!
//! This crate provides:
//! - `EditorModel` / `EditorView` traits for the editor side, with the
//!   rope-backed `TextModel` and `TextView`
//! - `CrdtText` trait for the replicated side, plus diff types
//! - Logical-cursor position translation
//! - `Awareness` - ephemeral presence state with expiry
//! - `EditorBinding<T>` - the bidirectional binding itself

pub mod awareness;
pub mod binding;
pub mod config;
pub mod crdt;
pub mod error;
pub mod event;
pub mod model;
pub mod position;
pub mod text;
pub mod types;
pub mod view;

#[cfg(test)]
mod testing;

pub use awareness::{
    Awareness, AwarenessEvent, AwarenessOrigin, DEFAULT_TIMEOUT, PeerState, PresenceSelection,
    color_for_peer,
};
pub use binding::{EditorBinding, SyncState, presence_decorations};
pub use config::BindingOptions;
pub use crdt::{CrdtText, DiffBatch, DiffHandler, DiffOp, Origin, PeerId, TextDiff};
pub use error::BindingError;
pub use event::{Listener, Listeners, Subscription};
pub use model::{EditorModel, TextModel};
pub use position::{
    RelativeSelection, from_logical_cursor, relative_to_selection, selection_to_relative,
    to_logical_cursor,
};
pub use smol_str::SmolStr;
pub use text::{EditorRope, TextBuffer};
pub use types::{
    ContentChange, ContentChangeEvent, Decoration, DecorationId, ModelEdit, ModelId, Position,
    Selection, SelectionDirection, TextRange,
};
pub use view::{EditorView, TextView};
