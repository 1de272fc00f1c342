//! Translation between editor positions, char offsets and logical cursors.
//!
//! Raw offsets shift whenever anyone edits earlier in the text. Selections
//! that have to survive a remote mutation are therefore captured as a pair of
//! CRDT logical cursors and resolved back to positions afterwards.

use crate::crdt::CrdtText;
use crate::error::BindingError;
use crate::model::EditorModel;
use crate::types::{Selection, SelectionDirection};

/// One view's selection in logical-position space.
#[derive(Clone, Debug)]
pub struct RelativeSelection<C> {
    pub start: C,
    pub end: C,
    pub direction: SelectionDirection,
}

/// Logical cursor for a char offset.
///
/// Any offset in `0..=len` resolves; anything past the end is an error.
pub fn to_logical_cursor<T: CrdtText>(text: &T, offset: usize) -> Result<T::Cursor, BindingError> {
    text.cursor_at(offset)
        .ok_or_else(|| BindingError::OffsetOutOfBounds {
            offset,
            len: text.len_chars(),
        })
}

/// Current offset of a logical cursor. `None` means the content it pointed
/// into is gone; callers treat that as "nothing to restore".
pub fn from_logical_cursor<T: CrdtText>(text: &T, cursor: &T::Cursor) -> Option<usize> {
    text.cursor_pos(cursor)
}

/// Capture a selection as logical cursors, keeping its direction.
pub fn selection_to_relative<T: CrdtText>(
    selection: &Selection,
    model: &dyn EditorModel,
    text: &T,
) -> Result<RelativeSelection<T::Cursor>, BindingError> {
    let start = to_logical_cursor(text, model.offset_at(selection.start()))?;
    let end = to_logical_cursor(text, model.offset_at(selection.end()))?;
    Ok(RelativeSelection {
        start,
        end,
        direction: selection.direction(),
    })
}

/// Resolve a captured selection back to positions in `model`.
///
/// `None` when either endpoint no longer resolves.
pub fn relative_to_selection<T: CrdtText>(
    relative: &RelativeSelection<T::Cursor>,
    model: &dyn EditorModel,
    text: &T,
) -> Option<Selection> {
    let start = from_logical_cursor(text, &relative.start)?;
    let end = from_logical_cursor(text, &relative.end)?;
    Some(Selection::with_direction(
        model.position_at(start),
        model.position_at(end),
        relative.direction,
    ))
}
