//! Core editor types: positions, selections, edits and decorations.
//!
//! These types are framework-agnostic. Positions are 1-based line/column
//! pairs, offsets are in Unicode scalar values (chars), never bytes.

use std::cmp::Ordering;

use smol_str::SmolStr;

/// A line/column position in an editor model. Both fields are 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line_number: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line_number: usize, column: usize) -> Self {
        Self {
            line_number,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// A range between two positions. `start` is never after `end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    /// Create a range, ordering the endpoints.
    pub fn new(a: Position, b: Position) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// An empty range at `position`.
    pub fn collapsed(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Which way a selection was made.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SelectionDirection {
    /// Left to right: the head is at the end.
    #[default]
    Ltr,
    /// Right to left: the head is at the start.
    Rtl,
}

/// Text selection with anchor and head positions.
///
/// The anchor is where the selection started, the head is where the cursor is now.
/// They may be in any order - use `start()` and `end()` for ordered bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Selection {
    /// Where selection started
    pub anchor: Position,
    /// Where cursor is now
    pub head: Position,
}

impl Selection {
    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (cursor position).
    pub fn collapsed(position: Position) -> Self {
        Self {
            anchor: position,
            head: position,
        }
    }

    /// Build a selection from ordered bounds and a direction.
    pub fn with_direction(start: Position, end: Position, direction: SelectionDirection) -> Self {
        match direction {
            SelectionDirection::Ltr => Self::new(start, end),
            SelectionDirection::Rtl => Self::new(end, start),
        }
    }

    /// Get the start (lower bound) of the selection.
    pub fn start(&self) -> Position {
        self.anchor.min(self.head)
    }

    /// Get the end (upper bound) of the selection.
    pub fn end(&self) -> Position {
        self.anchor.max(self.head)
    }

    pub fn direction(&self) -> SelectionDirection {
        match self.head.cmp(&self.anchor) {
            Ordering::Less => SelectionDirection::Rtl,
            _ => SelectionDirection::Ltr,
        }
    }

    /// Check if the selection is collapsed (empty, cursor only).
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    pub fn range(&self) -> TextRange {
        TextRange::new(self.anchor, self.head)
    }
}

/// One edit to apply to an editor model: replace `range` with `text`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelEdit {
    pub range: TextRange,
    pub text: String,
}

impl ModelEdit {
    pub fn new(range: TextRange, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    /// Insert `text` at `position`.
    pub fn insert(position: Position, text: impl Into<String>) -> Self {
        Self::new(TextRange::collapsed(position), text)
    }

    /// Remove the text covered by `range`.
    pub fn delete(range: TextRange) -> Self {
        Self::new(range, String::new())
    }
}

/// One replaced range in a content-change event.
///
/// `range_offset` and `range_length` are char offsets into the text as it
/// was before the event's edits were applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentChange {
    pub range: TextRange,
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
}

/// Fired by an editor model after its content changed.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ContentChangeEvent {
    pub changes: Vec<ContentChange>,
    /// Whole-document replacement (`set_value`).
    pub is_flush: bool,
}

/// Identity of an editor model, used to check what a view is displaying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u64);

/// Identity of a decoration inside one view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecorationId(pub u64);

/// A visual annotation over a range of one view. Never alters the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoration {
    pub range: TextRange,
    pub class_name: SmolStr,
    /// Marker rendered immediately before the range.
    pub before_content_class: Option<SmolStr>,
    /// Marker rendered immediately after the range.
    pub after_content_class: Option<SmolStr>,
}
