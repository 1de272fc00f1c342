//! Editor text model contract and a rope-backed implementation.
//!
//! `EditorModel` is the part of an editor widget the binding talks to: it
//! converts between line/column positions and char offsets, applies edits,
//! and notifies listeners when its content changes or when it is about to be
//! disposed. `TextModel` is a complete in-memory implementation backed by
//! [`EditorRope`], used by hosts without their own widget and by tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::BindingError;
use crate::event::{Listeners, Subscription};
use crate::text::{EditorRope, TextBuffer};
use crate::types::{ContentChange, ContentChangeEvent, ModelEdit, ModelId, Position, TextRange};

/// Called after the model content changed.
pub type ContentListener = Rc<dyn Fn(&ContentChangeEvent)>;

/// Called right before the model is disposed.
pub type DisposeListener = Rc<dyn Fn(&())>;

/// The editor-side document the binding keeps in sync.
///
/// Methods take `&self`: models are shared handles mutated from event
/// callbacks, so implementations use interior mutability.
pub trait EditorModel {
    fn id(&self) -> ModelId;

    /// Full text content.
    fn value(&self) -> String;

    /// Replace the full text content.
    fn set_value(&self, text: &str);

    /// Char offset of a position. Out-of-range positions are clamped.
    fn offset_at(&self, position: Position) -> usize;

    /// Position of a char offset. Out-of-range offsets are clamped.
    fn position_at(&self, offset: usize) -> Position;

    /// Apply a batch of non-overlapping edits as one change.
    fn apply_edits(&self, edits: &[ModelEdit]) -> Result<(), BindingError>;

    fn on_did_change_content(&self, listener: ContentListener) -> Subscription;

    fn on_will_dispose(&self, listener: DisposeListener) -> Subscription;
}

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

fn offset_in<B: TextBuffer>(buffer: &B, position: Position) -> usize {
    let line = position
        .line_number
        .saturating_sub(1)
        .min(buffer.len_lines() - 1);
    let column = position.column.saturating_sub(1).min(buffer.line_len(line));
    buffer.line_to_char(line) + column
}

fn position_in<B: TextBuffer>(buffer: &B, offset: usize) -> Position {
    let offset = offset.min(buffer.len_chars());
    let line = buffer.char_to_line(offset);
    Position::new(line + 1, offset - buffer.line_to_char(line) + 1)
}

/// Rope-backed editor model.
pub struct TextModel {
    id: ModelId,
    buffer: RefCell<EditorRope>,
    disposed: Cell<bool>,
    content_listeners: Listeners<ContentChangeEvent>,
    dispose_listeners: Listeners<()>,
}

impl TextModel {
    pub fn new(text: &str) -> Rc<Self> {
        Rc::new(Self {
            id: ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed)),
            buffer: RefCell::new(EditorRope::from_str(text)),
            disposed: Cell::new(false),
            content_listeners: Listeners::new(),
            dispose_listeners: Listeners::new(),
        })
    }

    pub fn len_chars(&self) -> usize {
        self.buffer.borrow().len_chars()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Notify will-dispose listeners. Only the first call has an effect.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.dispose_listeners.emit(&());
    }

    /// Resolve edits against the current text, highest offset first.
    fn resolve_edits(
        buffer: &EditorRope,
        edits: &[ModelEdit],
    ) -> Result<Vec<ContentChange>, BindingError> {
        let mut changes: Vec<ContentChange> = edits
            .iter()
            .map(|edit| {
                let start = offset_in(buffer, edit.range.start);
                let end = offset_in(buffer, edit.range.end);
                ContentChange {
                    range: TextRange::new(position_in(buffer, start), position_in(buffer, end)),
                    range_offset: start,
                    range_length: end - start,
                    text: edit.text.clone(),
                }
            })
            .filter(|change| change.range_length > 0 || !change.text.is_empty())
            .collect();

        changes.sort_by(|a, b| b.range_offset.cmp(&a.range_offset));

        for pair in changes.windows(2) {
            let (higher, lower) = (&pair[0], &pair[1]);
            if lower.range_offset + lower.range_length > higher.range_offset {
                return Err(BindingError::OverlappingEdits(higher.range_offset));
            }
        }

        Ok(changes)
    }
}

impl EditorModel for TextModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn value(&self) -> String {
        self.buffer.borrow().to_string()
    }

    fn set_value(&self, text: &str) {
        let event = {
            let mut buffer = self.buffer.borrow_mut();
            let old_len = buffer.len_chars();
            let change = ContentChange {
                range: TextRange::new(Position::default(), position_in(&*buffer, old_len)),
                range_offset: 0,
                range_length: old_len,
                text: text.to_owned(),
            };
            *buffer = EditorRope::from_str(text);
            ContentChangeEvent {
                changes: vec![change],
                is_flush: true,
            }
        };
        self.content_listeners.emit(&event);
    }

    fn offset_at(&self, position: Position) -> usize {
        offset_in(&*self.buffer.borrow(), position)
    }

    fn position_at(&self, offset: usize) -> Position {
        position_in(&*self.buffer.borrow(), offset)
    }

    fn apply_edits(&self, edits: &[ModelEdit]) -> Result<(), BindingError> {
        let event = {
            let mut buffer = self.buffer.borrow_mut();
            let changes = Self::resolve_edits(&buffer, edits)?;
            if changes.is_empty() {
                return Ok(());
            }
            // Descending order keeps the remaining offsets valid.
            for change in &changes {
                buffer.replace(
                    change.range_offset..change.range_offset + change.range_length,
                    &change.text,
                );
            }
            ContentChangeEvent {
                changes,
                is_flush: false,
            }
        };
        self.content_listeners.emit(&event);
        Ok(())
    }

    fn on_did_change_content(&self, listener: ContentListener) -> Subscription {
        self.content_listeners.add(listener)
    }

    fn on_will_dispose(&self, listener: DisposeListener) -> Subscription {
        self.dispose_listeners.add(listener)
    }
}
