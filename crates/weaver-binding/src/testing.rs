//! In-memory `CrdtText` used by the crate's tests.
//!
//! Cursors are tracked offsets: they shift with edits before them and become
//! unresolvable when the char they point at is deleted.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::crdt::{CrdtText, DiffBatch, DiffHandler, DiffOp, Origin, PeerId, TextDiff};
use crate::error::BindingError;
use crate::event::Subscription;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryCursor(usize);

struct MemoryInner {
    peer: PeerId,
    text: RefCell<Vec<char>>,
    cursors: RefCell<Vec<Option<usize>>>,
    pending: RefCell<Vec<DiffOp>>,
    commits: Cell<usize>,
    next_handler: Cell<u64>,
    handlers: RefCell<Vec<(u64, DiffHandler)>>,
}

#[derive(Clone)]
pub struct MemoryText {
    inner: Rc<MemoryInner>,
}

impl MemoryText {
    pub fn new(peer: PeerId, text: &str) -> Self {
        Self {
            inner: Rc::new(MemoryInner {
                peer,
                text: RefCell::new(text.chars().collect()),
                cursors: RefCell::new(Vec::new()),
                pending: RefCell::new(Vec::new()),
                commits: Cell::new(0),
                next_handler: Cell::new(0),
                handlers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn commits(&self) -> usize {
        self.inner.commits.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    fn raw_insert(&self, offset: usize, text: &str) -> Result<(), BindingError> {
        let len = self.len_chars();
        if offset > len {
            return Err(BindingError::OffsetOutOfBounds { offset, len });
        }
        let inserted: Vec<char> = text.chars().collect();
        let n = inserted.len();
        self.inner
            .text
            .borrow_mut()
            .splice(offset..offset, inserted);
        for pos in self.inner.cursors.borrow_mut().iter_mut().flatten() {
            if *pos >= offset {
                *pos += n;
            }
        }
        Ok(())
    }

    fn raw_delete(&self, offset: usize, n: usize) -> Result<(), BindingError> {
        let len = self.len_chars();
        if offset + n > len {
            return Err(BindingError::OffsetOutOfBounds {
                offset: offset + n,
                len,
            });
        }
        self.inner.text.borrow_mut().drain(offset..offset + n);
        for slot in self.inner.cursors.borrow_mut().iter_mut() {
            match *slot {
                Some(pos) if pos >= offset + n => *slot = Some(pos - n),
                Some(pos) if pos >= offset && pos < len => *slot = None,
                _ => {}
            }
        }
        Ok(())
    }

    /// Deliver a batch to every subscriber, stopping at the first error.
    pub fn emit(&self, batch: &DiffBatch) -> Result<(), BindingError> {
        let handlers: Vec<DiffHandler> = self
            .inner
            .handlers
            .borrow()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(batch)?;
        }
        Ok(())
    }

    /// Apply a diff as if it was imported from another peer, then notify.
    pub fn apply_remote(&self, diff: TextDiff) -> Result<(), BindingError> {
        let mut index = 0;
        for op in &diff.ops {
            match op {
                DiffOp::Retain(n) => index += n,
                DiffOp::Insert(text) => {
                    self.raw_insert(index, text)?;
                    index += text.chars().count();
                }
                DiffOp::Delete(n) => self.raw_delete(index, *n)?,
                DiffOp::Unknown(tag) => return Err(BindingError::InvalidOperation(tag.clone())),
            }
        }
        self.emit(&DiffBatch::new(Origin::Remote, vec![diff]))
    }

    pub fn apply_remote_insert(&self, offset: usize, text: &str) -> Result<(), BindingError> {
        self.apply_remote(TextDiff::new(vec![
            DiffOp::Retain(offset),
            DiffOp::Insert(text.to_owned()),
        ]))
    }

    pub fn apply_remote_delete(&self, offset: usize, n: usize) -> Result<(), BindingError> {
        self.apply_remote(TextDiff::new(vec![DiffOp::Retain(offset), DiffOp::Delete(n)]))
    }
}

impl CrdtText for MemoryText {
    type Cursor = MemoryCursor;

    fn peer_id(&self) -> PeerId {
        self.inner.peer
    }

    fn content(&self) -> String {
        self.inner.text.borrow().iter().collect()
    }

    fn len_chars(&self) -> usize {
        self.inner.text.borrow().len()
    }

    fn insert(&self, offset: usize, text: &str) -> Result<(), BindingError> {
        self.raw_insert(offset, text)?;
        let mut pending = self.inner.pending.borrow_mut();
        pending.push(DiffOp::Retain(offset));
        pending.push(DiffOp::Insert(text.to_owned()));
        Ok(())
    }

    fn delete(&self, offset: usize, len: usize) -> Result<(), BindingError> {
        self.raw_delete(offset, len)?;
        let mut pending = self.inner.pending.borrow_mut();
        pending.push(DiffOp::Retain(offset));
        pending.push(DiffOp::Delete(len));
        Ok(())
    }

    fn commit(&self) {
        let ops = std::mem::take(&mut *self.inner.pending.borrow_mut());
        if ops.is_empty() {
            return;
        }
        self.inner.commits.set(self.inner.commits.get() + 1);
        // Each recorded op pair is relative to the text at that moment, so
        // deliver them as separate events.
        let events = ops
            .chunks(2)
            .map(|pair| TextDiff::new(pair.to_vec()))
            .collect();
        // Local echoes are ignored by the binding; a failure here is a test bug.
        if let Err(e) = self.emit(&DiffBatch::new(Origin::Local, events)) {
            panic!("local echo failed: {e}");
        }
    }

    fn cursor_at(&self, offset: usize) -> Option<MemoryCursor> {
        if offset > self.len_chars() {
            return None;
        }
        let mut cursors = self.inner.cursors.borrow_mut();
        cursors.push(Some(offset));
        Some(MemoryCursor(cursors.len() - 1))
    }

    fn cursor_pos(&self, cursor: &MemoryCursor) -> Option<usize> {
        self.inner.cursors.borrow().get(cursor.0).copied().flatten()
    }

    fn encode_cursor(&self, cursor: &MemoryCursor) -> Vec<u8> {
        (cursor.0 as u64).to_le_bytes().to_vec()
    }

    fn decode_cursor(&self, bytes: &[u8]) -> Result<MemoryCursor, BindingError> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| BindingError::CursorDecode(format!("expected 8 bytes, got {}", bytes.len())))?;
        Ok(MemoryCursor(u64::from_le_bytes(raw) as usize))
    }

    fn subscribe(&self, handler: DiffHandler) -> Subscription {
        let id = self.inner.next_handler.get();
        self.inner.next_handler.set(id + 1);
        self.inner.handlers.borrow_mut().push((id, handler));

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.handlers.borrow_mut().retain(|(k, _)| *k != id);
            }
        })
    }
}
