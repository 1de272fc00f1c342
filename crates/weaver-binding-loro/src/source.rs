//! `CrdtText` over a Loro text container.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use loro::cursor::{Cursor, Side};
use loro::event::DiffEvent;
use loro::{ContainerTrait, ImportStatus, LoroDoc, LoroError, LoroText};
use send_wrapper::SendWrapper;
use weaver_binding::{BindingError, CrdtText, DiffBatch, DiffHandler, PeerId, Subscription};

use crate::diff::to_batch;

fn crdt_error(e: LoroError) -> BindingError {
    BindingError::Crdt(e.to_string())
}

/// A handler and the batches Loro delivered to it that it has not seen yet.
struct Inbox {
    handler: DiffHandler,
    queue: RefCell<VecDeque<DiffBatch>>,
}

/// A Loro text container bound to its document.
///
/// Loro emits events while its document lock is held, and resolving a cursor
/// from inside a subscriber can re-enter that lock. So the Loro subscriber
/// only queues the converted batch; handlers run from [`LoroTextSource::flush`],
/// which [`LoroTextSource::import`] and [`CrdtText::commit`] call once Loro
/// has returned. Hosts that import or check out through the `LoroDoc`
/// directly call `flush` afterwards.
///
/// Cheap to clone: all handles are shared.
#[derive(Clone)]
pub struct LoroTextSource {
    doc: LoroDoc,
    text: LoroText,
    inboxes: Rc<RefCell<Vec<Weak<Inbox>>>>,
}

impl LoroTextSource {
    /// Use the root text container named `container` of `doc`.
    pub fn new(doc: &LoroDoc, container: &str) -> Self {
        Self::from_text(doc, doc.get_text(container))
    }

    /// Use an existing text handle. `text` must belong to `doc`.
    pub fn from_text(doc: &LoroDoc, text: LoroText) -> Self {
        Self {
            doc: doc.clone(),
            text,
            inboxes: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Get the underlying Loro document.
    pub fn doc(&self) -> &LoroDoc {
        &self.doc
    }

    /// Get the text container.
    pub fn text(&self) -> &LoroText {
        &self.text
    }

    /// Import updates or a snapshot from a peer, then deliver the resulting
    /// diffs to subscribers.
    pub fn import(&self, bytes: &[u8]) -> Result<ImportStatus, BindingError> {
        let status = self.doc.import(bytes).map_err(crdt_error)?;
        self.flush()?;
        Ok(status)
    }

    /// Deliver queued diff batches to their handlers, oldest first.
    ///
    /// Every batch is delivered even if a handler fails; the first error is
    /// returned.
    pub fn flush(&self) -> Result<(), BindingError> {
        let inboxes: Vec<Rc<Inbox>> = {
            let mut inboxes = self.inboxes.borrow_mut();
            inboxes.retain(|inbox| inbox.strong_count() > 0);
            inboxes.iter().filter_map(Weak::upgrade).collect()
        };

        let mut first_error = None;
        for inbox in inboxes {
            loop {
                let next = inbox.queue.borrow_mut().pop_front();
                let Some(batch) = next else {
                    break;
                };
                if let Err(e) = (inbox.handler)(&batch) {
                    tracing::error!(origin = ?batch.origin, "Failed to apply text diff: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Number of batches waiting for [`flush`](Self::flush).
    pub fn pending(&self) -> usize {
        self.inboxes
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inbox| inbox.queue.borrow().len())
            .sum()
    }
}

impl CrdtText for LoroTextSource {
    type Cursor = Cursor;

    fn peer_id(&self) -> PeerId {
        self.doc.peer_id()
    }

    fn content(&self) -> String {
        self.text.to_string()
    }

    fn len_chars(&self) -> usize {
        self.text.len_unicode()
    }

    fn insert(&self, offset: usize, text: &str) -> Result<(), BindingError> {
        self.text.insert(offset, text).map_err(crdt_error)
    }

    fn delete(&self, offset: usize, len: usize) -> Result<(), BindingError> {
        self.text.delete(offset, len).map_err(crdt_error)
    }

    fn commit(&self) {
        self.doc.commit();
        // Errors are already logged per batch.
        let _ = self.flush();
    }

    fn cursor_at(&self, offset: usize) -> Option<Cursor> {
        if offset > self.text.len_unicode() {
            return None;
        }
        self.text.get_cursor(offset, Side::Middle)
    }

    fn cursor_pos(&self, cursor: &Cursor) -> Option<usize> {
        match self.doc.get_cursor_pos(cursor) {
            Ok(result) => Some(result.current.pos),
            Err(e) => {
                tracing::trace!("Cursor did not resolve: {e:?}");
                None
            }
        }
    }

    fn encode_cursor(&self, cursor: &Cursor) -> Vec<u8> {
        cursor.encode()
    }

    fn decode_cursor(&self, bytes: &[u8]) -> Result<Cursor, BindingError> {
        Cursor::decode(bytes).map_err(|e| BindingError::CursorDecode(e.to_string()))
    }

    /// Loro wants `Send + Sync` subscribers, the binding is single-threaded.
    /// The inbox is only ever touched on the thread that subscribed.
    fn subscribe(&self, handler: DiffHandler) -> Subscription {
        let inbox = Rc::new(Inbox {
            handler,
            queue: RefCell::new(VecDeque::new()),
        });
        self.inboxes.borrow_mut().push(Rc::downgrade(&inbox));

        let target = SendWrapper::new(Rc::downgrade(&inbox));
        let subscription = self.doc.subscribe(
            &self.text.id(),
            Arc::new(move |event: DiffEvent<'_>| {
                if let Some(inbox) = target.upgrade() {
                    inbox.queue.borrow_mut().push_back(to_batch(&event));
                }
            }),
        );
        Subscription::new(move || {
            subscription.unsubscribe();
            drop(inbox);
        })
    }
}
