//! Listener registration and subscription handles.
//!
//! Every callback the binding registers (editor content changes, disposal,
//! selection changes, CRDT diffs, presence changes) hands back a
//! [`Subscription`]. Teardown is explicit: the binding keeps each handle and
//! releases it when it is destroyed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Handle to a registered listener.
///
/// Releasing the handle (via [`Subscription::unsubscribe`] or by dropping it)
/// removes the listener. Use [`Subscription::detach`] to keep the listener
/// registered for as long as the emitter lives.
#[must_use = "dropping a Subscription removes the listener"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Create a subscription that runs `release` when it is released.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Keep the listener registered and forget the handle.
    pub fn detach(mut self) {
        self.release = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// A shared listener callback.
pub type Listener<E> = Rc<dyn Fn(&E)>;

struct ListenerSet<E: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Listener<E>)>,
}

impl<E: ?Sized> ListenerSet<E> {
    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(k, _)| *k == id)
    }
}

/// A single-threaded set of listeners for events of type `E`.
///
/// Listeners may subscribe or unsubscribe from inside a callback. A listener
/// released during an emit pass is not called for the rest of that pass.
pub struct Listeners<E: ?Sized> {
    inner: Rc<RefCell<ListenerSet<E>>>,
}

impl<E: ?Sized + 'static> Listeners<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListenerSet {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a listener.
    pub fn add(&self, listener: Listener<E>) -> Subscription {
        let id = {
            let mut set = self.inner.borrow_mut();
            let id = set.next_id;
            set.next_id += 1;
            set.entries.push((id, listener));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(set) = weak.upgrade() {
                set.borrow_mut().entries.retain(|(k, _)| *k != id);
            }
        })
    }

    /// Call every registered listener with `event`.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<(u64, Listener<E>)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(id, l)| (*id, l.clone()))
            .collect();

        for (id, listener) in snapshot {
            if self.inner.borrow().contains(id) {
                listener(event);
            }
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: ?Sized + 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}
