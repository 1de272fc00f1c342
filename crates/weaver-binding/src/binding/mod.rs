//! Bidirectional binding between a CRDT text and an editor model.
//!
//! Remote diffs are replayed into the editor model, local editor changes are
//! forwarded into the CRDT as one commit each, view selections are carried
//! across remote mutations through logical cursors, and remote peers'
//! selections are rendered as decorations on every view of the model.

mod local;
mod presence;
mod remote;
mod selection;


use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::awareness::{Awareness, AwarenessEvent};
use crate::config::BindingOptions;
use crate::crdt::{CrdtText, DiffBatch, DiffHandler};
use crate::event::Subscription;
use crate::model::EditorModel;
use crate::position::RelativeSelection;
use crate::types::{ContentChangeEvent, DecorationId, Selection};
use crate::view::EditorView;

pub use presence::presence_decorations;

/// Whether the binding is currently replaying a remote batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    /// Editor changes are echoes of a remote batch and must not be forwarded.
    ApplyingRemote,
}

/// Sets `ApplyingRemote` for its lifetime and restores the previous state on
/// drop, whether the apply returned, failed or panicked.
struct RemoteApplyGuard<'a> {
    state: &'a Cell<SyncState>,
    previous: SyncState,
}

impl<'a> RemoteApplyGuard<'a> {
    fn enter(state: &'a Cell<SyncState>) -> Self {
        let previous = state.replace(SyncState::ApplyingRemote);
        Self { state, previous }
    }
}

impl Drop for RemoteApplyGuard<'_> {
    fn drop(&mut self) {
        self.state.set(self.previous);
    }
}

/// Stable key of a bound view: its index in the deduplicated view list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct ViewKey(usize);

/// Everything registered at construction, released on teardown.
struct Subscriptions {
    diff: Subscription,
    content: Subscription,
    dispose: Subscription,
    selection: Vec<Subscription>,
    awareness: Option<Subscription>,
}

struct Inner<T: CrdtText> {
    text: T,
    model: Rc<dyn EditorModel>,
    views: Vec<Rc<dyn EditorView>>,
    awareness: Option<Rc<Awareness>>,
    options: BindingOptions,
    state: Cell<SyncState>,
    saved: RefCell<BTreeMap<ViewKey, RelativeSelection<T::Cursor>>>,
    decorations: RefCell<BTreeMap<ViewKey, Vec<DecorationId>>>,
    subscriptions: RefCell<Option<Subscriptions>>,
}

impl<T: CrdtText> Inner<T> {
    fn views(&self) -> impl Iterator<Item = (ViewKey, &Rc<dyn EditorView>)> {
        self.views.iter().enumerate().map(|(i, v)| (ViewKey(i), v))
    }

    fn shows_model(&self, view: &dyn EditorView) -> bool {
        view.model_id() == Some(self.model.id())
    }

    fn on_selection_change(&self, key: ViewKey, selection: &Selection) {
        if self.state.get() != SyncState::Idle || !self.shows_model(&*self.views[key.0]) {
            return;
        }
        self.snapshot_view(key, selection);
        if let Err(e) = self.publish_local_selection(selection) {
            tracing::error!("Failed to publish local selection: {e}");
        }
    }

    /// Release every subscription. Safe to call more than once.
    fn teardown(&self) {
        let Some(subscriptions) = self.subscriptions.borrow_mut().take() else {
            return;
        };
        let Subscriptions {
            diff,
            content,
            dispose,
            selection,
            awareness,
        } = subscriptions;
        content.unsubscribe();
        dispose.unsubscribe();
        diff.unsubscribe();
        for sub in selection {
            sub.unsubscribe();
        }
        if let Some(sub) = awareness {
            sub.unsubscribe();
        }

        self.clear_presence();
        self.saved.borrow_mut().clear();
        tracing::debug!(peer = self.text.peer_id(), "binding destroyed");
    }
}

/// Keeps a CRDT text and an editor model in sync for as long as it lives.
///
/// Dropping the binding, calling [`destroy`](Self::destroy) or disposing the
/// model all tear it down.
pub struct EditorBinding<T: CrdtText> {
    inner: Rc<Inner<T>>,
}

impl<T: CrdtText + 'static> EditorBinding<T> {
    /// Bind `text` to `model` and its `views`.
    ///
    /// If the model content differs from the CRDT text, the model is reset to
    /// the CRDT text first. Views listed more than once are bound once.
    /// Without `awareness` no presence is published or rendered.
    pub fn new(
        text: T,
        model: Rc<dyn EditorModel>,
        views: Vec<Rc<dyn EditorView>>,
        awareness: Option<Rc<Awareness>>,
        options: BindingOptions,
    ) -> Self {
        let mut unique: Vec<Rc<dyn EditorView>> = Vec::with_capacity(views.len());
        for view in views {
            if !unique
                .iter()
                .any(|v| std::ptr::addr_eq(Rc::as_ptr(v), Rc::as_ptr(&view)))
            {
                unique.push(view);
            }
        }

        let inner = Rc::new(Inner {
            text,
            model,
            views: unique,
            awareness,
            options,
            state: Cell::new(SyncState::Idle),
            saved: RefCell::new(BTreeMap::new()),
            decorations: RefCell::new(BTreeMap::new()),
            subscriptions: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let handler: DiffHandler = Rc::new(move |batch: &DiffBatch| match weak.upgrade() {
            Some(inner) => inner.apply_remote_batch(batch),
            None => Ok(()),
        });
        let diff = inner.text.subscribe(handler);

        let initial = inner.text.content();
        if inner.model.value() != initial {
            tracing::debug!("initializing editor model from crdt text");
            inner.model.set_value(&initial);
        }

        let weak = Rc::downgrade(&inner);
        let content = inner.model.on_did_change_content(Rc::new(
            move |event: &ContentChangeEvent| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = inner.forward_local_change(event) {
                    tracing::error!("Failed to forward local change: {e}");
                }
            },
        ));

        let weak = Rc::downgrade(&inner);
        let dispose = inner.model.on_will_dispose(Rc::new(move |_: &()| {
            if let Some(inner) = weak.upgrade() {
                inner.teardown();
            }
        }));

        let selection = inner
            .views()
            .map(|(key, view)| {
                let weak = Rc::downgrade(&inner);
                view.on_did_change_cursor_selection(Rc::new(move |selection: &Selection| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_selection_change(key, selection);
                    }
                }))
            })
            .collect();

        let awareness = inner.awareness.as_ref().map(|awareness| {
            let weak = Rc::downgrade(&inner);
            awareness.subscribe(Rc::new(move |_: &AwarenessEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.render_presence();
                }
            }))
        });

        *inner.subscriptions.borrow_mut() = Some(Subscriptions {
            diff,
            content,
            dispose,
            selection,
            awareness,
        });

        inner.snapshot_selections();
        inner.render_presence();
        tracing::debug!(
            peer = inner.text.peer_id(),
            views = inner.views.len(),
            presence = inner.awareness.is_some(),
            "binding created"
        );

        Self { inner }
    }
}

impl<T: CrdtText> EditorBinding<T> {
    /// Release every listener. No callback fires afterwards.
    pub fn destroy(self) {
        self.inner.teardown();
    }

    pub fn text(&self) -> &T {
        &self.inner.text
    }

    pub fn model(&self) -> &Rc<dyn EditorModel> {
        &self.inner.model
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.state.get()
    }

    /// False once torn down by `destroy` or model disposal.
    pub fn is_active(&self) -> bool {
        self.inner.subscriptions.borrow().is_some()
    }
}

impl<T: CrdtText> Drop for EditorBinding<T> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}
