//! Editor view contract and an in-memory implementation.
//!
//! A view displays (at most) one model, owns the user's selection and a set
//! of decorations. Several views may display the same model.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::event::{Listeners, Subscription};
use crate::model::{EditorModel, TextModel};
use crate::types::{Decoration, DecorationId, ModelId, Selection};

/// Called after a view's selection changed.
pub type SelectionListener = Rc<dyn Fn(&Selection)>;

pub trait EditorView {
    /// The model currently displayed, if any.
    fn model_id(&self) -> Option<ModelId>;

    fn selection(&self) -> Option<Selection>;

    fn set_selection(&self, selection: Selection);

    fn on_did_change_cursor_selection(&self, listener: SelectionListener) -> Subscription;

    /// Remove the decorations in `old` and add `new` in one step.
    ///
    /// Returns the ids of the added decorations, in order.
    fn delta_decorations(&self, old: &[DecorationId], new: Vec<Decoration>) -> Vec<DecorationId>;
}

/// In-memory view over a [`TextModel`].
pub struct TextView {
    model: RefCell<Option<Rc<TextModel>>>,
    selection: Cell<Option<Selection>>,
    decorations: RefCell<BTreeMap<DecorationId, Decoration>>,
    next_decoration: Cell<u64>,
    selection_listeners: Listeners<Selection>,
}

impl TextView {
    pub fn new(model: Rc<TextModel>) -> Rc<Self> {
        Rc::new(Self {
            model: RefCell::new(Some(model)),
            selection: Cell::new(None),
            decorations: RefCell::new(BTreeMap::new()),
            next_decoration: Cell::new(0),
            selection_listeners: Listeners::new(),
        })
    }

    /// Switch the displayed model. Decorations and selection are dropped,
    /// as they belonged to the previous model.
    pub fn set_model(&self, model: Option<Rc<TextModel>>) {
        *self.model.borrow_mut() = model;
        self.decorations.borrow_mut().clear();
        self.selection.set(None);
    }

    pub fn model(&self) -> Option<Rc<TextModel>> {
        self.model.borrow().clone()
    }

    /// Current decorations, in insertion order.
    pub fn decorations(&self) -> Vec<Decoration> {
        self.decorations.borrow().values().cloned().collect()
    }

    /// Selection as char offsets `(anchor, head)` in the displayed model.
    pub fn selection_offsets(&self) -> Option<(usize, usize)> {
        let selection = self.selection.get()?;
        let model = self.model()?;
        Some((
            model.offset_at(selection.anchor),
            model.offset_at(selection.head),
        ))
    }

    /// Select the char range `anchor..head` (either order) in the displayed model.
    pub fn select_offsets(&self, anchor: usize, head: usize) {
        let Some(model) = self.model() else {
            return;
        };
        let selection = Selection::new(model.position_at(anchor), model.position_at(head));
        self.set_selection(selection);
    }
}

impl EditorView for TextView {
    fn model_id(&self) -> Option<ModelId> {
        self.model.borrow().as_ref().map(|m| m.id())
    }

    fn selection(&self) -> Option<Selection> {
        self.selection.get()
    }

    fn set_selection(&self, selection: Selection) {
        self.selection.set(Some(selection));
        self.selection_listeners.emit(&selection);
    }

    fn on_did_change_cursor_selection(&self, listener: SelectionListener) -> Subscription {
        self.selection_listeners.add(listener)
    }

    fn delta_decorations(&self, old: &[DecorationId], new: Vec<Decoration>) -> Vec<DecorationId> {
        let mut decorations = self.decorations.borrow_mut();
        for id in old {
            decorations.remove(id);
        }
        new.into_iter()
            .map(|decoration| {
                let id = DecorationId(self.next_decoration.get());
                self.next_decoration.set(id.0 + 1);
                decorations.insert(id, decoration);
                id
            })
            .collect()
    }
}
