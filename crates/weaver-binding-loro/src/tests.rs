//! Two replicas, each with its own editor model, relaying updates and
//! presence the way a transport would.

use std::borrow::Cow;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use loro::event::DiffEvent;
use loro::{ContainerTrait, EventTriggerKind, ExportMode, LoroDoc};
use weaver_binding::{
    Awareness, BindingOptions, CrdtText, DEFAULT_TIMEOUT, EditorBinding, EditorModel, EditorView,
    ModelEdit, PeerState, Position, TextModel, TextRange, TextView,
};

use crate::LoroTextSource;

struct Replica {
    doc: LoroDoc,
    source: LoroTextSource,
    model: Rc<TextModel>,
    view: Rc<TextView>,
    awareness: Rc<Awareness>,
    binding: EditorBinding<LoroTextSource>,
    local_commits: Arc<AtomicUsize>,
    _commit_counter: loro::Subscription,
}

fn replica(peer: u64, initial: &str) -> Replica {
    let doc = LoroDoc::new();
    doc.set_peer_id(peer).unwrap();
    let source = LoroTextSource::new(&doc, "content");
    if !initial.is_empty() {
        source.text().insert(0, initial).unwrap();
        doc.commit();
    }

    let local_commits = Arc::new(AtomicUsize::new(0));
    let counter = local_commits.clone();
    let commit_counter = doc.subscribe(
        &source.text().id(),
        Arc::new(move |event: DiffEvent<'_>| {
            if matches!(event.triggered_by, EventTriggerKind::Local) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }),
    );

    let model = TextModel::new("");
    let view = TextView::new(model.clone());
    let awareness = Rc::new(Awareness::new(peer, DEFAULT_TIMEOUT));
    awareness.set_local_state(PeerState::anonymous(peer));
    let binding = EditorBinding::new(
        source.clone(),
        model.clone(),
        vec![view.clone() as Rc<dyn EditorView>],
        Some(awareness.clone()),
        BindingOptions::default(),
    );

    Replica {
        doc,
        source,
        model,
        view,
        awareness,
        binding,
        local_commits,
        _commit_counter: commit_counter,
    }
}

/// A second replica that starts from `first`'s history.
fn join(first: &Replica, peer: u64) -> Replica {
    let second = replica(peer, "");
    sync(first, &second);
    second
}

fn updates_for(from: &Replica, to: &LoroDoc) -> Vec<u8> {
    from.doc
        .export(ExportMode::Updates {
            from: Cow::Owned(to.oplog_vv()),
        })
        .unwrap()
}

/// Ship every change `to` has not seen yet.
fn sync(from: &Replica, to: &Replica) {
    to.source.import(&updates_for(from, &to.doc)).unwrap();
}

fn delete(replica: &Replica, start: usize, end: usize) {
    let range = TextRange::new(
        replica.model.position_at(start),
        replica.model.position_at(end),
    );
    replica.model.apply_edits(&[ModelEdit::delete(range)]).unwrap();
}

fn relay_presence(from: &Replica, to: &Replica) {
    let bytes = from.awareness.encode(&[from.awareness.peer()]).unwrap();
    to.awareness.apply(&bytes).unwrap();
}

fn insert(replica: &Replica, offset: usize, text: &str) {
    let at = replica.model.position_at(offset);
    replica
        .model
        .apply_edits(&[ModelEdit::insert(at, text)])
        .unwrap();
}

#[test]
fn test_model_starts_from_doc() {
    let a = replica(1, "hello");
    assert_eq!(a.model.value(), "hello");

    let b = join(&a, 2);
    assert_eq!(b.model.value(), "hello");
    assert_eq!(b.local_commits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_local_edit_reaches_peer() {
    let a = replica(1, "hello");
    let b = join(&a, 2);

    insert(&a, 5, " world");
    assert_eq!(a.source.content(), "hello world");

    sync(&a, &b);
    assert_eq!(b.model.value(), "hello world");
    assert_eq!(b.local_commits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_compound_edit_is_one_commit() {
    let a = replica(1, "abcdef");
    let before = a.local_commits.load(Ordering::SeqCst);

    let range = |s: usize, e: usize| TextRange::new(a.model.position_at(s), a.model.position_at(e));
    a.model
        .apply_edits(&[
            ModelEdit::new(range(0, 1), "Z"),
            ModelEdit::new(range(3, 4), "W"),
        ])
        .unwrap();

    assert_eq!(a.source.content(), "ZbcWef");
    assert_eq!(a.model.value(), "ZbcWef");
    assert_eq!(a.local_commits.load(Ordering::SeqCst), before + 1);
}

#[test]
fn test_selection_survives_remote_insert() {
    let a = replica(1, "abcdef");
    let b = join(&a, 2);
    b.view.select_offsets(2, 2);

    insert(&a, 0, "XY");
    sync(&a, &b);

    assert_eq!(b.model.value(), "XYabcdef");
    assert_eq!(b.view.selection_offsets(), Some((4, 4)));
}

#[test]
fn test_concurrent_edits_converge() {
    let a = replica(1, "shared");
    let b = join(&a, 2);

    insert(&a, 0, "A:");
    insert(&b, 6, ":B");
    sync(&a, &b);
    sync(&b, &a);

    assert_eq!(a.model.value(), b.model.value());
    assert_eq!(a.model.value(), a.source.content());
    assert_eq!(b.model.value(), "A:shared:B");
}

#[test]
fn test_remote_delete_round_trip() {
    let a = replica(1, "abcdef");
    let b = join(&a, 2);

    insert(&a, 2, "XYZ");
    sync(&a, &b);
    assert_eq!(b.model.value(), "abXYZcdef");

    let range = TextRange::new(b.model.position_at(2), b.model.position_at(5));
    b.model.apply_edits(&[ModelEdit::delete(range)]).unwrap();
    sync(&b, &a);

    assert_eq!(a.model.value(), "abcdef");
    assert_eq!(b.model.value(), "abcdef");
}

#[test]
fn test_presence_rendered_on_peer() {
    let a = replica(1, "abcdef");
    let b = join(&a, 2);

    a.view.select_offsets(0, 3);
    relay_presence(&a, &b);

    let decorations = b.view.decorations();
    assert_eq!(decorations.len(), 1);
    assert_eq!(
        decorations[0].class_name,
        "loroRemoteSelection loroRemoteSelection-1"
    );
    assert_eq!(
        decorations[0].range,
        TextRange::new(Position::new(1, 1), Position::new(1, 4))
    );
    assert!(decorations[0].after_content_class.is_some());
    // Nobody renders their own selection.
    assert!(a.view.decorations().is_empty());
}

#[test]
fn test_presence_follows_remote_edits() {
    let a = replica(1, "abcdef");
    let b = join(&a, 2);

    a.view.select_offsets(3, 0);
    relay_presence(&a, &b);
    assert!(b.view.decorations()[0].before_content_class.is_some());

    insert(&a, 0, "XY");
    sync(&a, &b);

    assert_eq!(
        b.view.decorations()[0].range,
        TextRange::new(Position::new(1, 3), Position::new(1, 6))
    );
}

#[test]
fn test_destroy_detaches_from_doc() {
    let a = replica(1, "abc");
    let b = join(&a, 2);
    let Replica {
        doc,
        source,
        model,
        binding,
        ..
    } = b;
    binding.destroy();

    insert(&a, 3, "def");
    doc.import(&updates_for(&a, &doc)).unwrap();
    source.flush().unwrap();

    assert_eq!(source.content(), "abcdef");
    assert_eq!(model.value(), "abc");

    model
        .apply_edits(&[ModelEdit::insert(Position::new(1, 1), ">")])
        .unwrap();
    assert_eq!(source.content(), "abcdef");
}

#[test]
fn test_cursor_encoding_round_trip() {
    let a = replica(1, "abcdef");
    let cursor = a.source.cursor_at(4).unwrap();
    let decoded = a.source.decode_cursor(&a.source.encode_cursor(&cursor)).unwrap();
    assert_eq!(a.source.cursor_pos(&decoded), Some(4));
    assert!(a.source.cursor_at(7).is_none());
    assert!(a.source.decode_cursor(&[]).is_err());
}

#[test]
fn test_remote_delete_under_selection() {
    let a = replica(1, "abcdef");
    let b = join(&a, 2);
    b.view.select_offsets(2, 4);

    delete(&a, 1, 5);
    sync(&a, &b);

    assert_eq!(b.model.value(), "af");
    assert_eq!(b.source.content(), "af");
    let (anchor, head) = b.view.selection_offsets().unwrap();
    assert!(anchor <= 2 && head <= 2);

    // Still bound: a local edit goes through.
    insert(&b, 0, ">");
    assert_eq!(b.source.content(), ">af");
}

#[test]
fn test_remote_delete_under_presence() {
    let a = replica(1, "abcdef");
    let b = join(&a, 2);
    a.view.select_offsets(1, 4);
    relay_presence(&a, &b);
    assert_eq!(b.view.decorations().len(), 1);

    delete(&a, 1, 5);
    sync(&a, &b);

    assert_eq!(b.model.value(), "af");
    for decoration in b.view.decorations() {
        assert!(decoration.range.end.column <= 3);
    }
}

#[test]
fn test_direct_import_waits_for_flush() {
    let a = replica(1, "abc");
    let b = join(&a, 2);

    insert(&a, 3, "def");
    b.doc.import(&updates_for(&a, &b.doc)).unwrap();
    assert_eq!(b.source.content(), "abcdef");
    assert_eq!(b.model.value(), "abc");
    assert!(b.source.pending() > 0);

    b.source.flush().unwrap();
    assert_eq!(b.model.value(), "abcdef");
    assert_eq!(b.source.pending(), 0);
}
