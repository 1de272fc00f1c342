//! Conversion of Loro diff events into binding diff batches.

use loro::event::{Diff, DiffEvent};
use loro::{EventTriggerKind, TextDelta};
use weaver_binding::{DiffBatch, DiffOp, Origin, TextDiff};

pub(crate) fn origin(kind: EventTriggerKind) -> Origin {
    match kind {
        EventTriggerKind::Local => Origin::Local,
        EventTriggerKind::Import => Origin::Remote,
        EventTriggerKind::Checkout => Origin::Checkout,
    }
}

/// One `TextDiff` per container diff, in delivery order.
///
/// Anything that is not a text delta becomes a single `Unknown` op, which
/// the binding rejects.
pub(crate) fn to_batch(event: &DiffEvent<'_>) -> DiffBatch {
    let events = event
        .events
        .iter()
        .map(|container| to_text_diff(&container.diff))
        .collect();
    DiffBatch::new(origin(event.triggered_by), events)
}

fn to_text_diff(diff: &Diff<'_>) -> TextDiff {
    match diff {
        Diff::Text(deltas) => TextDiff::new(deltas.iter().map(to_op).collect()),
        Diff::List(_) => TextDiff::new(vec![DiffOp::Unknown("list".into())]),
        Diff::Map(_) => TextDiff::new(vec![DiffOp::Unknown("map".into())]),
        _ => TextDiff::new(vec![DiffOp::Unknown("other".into())]),
    }
}

fn to_op(delta: &TextDelta) -> DiffOp {
    match delta {
        TextDelta::Retain { retain, .. } => DiffOp::Retain(*retain),
        TextDelta::Insert { insert, .. } => DiffOp::Insert(insert.clone()),
        TextDelta::Delete { delete } => DiffOp::Delete(*delete),
    }
}
