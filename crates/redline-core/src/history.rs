//! Undo/redo history for annotation operations.
//!
//! The history is an append-only delta log and simultaneously the owner of
//! the current annotation list: the list is what a left-fold of the applied
//! deltas over the initial set produces, maintained incrementally. Each
//! recorded delta carries enough information to apply itself in both
//! directions, so undo is reverse-apply and redo is forward-apply.

use crate::annotation::{Annotation, AnnotationId};
use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};
#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum number of deltas kept on the undo stack. Older entries are
/// dropped silently; bounded memory wins over unbounded undo.
pub const MAX_HISTORY: usize = 100;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Which in-place mutation a change delta records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Move,
    Resize,
    Rotate,
    ChangeClass,
}

/// Partial snapshot of the mutable annotation fields.
///
/// Only the fields a delta actually touched are set; applying a patch merges
/// the set fields into the target annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<u32>,
}

impl FieldPatch {
    /// Patch of the center position.
    pub fn position(ann: &Annotation) -> Self {
        Self {
            x: Some(ann.x),
            y: Some(ann.y),
            ..Self::default()
        }
    }

    /// Patch of position and size (resize moves the center too).
    pub fn geometry(ann: &Annotation) -> Self {
        Self {
            x: Some(ann.x),
            y: Some(ann.y),
            w: Some(ann.w),
            h: Some(ann.h),
            ..Self::default()
        }
    }

    pub fn rotation(ann: &Annotation) -> Self {
        Self {
            rotation: Some(ann.rotation),
            ..Self::default()
        }
    }

    pub fn class(ann: &Annotation) -> Self {
        Self {
            class: Some(ann.class),
            ..Self::default()
        }
    }

    /// Merge the set fields into `ann`.
    fn apply_to(&self, ann: &mut Annotation) {
        if let Some(x) = self.x {
            ann.x = x;
        }
        if let Some(y) = self.y {
            ann.y = y;
        }
        if let Some(w) = self.w {
            ann.w = w;
        }
        if let Some(h) = self.h {
            ann.h = h;
        }
        if let Some(rotation) = self.rotation {
            ann.rotation = rotation;
        }
        if let Some(class) = self.class {
            ann.class = class;
        }
    }
}

/// The operation a delta records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeltaOp {
    /// Annotation created; the full snapshot restores it on redo.
    Add { annotation: Annotation },
    /// Annotation removed; the full snapshot restores it on undo.
    Delete { annotation: Annotation },
    /// In-place mutation with before/after field snapshots.
    Change {
        kind: ChangeKind,
        id: AnnotationId,
        before: FieldPatch,
        after: FieldPatch,
    },
}

impl DeltaOp {
    /// Effective id of the annotation this delta touches.
    pub fn target(&self) -> &AnnotationId {
        match self {
            DeltaOp::Add { annotation } | DeltaOp::Delete { annotation } => &annotation.id,
            DeltaOp::Change { id, .. } => id,
        }
    }
}

/// One immutable history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub timestamp_millis: u64,
    pub op: DeltaOp,
}

impl Delta {
    fn new(op: DeltaOp) -> Self {
        Self {
            timestamp_millis: now_millis(),
            op,
        }
    }
}

/// Apply a delta in the forward direction.
///
/// A missing target id leaves the list unchanged; it signals a sequencing
/// bug upstream, not a user-facing error.
fn apply_forward(annotations: &mut Vec<Annotation>, op: &DeltaOp) {
    match op {
        DeltaOp::Add { annotation } => annotations.push(annotation.clone()),
        DeltaOp::Delete { annotation } => remove_by_id(annotations, &annotation.id),
        DeltaOp::Change { id, after, .. } => merge_patch(annotations, id, after),
    }
}

/// Apply a delta in the reverse direction (undo).
fn apply_reverse(annotations: &mut Vec<Annotation>, op: &DeltaOp) {
    match op {
        DeltaOp::Add { annotation } => remove_by_id(annotations, &annotation.id),
        DeltaOp::Delete { annotation } => annotations.push(annotation.clone()),
        DeltaOp::Change { id, before, .. } => merge_patch(annotations, id, before),
    }
}

fn remove_by_id(annotations: &mut Vec<Annotation>, id: &AnnotationId) {
    let before = annotations.len();
    annotations.retain(|a| &a.id != id);
    if annotations.len() == before {
        log::warn!("delta removal target {id} not found; list unchanged");
    }
}

fn merge_patch(annotations: &mut Vec<Annotation>, id: &AnnotationId, patch: &FieldPatch) {
    match annotations.iter_mut().find(|a| &a.id == id) {
        Some(ann) => patch.apply_to(ann),
        None => log::warn!("delta patch target {id} not found; list unchanged"),
    }
}

/// The undo/redo history and the annotation list it folds to.
#[derive(Debug, Clone, Default)]
pub struct History {
    annotations: Vec<Annotation>,
    undo: Vec<Delta>,
    redo: Vec<Delta>,
    initialized: bool,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the initial annotation list. Must be called exactly once,
    /// before any delta is recorded.
    pub fn initialize(&mut self, annotations: Vec<Annotation>) {
        if self.initialized {
            log::warn!("history re-initialized; discarding existing state");
        }
        self.annotations = annotations;
        self.undo.clear();
        self.redo.clear();
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The current annotation list: the fold of all applied deltas.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| &a.id == id)
    }

    /// Mutable access for in-flight gesture preview.
    ///
    /// Mid-gesture geometry changes are not journaled; the gesture records
    /// exactly one delta at completion whose `after` matches the final
    /// state, so a full replay still reproduces the list.
    pub fn annotation_mut(&mut self, id: &AnnotationId) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| &a.id == id)
    }

    /// Rewrite a temporary id to its persisted form everywhere: the folded
    /// list and both stacks, so undo/redo keep resolving the annotation
    /// after an external save.
    pub fn promote_id(&mut self, temp: &AnnotationId, persisted: AnnotationId) {
        let rewrite_op = |op: &mut DeltaOp| match op {
            DeltaOp::Add { annotation } | DeltaOp::Delete { annotation } => {
                if &annotation.id == temp {
                    annotation.id = persisted.clone();
                }
            }
            DeltaOp::Change { id, .. } => {
                if id == temp {
                    *id = persisted.clone();
                }
            }
        };
        for delta in self.undo.iter_mut().chain(self.redo.iter_mut()) {
            rewrite_op(&mut delta.op);
        }
        if let Some(ann) = self.annotation_mut(temp) {
            ann.id = persisted;
        }
    }

    /// Record a newly created annotation.
    pub fn record_add(&mut self, annotation: Annotation) {
        apply_forward(&mut self.annotations, &DeltaOp::Add {
            annotation: annotation.clone(),
        });
        self.push(Delta::new(DeltaOp::Add { annotation }));
    }

    /// Record a deletion, capturing the current snapshot so undo can restore
    /// it. Returns `false` when the id is unknown.
    pub fn record_delete(&mut self, id: &AnnotationId) -> bool {
        let Some(annotation) = self.get(id).cloned() else {
            return false;
        };
        let op = DeltaOp::Delete { annotation };
        apply_forward(&mut self.annotations, &op);
        self.push(Delta::new(op));
        true
    }

    /// Record an in-place change.
    ///
    /// No-op guard: when `before` equals `after` nothing is recorded — a
    /// gesture that ends where it started must not pollute history. The
    /// `after` patch is merged into the folded list, which is idempotent
    /// when a gesture already previewed it. Returns whether a delta was
    /// pushed.
    pub fn record_change(
        &mut self,
        kind: ChangeKind,
        id: &AnnotationId,
        before: FieldPatch,
        after: FieldPatch,
    ) -> bool {
        if before == after {
            return false;
        }
        let op = DeltaOp::Change {
            kind,
            id: id.clone(),
            before,
            after,
        };
        merge_after(&mut self.annotations, &op);
        self.push(Delta::new(op));
        true
    }

    fn push(&mut self, delta: Delta) {
        log::debug!("history: push {:?}", delta.op.target());
        self.undo.push(delta);
        self.redo.clear();
        while self.undo.len() > MAX_HISTORY {
            self.undo.remove(0);
        }
    }

    /// Undo the most recent delta. Silent no-op on an empty stack.
    pub fn undo(&mut self) -> bool {
        let Some(delta) = self.undo.pop() else {
            return false;
        };
        log::debug!("history: undo {:?}", delta.op.target());
        apply_reverse(&mut self.annotations, &delta.op);
        self.redo.push(delta);
        true
    }

    /// Redo the most recently undone delta. Silent no-op on an empty stack.
    pub fn redo(&mut self) -> bool {
        let Some(delta) = self.redo.pop() else {
            return false;
        };
        log::debug!("history: redo {:?}", delta.op.target());
        apply_forward(&mut self.annotations, &delta.op);
        self.undo.push(delta);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn undo_stack(&self) -> &[Delta] {
        &self.undo
    }

    pub fn redo_stack(&self) -> &[Delta] {
        &self.redo
    }

    /// Reinstall stacks recovered from durable storage. The annotation list
    /// itself comes from `initialize`; the recovered stacks restore
    /// undo-ability across a restart.
    pub fn restore_stacks(&mut self, undo: Vec<Delta>, redo: Vec<Delta>) {
        self.undo = undo;
        self.redo = redo;
        while self.undo.len() > MAX_HISTORY {
            self.undo.remove(0);
        }
    }
}

/// Apply only the `after` side of a change op to the folded list, for
/// callers that mutated nothing up front (e.g. class changes).
fn merge_after(annotations: &mut Vec<Annotation>, op: &DeltaOp) {
    if let DeltaOp::Change { id, after, .. } = op {
        merge_patch(annotations, id, after);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(id: i64, x: f64, y: f64) -> Annotation {
        Annotation::new(AnnotationId::Persisted(id), x, y, 0.1, 0.1)
    }

    fn initialized(annotations: Vec<Annotation>) -> History {
        let mut history = History::new();
        history.initialize(annotations);
        history
    }

    #[test]
    fn test_add_undo_redo_round_trip() {
        let mut history = initialized(vec![]);
        history.record_add(ann(1, 0.5, 0.5));
        assert_eq!(history.annotations().len(), 1);

        assert!(history.undo());
        assert!(history.annotations().is_empty());

        assert!(history.redo());
        assert_eq!(history.annotations().len(), 1);
        assert_eq!(history.annotations()[0].id, AnnotationId::Persisted(1));
    }

    #[test]
    fn test_delete_restores_full_snapshot_on_undo() {
        let mut original = ann(1, 0.3, 0.4);
        original.rotation = 0.7;
        original.class = 3;
        let mut history = initialized(vec![original.clone()]);

        assert!(history.record_delete(&AnnotationId::Persisted(1)));
        assert!(history.annotations().is_empty());

        assert!(history.undo());
        assert_eq!(history.annotations(), &[original]);
    }

    #[test]
    fn test_change_round_trip_restores_touched_fields() {
        let mut history = initialized(vec![ann(1, 0.2, 0.2)]);
        let before = FieldPatch::position(&history.annotations()[0]);
        let mut moved = history.annotations()[0].clone();
        moved.x = 0.6;
        moved.y = 0.7;
        let after = FieldPatch::position(&moved);

        assert!(history.record_change(
            ChangeKind::Move,
            &AnnotationId::Persisted(1),
            before,
            after
        ));
        assert_eq!(history.annotations()[0].x, 0.6);

        assert!(history.undo());
        assert_eq!(history.annotations()[0].x, 0.2);
        assert_eq!(history.annotations()[0].y, 0.2);

        assert!(history.redo());
        assert_eq!(history.annotations()[0].x, 0.6);
        assert_eq!(history.annotations()[0].y, 0.7);
    }

    #[test]
    fn test_noop_change_records_nothing() {
        let mut history = initialized(vec![ann(1, 0.2, 0.2)]);
        let patch = FieldPatch::position(&history.annotations()[0]);

        let recorded = history.record_change(
            ChangeKind::Move,
            &AnnotationId::Persisted(1),
            patch.clone(),
            patch,
        );
        assert!(!recorded);
        assert_eq!(history.undo_len(), 0);
    }

    #[test]
    fn test_new_delta_clears_redo() {
        let mut history = initialized(vec![]);
        history.record_add(ann(1, 0.5, 0.5));
        assert!(history.undo());
        assert!(history.can_redo());

        history.record_add(ann(2, 0.6, 0.6));
        assert!(!history.can_redo());
        assert!(!history.redo());
    }

    #[test]
    fn test_undo_redo_empty_stacks_are_noops() {
        let mut history = initialized(vec![]);
        assert!(!history.undo());
        assert!(!history.redo());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = initialized(vec![ann(1, 0.0, 0.0)]);
        let id = AnnotationId::Persisted(1);

        for i in 0..105u32 {
            let current = history.get(&id).unwrap().clone();
            let before = FieldPatch::position(&current);
            let mut moved = current;
            moved.x = f64::from(i + 1) * 0.001;
            let after = FieldPatch::position(&moved);
            assert!(history.record_change(ChangeKind::Move, &id, before, after));
        }

        assert_eq!(history.undo_len(), MAX_HISTORY);

        // Unwinding everything that is left lands on the state after the 5
        // dropped moves, not the initial position.
        while history.undo() {}
        assert!((history.get(&id).unwrap().x - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_change_on_missing_id_folds_to_noop() {
        let mut history = initialized(vec![ann(1, 0.2, 0.2)]);
        let ghost = AnnotationId::Persisted(99);
        let before = FieldPatch {
            x: Some(0.1),
            ..FieldPatch::default()
        };
        let after = FieldPatch {
            x: Some(0.9),
            ..FieldPatch::default()
        };

        // The delta records, but folding it changes nothing.
        history.record_change(ChangeKind::Move, &ghost, before, after);
        assert_eq!(history.annotations()[0].x, 0.2);
        history.undo();
        assert_eq!(history.annotations()[0].x, 0.2);
    }

    #[test]
    fn test_promote_id_rewrites_folded_state_and_stacks() {
        let mut history = initialized(vec![]);
        let temp = AnnotationId::mint_temp();
        history.record_add(Annotation::new(temp.clone(), 0.5, 0.5, 0.1, 0.1));

        history.promote_id(&temp, AnnotationId::Persisted(42));
        assert_eq!(history.annotations()[0].id, AnnotationId::Persisted(42));

        // Undo still resolves the annotation under its new id.
        assert!(history.undo());
        assert!(history.annotations().is_empty());
        assert!(history.redo());
        assert_eq!(history.annotations()[0].id, AnnotationId::Persisted(42));
    }

    #[test]
    fn test_delta_serde_round_trip() {
        let delta = Delta {
            timestamp_millis: 12345,
            op: DeltaOp::Change {
                kind: ChangeKind::Rotate,
                id: AnnotationId::Persisted(5),
                before: FieldPatch {
                    rotation: Some(0.0),
                    ..FieldPatch::default()
                },
                after: FieldPatch {
                    rotation: Some(1.2),
                    ..FieldPatch::default()
                },
            },
        };

        let json = serde_json::to_string(&delta).unwrap();
        let back: Delta = serde_json::from_str(&json).unwrap();
        assert_eq!(delta, back);
    }
}
