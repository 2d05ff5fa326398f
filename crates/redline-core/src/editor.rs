//! Editor session: the annotation document, camera, index, and recovery
//! wiring behind the interaction router.

use crate::annotation::{Annotation, AnnotationId, Background};
use crate::camera::Camera;
use crate::history::{ChangeKind, FieldPatch, History};
use crate::index::{self, SpatialIndex};
use crate::manipulate::clamp_center_to_image;
use crate::storage::{RecoveryManager, Storage};
use kurbo::{Point, Rect, Size, Vec2};
use std::sync::Arc;
use uuid::Uuid;

/// World-space offset applied to pasted annotations so copies do not land
/// exactly on their source.
pub const PASTE_OFFSET: f64 = 16.0;

/// Default world-space edge length for annotations created from the context
/// menu (no drag rectangle to size them from).
pub const DEFAULT_CREATE_SIZE: f64 = 64.0;

/// What a primary click starts on empty canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    /// Select/manipulate existing annotations; empty space pans.
    #[default]
    Select,
    /// Drag out a new annotation.
    Create,
}

/// Editor session state.
///
/// The annotation list lives in the [`History`]; everything here either
/// derives from it (the spatial index) or is ephemeral view/interaction
/// state (camera, selection, clipboard, dirty flag).
pub struct Editor {
    /// Session identifier.
    pub id: Uuid,
    background: Option<Background>,
    pub camera: Camera,
    viewport: Size,
    history: History,
    spatial_index: Option<SpatialIndex>,
    index_suspended: bool,
    selected: Option<AnnotationId>,
    hovered: Option<AnnotationId>,
    labels_enabled: bool,
    read_only: bool,
    mode: EditorMode,
    clipboard: Vec<Annotation>,
    dirty: bool,
    recovery: Option<RecoveryManager>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            background: None,
            camera: Camera::new(),
            viewport: Size::new(800.0, 600.0),
            history: History::new(),
            spatial_index: None,
            index_suspended: false,
            selected: None,
            hovered: None,
            labels_enabled: false,
            read_only: false,
            mode: EditorMode::Select,
            clipboard: Vec::new(),
            dirty: true,
            recovery: None,
        }
    }

    /// Attach a durable store for crash-recovery snapshots.
    pub fn with_recovery(mut self, storage: Arc<dyn Storage>) -> Self {
        self.recovery = Some(RecoveryManager::new(storage));
        self
    }

    /// Install the initial annotation list from the persistence
    /// collaborator. Must be called exactly once, before any recording.
    ///
    /// When a recovery store is attached, a fresh snapshot restores the
    /// undo/redo stacks of the interrupted session.
    pub fn initialize(&mut self, annotations: Vec<Annotation>) {
        self.history.initialize(annotations);
        if let Some(recovery) = &self.recovery {
            if let Some(snapshot) = recovery.load() {
                log::debug!(
                    "restored history snapshot: {} undo, {} redo",
                    snapshot.undo.len(),
                    snapshot.redo.len()
                );
                self.history.restore_stacks(snapshot.undo, snapshot.redo);
            }
        }
        self.rebuild_index();
        self.mark_dirty();
    }

    // ------------------------------------------------------------------
    // Background / viewport
    // ------------------------------------------------------------------

    /// Set (or replace) the background image dimensions. Returns `false`
    /// and changes nothing for degenerate dimensions.
    pub fn set_background(&mut self, width: f64, height: f64) -> bool {
        let Some(bg) = Background::new(width, height) else {
            return false;
        };
        self.background = Some(bg);
        self.camera.fit_background(self.viewport, bg);
        self.rebuild_index();
        self.mark_dirty();
        true
    }

    pub fn background(&self) -> Option<Background> {
        self.background
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        if let Some(bg) = self.background {
            self.camera.fit_background(viewport, bg);
        }
        self.mark_dirty();
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Screen point (physical pixels) to world coordinates.
    pub fn screen_to_world(&self, screen: Point) -> Point {
        self.camera.screen_to_world(screen, self.viewport)
    }

    /// The world-space AABB currently covered by the viewport.
    pub fn view_world_rect(&self) -> Rect {
        let corners = [
            Point::ZERO,
            Point::new(self.viewport.width, 0.0),
            Point::new(0.0, self.viewport.height),
            Point::new(self.viewport.width, self.viewport.height),
        ];
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for corner in corners {
            let world = self.screen_to_world(corner);
            min_x = min_x.min(world.x);
            min_y = min_y.min(world.y);
            max_x = max_x.max(world.x);
            max_y = max_y.max(world.y);
        }
        Rect::new(min_x, min_y, max_x, max_y)
    }

    // ------------------------------------------------------------------
    // Modes and flags
    // ------------------------------------------------------------------

    pub fn set_mode(&mut self, mode: EditorMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_labels_enabled(&mut self, enabled: bool) {
        if self.labels_enabled != enabled {
            self.labels_enabled = enabled;
            self.rebuild_index();
            self.mark_dirty();
        }
    }

    pub fn labels_enabled(&self) -> bool {
        self.labels_enabled
    }

    /// Idempotent render request; the host's frame tick consumes it via
    /// [`Editor::take_dirty`].
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    // ------------------------------------------------------------------
    // Annotations and selection
    // ------------------------------------------------------------------

    pub fn annotations(&self) -> &[Annotation] {
        self.history.annotations()
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.history.get(id)
    }

    pub(crate) fn annotation_mut(&mut self, id: &AnnotationId) -> Option<&mut Annotation> {
        self.history.annotation_mut(id)
    }

    pub fn select(&mut self, id: Option<AnnotationId>) {
        if self.selected != id {
            self.selected = id;
            self.mark_dirty();
        }
    }

    pub fn selected(&self) -> Option<&AnnotationId> {
        self.selected.as_ref()
    }

    pub fn set_hovered(&mut self, id: Option<AnnotationId>) {
        if self.hovered != id {
            self.hovered = id;
            self.mark_dirty();
        }
    }

    pub fn hovered(&self) -> Option<&AnnotationId> {
        self.hovered.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // ------------------------------------------------------------------
    // Spatial index
    // ------------------------------------------------------------------

    /// Rebuild the spatial index from the current annotation list. Called on
    /// structural changes and at gesture end, never per move event.
    pub fn rebuild_index(&mut self) {
        self.spatial_index = match self.background {
            Some(bg) => SpatialIndex::build(self.annotations(), bg, self.labels_enabled),
            None => None,
        };
    }

    /// The index, unless a gesture is in flight — mid-gesture the index is
    /// stale, so consumers fall back to the linear scan.
    pub fn active_index(&self) -> Option<&SpatialIndex> {
        if self.index_suspended {
            None
        } else {
            self.spatial_index.as_ref()
        }
    }

    pub(crate) fn set_index_suspended(&mut self, suspended: bool) {
        self.index_suspended = suspended;
    }

    /// Ids of annotations intersecting the current view, for the renderer.
    pub fn visible_annotations(&self) -> Vec<&Annotation> {
        let Some(bg) = self.background else {
            return Vec::new();
        };
        let candidates = index::visible_candidates(
            self.active_index(),
            self.annotations(),
            bg,
            self.labels_enabled,
            self.view_world_rect(),
        );
        self.annotations()
            .iter()
            .filter(|ann| candidates.contains(&ann.id))
            .collect()
    }

    // ------------------------------------------------------------------
    // Mutations (all funnel through the history engine)
    // ------------------------------------------------------------------

    /// Record a freshly created annotation, select it, and settle the index.
    pub fn commit_add(&mut self, annotation: Annotation) {
        let id = annotation.id.clone();
        self.history.record_add(annotation);
        self.selected = Some(id);
        self.settle_after_change(true);
    }

    /// Record a completed manipulation gesture. The folded state already
    /// shows `after` (the gesture previewed it); this journals the
    /// transition unless it is a no-op.
    pub fn commit_change(
        &mut self,
        kind: ChangeKind,
        id: &AnnotationId,
        before: FieldPatch,
        after: FieldPatch,
    ) -> bool {
        let recorded = self.history.record_change(kind, id, before, after);
        self.settle_after_change(recorded);
        recorded
    }

    /// Create a default-sized annotation at a world point (context-menu
    /// creation path).
    pub fn create_at(&mut self, world: Point) -> Option<AnnotationId> {
        let bg = self.background?;
        let size = Size::new(DEFAULT_CREATE_SIZE, DEFAULT_CREATE_SIZE);
        let center = clamp_center_to_image(world, size, 0.0, bg);
        let rect = Rect::new(
            center.x - size.width / 2.0,
            center.y - size.height / 2.0,
            center.x + size.width / 2.0,
            center.y + size.height / 2.0,
        );
        let annotation =
            Annotation::create_from_world_rect(AnnotationId::mint_temp(), rect, bg);
        let id = annotation.id.clone();
        self.commit_add(annotation);
        Some(id)
    }

    /// Delete the selected annotation. Returns whether anything was deleted.
    pub fn delete_selected(&mut self) -> bool {
        let Some(id) = self.selected.take() else {
            return false;
        };
        let deleted = self.history.record_delete(&id);
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        self.settle_after_change(deleted);
        deleted
    }

    /// Change an annotation's class. No-op (and unrecorded) when the class
    /// is unchanged.
    pub fn set_class(&mut self, id: &AnnotationId, class: u32) -> bool {
        let Some(current) = self.get(id) else {
            return false;
        };
        let before = FieldPatch::class(current);
        let after = FieldPatch {
            class: Some(class),
            ..FieldPatch::default()
        };
        self.commit_change(ChangeKind::ChangeClass, id, before, after)
    }

    pub fn undo(&mut self) -> bool {
        let changed = self.history.undo();
        if changed {
            self.drop_dangling_refs();
            self.settle_after_change(true);
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.history.redo();
        if changed {
            self.drop_dangling_refs();
            self.settle_after_change(true);
        }
        changed
    }

    /// Copy the selected annotation into the internal clipboard.
    pub fn copy_selection(&mut self) -> bool {
        let Some(ann) = self.selected.as_ref().and_then(|id| self.get(id)).cloned() else {
            return false;
        };
        self.clipboard = vec![ann];
        true
    }

    /// Paste the clipboard contents as fresh annotations, slightly offset
    /// and clamped into the image.
    pub fn paste(&mut self) -> Vec<AnnotationId> {
        let Some(bg) = self.background else {
            return Vec::new();
        };
        let mut pasted = Vec::new();
        for source in self.clipboard.clone() {
            let mut copy = source.duplicated(Vec2::new(PASTE_OFFSET, PASTE_OFFSET), bg);
            let center = clamp_center_to_image(
                copy.world_center(bg),
                copy.world_size(bg),
                copy.rotation,
                bg,
            );
            copy = copy.from_world(center, copy.world_size(bg), copy.rotation, bg);
            pasted.push(copy.id.clone());
            self.commit_add(copy);
        }
        pasted
    }

    /// Rewrite a temporary id to its persisted form after an external save.
    pub fn promote_id(&mut self, temp: &AnnotationId, persisted_id: i64) {
        let persisted = AnnotationId::Persisted(persisted_id);
        self.history.promote_id(temp, persisted.clone());
        if self.selected.as_ref() == Some(temp) {
            self.selected = Some(persisted.clone());
        }
        if self.hovered.as_ref() == Some(temp) {
            self.hovered = Some(persisted);
        }
        self.rebuild_index();
        self.persist_history();
    }

    /// Persist the history stacks to the recovery store, if one is attached.
    pub fn persist_history(&self) {
        if let Some(recovery) = &self.recovery {
            if let Err(e) = recovery.persist(&self.history) {
                log::warn!("failed to persist history snapshot: {e}");
            }
        }
    }

    fn settle_after_change(&mut self, recorded: bool) {
        self.rebuild_index();
        if recorded {
            self.persist_history();
        }
        self.mark_dirty();
    }

    /// Undo/redo can remove the annotation selection or hover points at.
    fn drop_dangling_refs(&mut self) {
        if let Some(id) = &self.selected {
            if self.history.get(id).is_none() {
                self.selected = None;
            }
        }
        if let Some(id) = &self.hovered {
            if self.history.get(id).is_none() {
                self.hovered = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn editor_with_bg() -> Editor {
        let mut editor = Editor::new();
        editor.initialize(vec![]);
        assert!(editor.set_background(1000.0, 800.0));
        editor
    }

    fn ann(id: i64, x: f64, y: f64) -> Annotation {
        Annotation::new(AnnotationId::Persisted(id), x, y, 0.1, 0.1)
    }

    #[test]
    fn test_set_background_rejects_degenerate() {
        let mut editor = Editor::new();
        editor.initialize(vec![]);
        assert!(!editor.set_background(0.0, 100.0));
        assert!(editor.background().is_none());
    }

    #[test]
    fn test_background_fits_camera() {
        let mut editor = Editor::new();
        editor.initialize(vec![]);
        editor.set_viewport(Size::new(800.0, 600.0));
        editor.set_background(1600.0, 600.0);

        assert!((editor.camera.min_zoom - 0.5).abs() < 1e-12);
        assert!(editor.camera.zoom >= editor.camera.min_zoom);
    }

    #[test]
    fn test_commit_add_selects_and_indexes() {
        let mut editor = editor_with_bg();
        editor.commit_add(ann(1, 0.5, 0.5));

        assert_eq!(editor.annotations().len(), 1);
        assert_eq!(editor.selected(), Some(&AnnotationId::Persisted(1)));
        assert!(editor.active_index().is_some());
    }

    #[test]
    fn test_undo_clears_dangling_selection() {
        let mut editor = editor_with_bg();
        editor.commit_add(ann(1, 0.5, 0.5));
        assert!(editor.undo());

        assert!(editor.annotations().is_empty());
        assert!(editor.selected().is_none());
        assert!(editor.active_index().is_none());
    }

    #[test]
    fn test_create_and_undo_scenario() {
        // Drag-create from (-50, -50) to (50, 50) on a 200x200 background,
        // then undo and redo.
        let mut editor = Editor::new();
        editor.initialize(vec![]);
        editor.set_background(200.0, 200.0);

        let bg = editor.background().unwrap();
        let rect = Rect::new(-50.0, -50.0, 50.0, 50.0);
        editor.commit_add(Annotation::create_from_world_rect(
            AnnotationId::mint_temp(),
            rect,
            bg,
        ));

        let created = &editor.annotations()[0];
        assert!((created.x - 0.5).abs() < 1e-12);
        assert!((created.y - 0.5).abs() < 1e-12);
        assert!((created.w - 0.5).abs() < 1e-12);
        assert!((created.h - 0.5).abs() < 1e-12);
        let original = created.clone();

        assert!(editor.undo());
        assert_eq!(editor.annotations().len(), 0);

        assert!(editor.redo());
        assert_eq!(editor.annotations().len(), 1);
        assert_eq!(editor.annotations()[0], original);
    }

    #[test]
    fn test_copy_paste_mints_fresh_offset_copy() {
        let mut editor = editor_with_bg();
        editor.commit_add(ann(1, 0.5, 0.5));
        assert!(editor.copy_selection());

        let pasted = editor.paste();
        assert_eq!(pasted.len(), 1);
        assert_eq!(editor.annotations().len(), 2);

        let copy = editor.get(&pasted[0]).unwrap();
        assert!(!copy.id.is_persisted());
        let bg = editor.background().unwrap();
        let center = copy.world_center(bg);
        assert!((center.x - PASTE_OFFSET).abs() < 1e-9);
        assert!((center.y - PASTE_OFFSET).abs() < 1e-9);

        // Paste is undoable like any other add.
        assert!(editor.undo());
        assert_eq!(editor.annotations().len(), 1);
    }

    #[test]
    fn test_set_class_noop_guard() {
        let mut editor = editor_with_bg();
        editor.commit_add(ann(1, 0.5, 0.5));
        let id = AnnotationId::Persisted(1);
        let depth = editor.history().undo_len();

        assert!(!editor.set_class(&id, 0));
        assert_eq!(editor.history().undo_len(), depth);

        assert!(editor.set_class(&id, 4));
        assert_eq!(editor.get(&id).unwrap().class, 4);
        assert_eq!(editor.history().undo_len(), depth + 1);
    }

    #[test]
    fn test_delete_selected_is_undoable() {
        let mut editor = editor_with_bg();
        editor.commit_add(ann(1, 0.5, 0.5));

        assert!(editor.delete_selected());
        assert!(editor.annotations().is_empty());
        assert!(editor.selected().is_none());

        assert!(editor.undo());
        assert_eq!(editor.annotations().len(), 1);
    }

    #[test]
    fn test_promote_id_updates_selection() {
        let mut editor = editor_with_bg();
        let temp = AnnotationId::mint_temp();
        editor.commit_add(Annotation::new(temp.clone(), 0.5, 0.5, 0.1, 0.1));

        editor.promote_id(&temp, 99);
        assert_eq!(editor.selected(), Some(&AnnotationId::Persisted(99)));
        assert!(editor.get(&AnnotationId::Persisted(99)).is_some());
    }

    #[test]
    fn test_recovery_round_trip_through_restart() {
        let storage = Arc::new(MemoryStorage::new());

        let mut editor = Editor::new().with_recovery(storage.clone());
        editor.initialize(vec![]);
        editor.set_background(1000.0, 800.0);
        editor.commit_add(ann(1, 0.5, 0.5));

        // A new editor over the same storage restores undo-ability.
        let mut restarted = Editor::new().with_recovery(storage);
        restarted.initialize(editor.annotations().to_vec());
        restarted.set_background(1000.0, 800.0);

        assert!(restarted.can_undo());
        assert!(restarted.undo());
        assert!(restarted.annotations().is_empty());
    }

    #[test]
    fn test_visible_annotations_falls_back_without_index() {
        let mut editor = editor_with_bg();
        editor.commit_add(ann(1, 0.5, 0.5));
        editor.set_index_suspended(true);

        assert!(editor.active_index().is_none());
        assert_eq!(editor.visible_annotations().len(), 1);

        editor.set_index_suspended(false);
        assert!(editor.active_index().is_some());
        assert_eq!(editor.visible_annotations().len(), 1);
    }

    #[test]
    fn test_create_at_uses_default_size_and_clamps() {
        let mut editor = editor_with_bg();
        let bg = editor.background().unwrap();

        // A point outside the image clamps so the box stays inside.
        let id = editor.create_at(Point::new(10_000.0, 0.0)).unwrap();
        let ann = editor.get(&id).unwrap();
        let center = ann.world_center(bg);
        let size = ann.world_size(bg);

        assert!((size.width - DEFAULT_CREATE_SIZE).abs() < 1e-9);
        assert!((size.height - DEFAULT_CREATE_SIZE).abs() < 1e-9);
        assert!((center.x - (500.0 - DEFAULT_CREATE_SIZE / 2.0)).abs() < 1e-9);
        assert_eq!(editor.selected(), Some(&id));

        // Nothing happens without a background.
        let mut bare = Editor::new();
        bare.initialize(vec![]);
        assert!(bare.create_at(Point::ZERO).is_none());
    }

    #[test]
    fn test_labels_toggle_rebuilds_index() {
        let mut editor = editor_with_bg();
        editor.commit_add(ann(1, 0.5, 0.5));

        editor.set_labels_enabled(true);
        let index = editor.active_index().unwrap();
        assert!(index.labels_enabled());

        editor.set_labels_enabled(false);
        assert!(!editor.active_index().unwrap().labels_enabled());
    }

    #[test]
    fn test_dirty_flag_is_consumed() {
        let mut editor = editor_with_bg();
        assert!(editor.take_dirty());
        assert!(!editor.take_dirty());

        editor.mark_dirty();
        editor.mark_dirty();
        assert!(editor.take_dirty());
        assert!(!editor.take_dirty());
    }
}
