//! Pointer interaction routing.
//!
//! Every pointer-down is classified into exactly one gesture by a fixed
//! priority order; pointer-moves feed the single active gesture; pointer-up
//! finalizes it and records at most one history delta. Mid-gesture nothing is
//! journaled and the spatial index is left alone — it settles once, at
//! gesture end.

use crate::annotation::{Annotation, AnnotationId, Background};
use crate::editor::{Editor, EditorMode};
use crate::geometry::{corner_world_position, rotate_vec, Corner};
use crate::history::{ChangeKind, FieldPatch};
use crate::index;
use crate::input::{InputState, KeyEvent, Modifiers, MouseButton, PointerEvent};
use crate::manipulate;
use kurbo::{Point, Rect, Size, Vec2};

/// Handle hit tolerance in screen pixels; divided by the camera zoom before
/// comparing in world space.
pub const HANDLE_HIT_TOLERANCE: f64 = 12.0;

/// Distance from the box's top edge to the rotation knob, in screen pixels.
pub const ROTATION_HANDLE_OFFSET: f64 = 24.0;

/// Minimum drag-created annotation edge, in world units; smaller gestures
/// are discarded as accidental clicks.
pub const MIN_CREATE_WORLD_SIZE: f64 = 4.0;

/// Screen-space footprint reserved for the context-menu overlay.
pub const CONTEXT_MENU_SIZE: Size = Size::new(180.0, 220.0);

/// The key that forces panning while held.
pub const FORCE_PAN_KEY: &str = "Space";

/// The single active pointer gesture.
///
/// One tagged state instead of a set of booleans: being in two gestures at
/// once is unrepresentable.
#[derive(Debug, Clone, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Panning {
        last_screen: Point,
    },
    Creating {
        start_world: Point,
        current_world: Point,
    },
    Dragging {
        id: AnnotationId,
        grab_offset: Vec2,
        start: Annotation,
    },
    Resizing {
        id: AnnotationId,
        corner: Corner,
        start: Annotation,
    },
    Rotating {
        id: AnnotationId,
        start_pointer_angle: f64,
        start: Annotation,
    },
}

impl Gesture {
    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }

    /// Whether this gesture mutates annotation geometry.
    pub fn is_manipulating(&self) -> bool {
        matches!(
            self,
            Gesture::Dragging { .. } | Gesture::Resizing { .. } | Gesture::Rotating { .. }
        )
    }
}

/// An open context-menu overlay.
///
/// Captures both the screen position (for the host's menu placement) and the
/// world position (for subsequent creation at the clicked spot).
#[derive(Debug, Clone)]
pub struct ContextMenu {
    pub screen: Point,
    pub world: Point,
    /// Annotation under the pointer when the menu opened, if any.
    pub target: Option<AnnotationId>,
}

impl ContextMenu {
    /// The screen rectangle the overlay occupies.
    pub fn menu_rect(&self) -> Rect {
        Rect::new(
            self.screen.x,
            self.screen.y,
            self.screen.x + CONTEXT_MENU_SIZE.width,
            self.screen.y + CONTEXT_MENU_SIZE.height,
        )
    }
}

/// Cursor shape the host should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Default,
    Grab,
    Grabbing,
    Crosshair,
    Move,
    Rotate,
    ResizeNs,
    ResizeEw,
    ResizeNwse,
    ResizeNesw,
}

/// World position of the rotation knob for an annotation: above the top
/// edge, at a fixed screen offset, rotated with the box.
pub fn rotation_handle_position(ann: &Annotation, bg: Background, zoom: f64) -> Point {
    let center = ann.world_center(bg);
    let size = ann.world_size(bg);
    let offset = size.height / 2.0 + ROTATION_HANDLE_OFFSET / zoom;
    center + rotate_vec(Vec2::new(0.0, -offset), ann.rotation)
}

/// Resize cursor for a corner, chosen from the corner's current world-space
/// direction from the box center — a fixed per-corner mapping points the
/// wrong way once the box rotates.
pub fn resize_cursor_for_direction(direction: Vec2) -> CursorShape {
    let angle = direction.y.atan2(direction.x);
    let sector = (angle / std::f64::consts::FRAC_PI_4)
        .round()
        .rem_euclid(8.0) as usize
        % 8;
    match sector % 4 {
        0 => CursorShape::ResizeEw,
        1 => CursorShape::ResizeNwse,
        2 => CursorShape::ResizeNs,
        _ => CursorShape::ResizeNesw,
    }
}

/// Routes pointer/keyboard events into editor operations.
#[derive(Default)]
pub struct EventRouter {
    input: InputState,
    gesture: Gesture,
    context_menu: Option<ContextMenu>,
    cursor: CursorShape,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn cursor(&self) -> CursorShape {
        self.cursor
    }

    pub fn context_menu(&self) -> Option<&ContextMenu> {
        self.context_menu.as_ref()
    }

    pub fn close_context_menu(&mut self, editor: &mut Editor) {
        if self.context_menu.take().is_some() {
            editor.mark_dirty();
        }
    }

    /// The in-progress create rectangle, for the renderer's preview.
    pub fn create_preview(&self) -> Option<Rect> {
        match &self.gesture {
            Gesture::Creating {
                start_world,
                current_world,
            } => Some(Rect::from_points(*start_world, *current_world)),
            _ => None,
        }
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.input.set_scale_factor(scale_factor);
    }

    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.input.set_modifiers(modifiers);
    }

    /// Feed a pointer event through the router.
    pub fn dispatch(&mut self, editor: &mut Editor, event: PointerEvent) {
        match self.input.ingest_pointer_event(event) {
            PointerEvent::Down { position, button } => self.pointer_down(editor, position, button),
            PointerEvent::Move { position } => self.pointer_move(editor, position),
            PointerEvent::Up { position, button } => self.pointer_up(editor, position, button),
            PointerEvent::Scroll { position, delta } => self.scroll(editor, position, delta),
        }
    }

    /// Feed a keyboard event through the router. Escape discards the active
    /// gesture without recording anything.
    pub fn key(&mut self, editor: &mut Editor, event: KeyEvent) {
        self.input.handle_key_event(&event);
        if let KeyEvent::Pressed(key) = &event {
            if key == "Escape" {
                self.cancel(editor);
            }
        }
    }

    // ------------------------------------------------------------------
    // Pointer down: one branch, first match wins
    // ------------------------------------------------------------------

    fn pointer_down(&mut self, editor: &mut Editor, screen: Point, button: MouseButton) {
        // 1. Read-only and force-pan override everything.
        if editor.read_only() || self.input.is_key_pressed(FORCE_PAN_KEY) {
            self.begin_pan(screen);
            return;
        }

        // 2. An open overlay consumes the click either way.
        if let Some(menu) = &self.context_menu {
            if !menu.menu_rect().contains(screen) {
                self.close_context_menu(editor);
            }
            return;
        }

        // 3. Secondary button opens the context menu.
        if button == MouseButton::Right {
            let world = editor.screen_to_world(screen);
            let target = self.hit_annotation(editor, world);
            self.context_menu = Some(ContextMenu {
                screen,
                world,
                target,
            });
            editor.mark_dirty();
            return;
        }

        if button == MouseButton::Middle {
            self.begin_pan(screen);
            return;
        }

        // Everything below needs a loaded background.
        let Some(bg) = editor.background() else {
            self.begin_pan(screen);
            return;
        };
        let world = editor.screen_to_world(screen);

        // 4. Create mode: a primary press starts a create gesture.
        if editor.mode() == EditorMode::Create {
            let start = bg.clamp_world_point(world);
            self.gesture = Gesture::Creating {
                start_world: start,
                current_world: start,
            };
            self.cursor = CursorShape::Crosshair;
            editor.mark_dirty();
            return;
        }

        // 5. Handles of the selected annotation: rotation beats resize
        //    beats drag.
        if let Some(id) = editor.selected().cloned() {
            if let Some(ann) = editor.get(&id).cloned() {
                let tolerance = HANDLE_HIT_TOLERANCE / editor.camera.zoom;

                let knob = rotation_handle_position(&ann, bg, editor.camera.zoom);
                if (world - knob).hypot() <= tolerance {
                    self.gesture = Gesture::Rotating {
                        id,
                        start_pointer_angle: manipulate::pointer_angle(&ann, world, bg),
                        start: ann,
                    };
                    self.cursor = CursorShape::Rotate;
                    editor.set_index_suspended(true);
                    return;
                }

                let center = ann.world_center(bg);
                let size = ann.world_size(bg);
                for corner in Corner::ALL {
                    let pos = corner_world_position(center, size, ann.rotation, corner);
                    if (world - pos).hypot() <= tolerance {
                        self.cursor = resize_cursor_for_direction(pos - center);
                        self.gesture = Gesture::Resizing { id, corner, start: ann };
                        editor.set_index_suspended(true);
                        return;
                    }
                }

                if index::hit_test(&ann, bg, editor.labels_enabled(), world) {
                    self.begin_drag(editor, id, ann, world, bg);
                    return;
                }
            }
        }

        // 6. Hit-test everything, topmost first; a hit selects and arms a
        //    drag in the same press.
        if let Some(id) = self.hit_annotation(editor, world) {
            if let Some(ann) = editor.get(&id).cloned() {
                editor.select(Some(id.clone()));
                self.begin_drag(editor, id, ann, world, bg);
                return;
            }
        }

        // 7. Nothing hit: pan and deselect.
        editor.select(None);
        self.begin_pan(screen);
    }

    fn begin_pan(&mut self, screen: Point) {
        self.gesture = Gesture::Panning {
            last_screen: screen,
        };
        self.cursor = CursorShape::Grabbing;
    }

    fn begin_drag(
        &mut self,
        editor: &mut Editor,
        id: AnnotationId,
        ann: Annotation,
        world: Point,
        bg: Background,
    ) {
        let grab_offset = world - ann.world_center(bg);
        self.gesture = Gesture::Dragging {
            id,
            grab_offset,
            start: ann,
        };
        self.cursor = CursorShape::Move;
        editor.set_index_suspended(true);
    }

    // ------------------------------------------------------------------
    // Pointer move: feed the single active gesture
    // ------------------------------------------------------------------

    fn pointer_move(&mut self, editor: &mut Editor, screen: Point) {
        let world = editor.screen_to_world(screen);

        if self.gesture.is_idle() {
            self.update_hover(editor, world);
            return;
        }

        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Panning { last_screen } => {
                let delta = screen - *last_screen;
                *last_screen = screen;
                let viewport = editor.viewport();
                let bg = editor.background();
                editor.camera.pan_by_screen_delta(delta, viewport, bg);
                editor.mark_dirty();
            }
            Gesture::Creating { current_world, .. } => {
                if let Some(bg) = editor.background() {
                    *current_world = bg.clamp_world_point(world);
                    editor.mark_dirty();
                }
            }
            Gesture::Dragging {
                id, grab_offset, ..
            } => {
                let Some(bg) = editor.background() else {
                    return;
                };
                if let Some(current) = editor.get(id).cloned() {
                    let moved = manipulate::translate(&current, world - *grab_offset, bg);
                    let id = id.clone();
                    if let Some(slot) = editor.annotation_mut(&id) {
                        *slot = moved;
                    }
                    editor.mark_dirty();
                }
            }
            Gesture::Resizing { id, corner, .. } => {
                let Some(bg) = editor.background() else {
                    return;
                };
                if let Some(current) = editor.get(id).cloned() {
                    let resized = manipulate::resize(&current, world, bg, *corner);
                    let id = id.clone();
                    if let Some(slot) = editor.annotation_mut(&id) {
                        *slot = resized;
                    }
                    editor.mark_dirty();
                }
            }
            Gesture::Rotating {
                id,
                start_pointer_angle,
                start,
            } => {
                let Some(bg) = editor.background() else {
                    return;
                };
                if let Some(current) = editor.get(id).cloned() {
                    let rotated = manipulate::rotate(
                        &current,
                        world,
                        bg,
                        *start_pointer_angle,
                        start.rotation,
                    );
                    let id = id.clone();
                    if let Some(slot) = editor.annotation_mut(&id) {
                        *slot = rotated;
                    }
                    editor.mark_dirty();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Pointer up: finalize, record at most one delta, settle the index
    // ------------------------------------------------------------------

    fn pointer_up(&mut self, editor: &mut Editor, _screen: Point, _button: MouseButton) {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        editor.set_index_suspended(false);
        self.cursor = CursorShape::Default;

        match gesture {
            Gesture::Idle | Gesture::Panning { .. } => {}
            Gesture::Creating {
                start_world,
                current_world,
            } => {
                self.finish_create(editor, start_world, current_world);
            }
            Gesture::Dragging { id, start, .. } => {
                if let Some(current) = editor.get(&id).cloned() {
                    editor.commit_change(
                        ChangeKind::Move,
                        &id,
                        FieldPatch::position(&start),
                        FieldPatch::position(&current),
                    );
                }
            }
            Gesture::Resizing { id, start, .. } => {
                if let Some(current) = editor.get(&id).cloned() {
                    editor.commit_change(
                        ChangeKind::Resize,
                        &id,
                        FieldPatch::geometry(&start),
                        FieldPatch::geometry(&current),
                    );
                }
            }
            Gesture::Rotating { id, start, .. } => {
                if let Some(current) = editor.get(&id).cloned() {
                    editor.commit_change(
                        ChangeKind::Rotate,
                        &id,
                        FieldPatch::rotation(&start),
                        FieldPatch::rotation(&current),
                    );
                }
            }
        }
    }

    fn finish_create(&mut self, editor: &mut Editor, start: Point, end: Point) {
        let Some(bg) = editor.background() else {
            return;
        };
        let rect = Rect::from_points(start, end);
        if rect.width() < MIN_CREATE_WORLD_SIZE || rect.height() < MIN_CREATE_WORLD_SIZE {
            // Accidental click: the preview just disappears.
            editor.mark_dirty();
            return;
        }
        let annotation =
            Annotation::create_from_world_rect(AnnotationId::mint_temp(), rect, bg);
        editor.commit_add(annotation);
    }

    fn scroll(&mut self, editor: &mut Editor, screen: Point, delta: Vec2) {
        let viewport = editor.viewport();
        let bg = editor.background();
        editor.camera.zoom_at(screen, delta.y, viewport, bg);
        editor.mark_dirty();
    }

    /// Discard the active gesture without recording, restoring the
    /// pointer-down snapshot. Also closes any open context menu.
    pub fn cancel(&mut self, editor: &mut Editor) {
        self.close_context_menu(editor);

        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        editor.set_index_suspended(false);
        self.cursor = CursorShape::Default;

        match gesture {
            Gesture::Dragging { id, start, .. }
            | Gesture::Resizing { id, start, .. }
            | Gesture::Rotating { id, start, .. } => {
                if let Some(slot) = editor.annotation_mut(&id) {
                    *slot = start;
                }
                editor.rebuild_index();
                editor.mark_dirty();
            }
            Gesture::Creating { .. } => editor.mark_dirty(),
            Gesture::Panning { .. } | Gesture::Idle => {}
        }
    }

    // ------------------------------------------------------------------
    // Hit-testing and hover
    // ------------------------------------------------------------------

    /// Topmost annotation at a world point, labels included. Candidates come
    /// from the index when it is live; precise tests run on the candidate
    /// set in reverse paint order so top boxes win ties.
    fn hit_annotation(&self, editor: &Editor, world: Point) -> Option<AnnotationId> {
        let bg = editor.background()?;
        let labels = editor.labels_enabled();
        let candidates = index::hit_candidates(
            editor.active_index(),
            editor.annotations(),
            bg,
            labels,
            world,
        );
        editor
            .annotations()
            .iter()
            .rev()
            .find(|ann| candidates.contains(&ann.id) && index::hit_test(ann, bg, labels, world))
            .map(|ann| ann.id.clone())
    }

    /// Hover hit-testing with click priority, driving the cursor shape.
    fn update_hover(&mut self, editor: &mut Editor, world: Point) {
        if editor.read_only() {
            self.cursor = CursorShape::Grab;
            editor.set_hovered(None);
            return;
        }
        let Some(bg) = editor.background() else {
            self.cursor = CursorShape::Default;
            editor.set_hovered(None);
            return;
        };
        if editor.mode() == EditorMode::Create {
            self.cursor = CursorShape::Crosshair;
            editor.set_hovered(None);
            return;
        }

        if let Some(id) = editor.selected().cloned() {
            if let Some(ann) = editor.get(&id).cloned() {
                let tolerance = HANDLE_HIT_TOLERANCE / editor.camera.zoom;

                let knob = rotation_handle_position(&ann, bg, editor.camera.zoom);
                if (world - knob).hypot() <= tolerance {
                    self.cursor = CursorShape::Rotate;
                    editor.set_hovered(Some(id));
                    return;
                }

                let center = ann.world_center(bg);
                let size = ann.world_size(bg);
                for corner in Corner::ALL {
                    let pos = corner_world_position(center, size, ann.rotation, corner);
                    if (world - pos).hypot() <= tolerance {
                        self.cursor = resize_cursor_for_direction(pos - center);
                        editor.set_hovered(Some(id));
                        return;
                    }
                }
            }
        }

        match self.hit_annotation(editor, world) {
            Some(id) => {
                self.cursor = CursorShape::Move;
                editor.set_hovered(Some(id));
            }
            None => {
                self.cursor = CursorShape::Default;
                editor.set_hovered(None);
            }
        }
    }
}
