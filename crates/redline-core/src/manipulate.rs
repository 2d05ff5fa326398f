//! Pure annotation transforms: rotate, resize, move.
//!
//! Every operation takes an annotation plus interaction parameters and
//! returns a new annotation; nothing mutates in place. The caller captures
//! whatever gesture-start values an operation needs (start angle, start
//! rotation, grab offset) once at pointer-down and passes them on every move.

use crate::annotation::{Annotation, Background};
use crate::geometry::{rotate_vec, rotated_aabb, Corner};
use kurbo::{Point, Size, Vec2};

/// Smallest allowed annotation dimension, in world pixels. Prevents
/// degenerate or inverted boxes when the pointer crosses the anchor corner.
pub const MIN_WORLD_DIMENSION: f64 = 1.0;

/// Rotate around the center, relative to the gesture start.
///
/// `gesture_start_angle` is the pointer's angle from the box center at
/// pointer-down and `start_rotation` the box rotation at the same instant;
/// both are captured once so the rotation tracks the pointer without
/// jumping.
pub fn rotate(
    ann: &Annotation,
    pointer_world: Point,
    bg: Background,
    gesture_start_angle: f64,
    start_rotation: f64,
) -> Annotation {
    let center = ann.world_center(bg);
    let current = (pointer_world.y - center.y).atan2(pointer_world.x - center.x);
    let mut out = ann.clone();
    out.rotation = start_rotation + (current - gesture_start_angle);
    out
}

/// The pointer angle from the annotation center, for capturing a rotation
/// gesture's start.
pub fn pointer_angle(ann: &Annotation, pointer_world: Point, bg: Background) -> f64 {
    let center = ann.world_center(bg);
    (pointer_world.y - center.y).atan2(pointer_world.x - center.x)
}

/// Resize by dragging `corner`, anchoring the opposite corner.
///
/// The pointer is transformed into the box's local (unrotated) frame; the
/// anchor is the opposite corner, fixed in that frame. The new center is the
/// midpoint of anchor and pointer and the new extents their separation, so
/// the anchored corner's world position never moves. Rotation is preserved,
/// never recomputed. The result is clamped so its rotated AABB stays inside
/// the image.
pub fn resize(
    ann: &Annotation,
    pointer_world: Point,
    bg: Background,
    corner: Corner,
) -> Annotation {
    let center = ann.world_center(bg);
    let size = ann.world_size(bg);
    let sign = corner.local_sign();

    // Opposite corner in local space.
    let anchor = Vec2::new(-sign.x * size.width / 2.0, -sign.y * size.height / 2.0);
    let local_pointer = rotate_vec(pointer_world - center, -ann.rotation);

    // Extent from anchor toward the dragged corner, floored so the box can
    // neither collapse nor invert.
    let mut dx = local_pointer.x - anchor.x;
    let mut dy = local_pointer.y - anchor.y;
    if dx * sign.x < MIN_WORLD_DIMENSION {
        dx = MIN_WORLD_DIMENSION * sign.x;
    }
    if dy * sign.y < MIN_WORLD_DIMENSION {
        dy = MIN_WORLD_DIMENSION * sign.y;
    }

    let new_size = Size::new(dx.abs(), dy.abs());
    let new_center_local = anchor + Vec2::new(dx, dy) / 2.0;
    let new_center = center + rotate_vec(new_center_local, ann.rotation);

    let clamped = clamp_center_to_image(new_center, new_size, ann.rotation, bg);
    ann.from_world(clamped, new_size, ann.rotation, bg)
}

/// Move the annotation so its center lands at `pointer_world`.
///
/// The caller subtracts the initial grab offset so the box does not jump to
/// the pointer on the first move event.
pub fn translate(ann: &Annotation, pointer_world: Point, bg: Background) -> Annotation {
    let size = ann.world_size(bg);
    let clamped = clamp_center_to_image(pointer_world, size, ann.rotation, bg);
    ann.from_world(clamped, size, ann.rotation, bg)
}

/// Clamp a box center so the rotated AABB stays within the image, clamping
/// independently per axis. An axis whose AABB is wider than the image
/// centers at 0.
pub fn clamp_center_to_image(
    center: Point,
    size: Size,
    rotation: f64,
    bg: Background,
) -> Point {
    let aabb = rotated_aabb(Point::ZERO, size, rotation);
    let hw = aabb.width() / 2.0;
    let hh = aabb.height() / 2.0;

    Point::new(
        clamp_axis(center.x, bg.width() / 2.0, hw),
        clamp_axis(center.y, bg.height() / 2.0, hh),
    )
}

fn clamp_axis(value: f64, half_image: f64, half_extent: f64) -> f64 {
    let lo = -half_image + half_extent;
    let hi = half_image - half_extent;
    if lo > hi {
        0.0
    } else {
        value.clamp(lo, hi)
    }
}
