//! Rotated-rectangle geometry helpers.
//!
//! Everything here is a pure function over world-unit values. Hit-testing and
//! bounding-box math must agree exactly with the render transform, so this
//! module is the single home for the rotation conventions: positive angles
//! rotate the +x axis toward +y.

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Rotate a vector by `angle` radians.
pub fn rotate_vec(v: Vec2, angle: f64) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Is the point inside the rotated box? Edge-inclusive.
///
/// The point is transformed into box-local space (subtract center, rotate by
/// the negative rotation) and compared against the axis-aligned half-extents.
pub fn point_in_rotated_box(point: Point, center: Point, size: Size, rotation: f64) -> bool {
    let local = rotate_vec(point - center, -rotation);
    local.x.abs() <= size.width / 2.0 && local.y.abs() <= size.height / 2.0
}

/// Axis-aligned bounding box of a rotated rectangle.
///
/// All four corners are rotated and the min/max taken; an unrotated bounding
/// box under-covers a rotated rectangle and loses hits at the edges.
pub fn rotated_aabb(center: Point, size: Size, rotation: f64) -> Rect {
    let hw = size.width / 2.0;
    let hh = size.height / 2.0;
    let corners = [
        rotate_vec(Vec2::new(-hw, -hh), rotation),
        rotate_vec(Vec2::new(hw, -hh), rotation),
        rotate_vec(Vec2::new(hw, hh), rotation),
        rotate_vec(Vec2::new(-hw, hh), rotation),
    ];
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for c in corners {
        min_x = min_x.min(c.x);
        min_y = min_y.min(c.y);
        max_x = max_x.max(c.x);
        max_y = max_y.max(c.y);
    }
    Rect::new(
        center.x + min_x,
        center.y + min_y,
        center.x + max_x,
        center.y + max_y,
    )
}

/// The topmost (minimum-y) rotated corner of a rectangle, in world units.
pub fn topmost_corner(center: Point, size: Size, rotation: f64) -> Point {
    let mut best = corner_world_position(center, size, rotation, Corner::Nw);
    for &corner in &Corner::ALL[1..] {
        let p = corner_world_position(center, size, rotation, corner);
        if p.y < best.y {
            best = p;
        }
    }
    best
}

/// A rectangle corner, named in the box's local (unrotated) frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    Nw,
    Ne,
    Sw,
    Se,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::Nw, Corner::Ne, Corner::Sw, Corner::Se];

    /// The diagonally opposite corner.
    pub fn opposite(self) -> Self {
        match self {
            Corner::Nw => Corner::Se,
            Corner::Ne => Corner::Sw,
            Corner::Sw => Corner::Ne,
            Corner::Se => Corner::Nw,
        }
    }

    /// Unit signs of the corner offset in box-local space.
    pub fn local_sign(self) -> Vec2 {
        match self {
            Corner::Nw => Vec2::new(-1.0, -1.0),
            Corner::Ne => Vec2::new(1.0, -1.0),
            Corner::Sw => Vec2::new(-1.0, 1.0),
            Corner::Se => Vec2::new(1.0, 1.0),
        }
    }
}

/// World-space position of a corner of a rotated rectangle.
pub fn corner_world_position(center: Point, size: Size, rotation: f64, corner: Corner) -> Point {
    let sign = corner.local_sign();
    let local = Vec2::new(sign.x * size.width / 2.0, sign.y * size.height / 2.0);
    center + rotate_vec(local, rotation)
}
