//! Camera module for pan/zoom/rotation of the annotation viewport.

use crate::annotation::Background;
use crate::geometry::rotate_vec;
use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Wheel delta to zoom-factor exponent rate.
pub const WHEEL_ZOOM_RATE: f64 = 0.002;

/// Hard ceiling on zoom, in screen pixels per world unit.
pub const MAX_ZOOM: f64 = 32.0;

/// Camera manages the view transform for the canvas.
///
/// `center` is the world-space point shown at the middle of the viewport;
/// `zoom` is in screen pixels per world unit. `min_zoom` is recomputed from
/// the background and viewport so the image always covers the viewport on its
/// tighter axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// World point at the viewport center (pan).
    pub center: Point,
    /// Screen pixels per world unit.
    pub zoom: f64,
    /// View rotation in radians.
    pub rotation: f64,
    /// Minimum allowed zoom level.
    pub min_zoom: f64,
    /// Maximum allowed zoom level.
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center: Point::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            min_zoom: 1e-3,
            max_zoom: MAX_ZOOM,
        }
    }
}

/// The zoom at which the image exactly covers the viewport on its tighter
/// axis.
pub fn min_zoom_for(viewport: Size, bg: Background) -> f64 {
    (viewport.width / bg.width()).min(viewport.height / bg.height())
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a screen point (physical pixels) to world coordinates.
    ///
    /// This is the single source of truth for hit-testing and creation
    /// coordinates; it is the exact inverse of [`Camera::world_to_screen`].
    pub fn screen_to_world(&self, screen: Point, viewport: Size) -> Point {
        let rel = Vec2::new(
            screen.x - viewport.width / 2.0,
            screen.y - viewport.height / 2.0,
        );
        self.center + rotate_vec(rel, -self.rotation) / self.zoom
    }

    /// Convert a world point to screen coordinates (physical pixels).
    pub fn world_to_screen(&self, world: Point, viewport: Size) -> Point {
        let rel = rotate_vec((world - self.center) * self.zoom, self.rotation);
        Point::new(
            viewport.width / 2.0 + rel.x,
            viewport.height / 2.0 + rel.y,
        )
    }

    /// Recompute `min_zoom` for a background/viewport pair and re-clamp.
    pub fn fit_background(&mut self, viewport: Size, bg: Background) {
        self.min_zoom = min_zoom_for(viewport, bg);
        self.clamp(viewport, bg);
    }

    /// Enforce the zoom floor and keep the image covering the viewport.
    ///
    /// Per axis the pannable range is `[-img/2 + halfView, img/2 - halfView]`
    /// with `halfView = viewport / (2 * zoom)`; an inverted range means the
    /// image is narrower than the viewport at this zoom, and that axis
    /// centers at 0 instead.
    pub fn clamp(&mut self, viewport: Size, bg: Background) {
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);

        let half_view_w = viewport.width / (2.0 * self.zoom);
        let half_view_h = viewport.height / (2.0 * self.zoom);

        self.center.x = clamp_axis(self.center.x, bg.width() / 2.0, half_view_w);
        self.center.y = clamp_axis(self.center.y, bg.height() / 2.0, half_view_h);
    }

    /// Pan by a screen-space delta (drag direction), keeping the grabbed
    /// world point under the pointer.
    pub fn pan_by_screen_delta(&mut self, delta: Vec2, viewport: Size, bg: Option<Background>) {
        self.center -= rotate_vec(delta, -self.rotation) / self.zoom;
        if let Some(bg) = bg {
            self.clamp(viewport, bg);
        }
    }

    /// Zoom toward a pointer position.
    ///
    /// The world point under `screen_point` stays fixed; the camera center is
    /// shifted by the drift introduced by the zoom change before any pan
    /// clamping runs, otherwise the focus point drifts near the image
    /// boundary.
    pub fn zoom_at(
        &mut self,
        screen_point: Point,
        wheel_delta: f64,
        viewport: Size,
        bg: Option<Background>,
    ) {
        let new_zoom = (self.zoom * (wheel_delta * WHEEL_ZOOM_RATE).exp())
            .clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let before = self.screen_to_world(screen_point, viewport);
        self.zoom = new_zoom;
        let after = self.screen_to_world(screen_point, viewport);
        self.center += before - after;

        if let Some(bg) = bg {
            self.clamp(viewport, bg);
        }
    }
}

fn clamp_axis(value: f64, half_image: f64, half_view: f64) -> f64 {
    let lo = -half_image + half_view;
    let hi = half_image - half_view;
    if lo > hi {
        // Image smaller than the viewport on this axis: center it.
        0.0
    } else {
        value.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Size = Size::new(800.0, 600.0);

    #[test]
    fn test_screen_world_round_trip() {
        let mut camera = Camera::new();
        camera.center = Point::new(37.0, -12.0);
        camera.zoom = 2.5;
        camera.rotation = 0.6;

        let screen = Point::new(123.0, 456.0);
        let world = camera.screen_to_world(screen, VIEWPORT);
        let back = camera.world_to_screen(world, VIEWPORT);

        assert!((back.x - screen.x).abs() < 1e-9);
        assert!((back.y - screen.y).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_center_maps_to_camera_center() {
        let mut camera = Camera::new();
        camera.center = Point::new(10.0, 20.0);
        camera.zoom = 3.0;
        camera.rotation = 1.1;

        let world = camera.screen_to_world(Point::new(400.0, 300.0), VIEWPORT);
        assert!((world.x - 10.0).abs() < 1e-9);
        assert!((world.y - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_zoom_covers_tighter_axis() {
        let bg = Background::new(1600.0, 600.0).unwrap();
        let min = min_zoom_for(VIEWPORT, bg);
        assert!((min - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_keeps_image_covering_viewport() {
        let bg = Background::new(2000.0, 2000.0).unwrap();
        let mut camera = Camera::new();
        camera.min_zoom = min_zoom_for(VIEWPORT, bg);
        camera.zoom = 1.0;
        camera.center = Point::new(5000.0, -5000.0);

        camera.clamp(VIEWPORT, bg);

        // Pannable range is [-1000 + 400, 1000 - 400] horizontally.
        assert!((camera.center.x - 600.0).abs() < 1e-12);
        assert!((camera.center.y - -700.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_centers_axis_when_image_smaller_than_viewport() {
        let bg = Background::new(400.0, 2000.0).unwrap();
        let mut camera = Camera::new();
        camera.min_zoom = 0.1;
        camera.zoom = 1.0;
        camera.center = Point::new(150.0, 0.0);

        camera.clamp(VIEWPORT, bg);

        // 400px image in an 800px viewport at zoom 1: x centers at 0.
        assert!((camera.center.x - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_enforces_min_zoom() {
        let bg = Background::new(800.0, 600.0).unwrap();
        let mut camera = Camera::new();
        camera.min_zoom = min_zoom_for(VIEWPORT, bg);
        camera.zoom = 0.01;

        camera.clamp(VIEWPORT, bg);
        assert!((camera.zoom - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zoom_at_keeps_pointer_fixed() {
        // The scenario from the interaction contract: zoom in centered at an
        // off-center screen point and assert the world point under it has not
        // moved.
        let mut camera = Camera::new();
        let pointer = Point::new(600.0, 300.0);

        let before = camera.screen_to_world(pointer, VIEWPORT);
        camera.zoom_at(pointer, 200.0, VIEWPORT, None);
        assert!(camera.zoom > 1.0);
        let after = camera.screen_to_world(pointer, VIEWPORT);

        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_at_respects_bounds() {
        let mut camera = Camera::new();
        camera.min_zoom = 0.5;
        camera.max_zoom = 4.0;

        camera.zoom_at(Point::new(400.0, 300.0), 1e6, VIEWPORT, None);
        assert!((camera.zoom - 4.0).abs() < 1e-12);

        camera.zoom_at(Point::new(400.0, 300.0), -1e6, VIEWPORT, None);
        assert!((camera.zoom - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_pan_moves_world_opposite_to_drag() {
        let mut camera = Camera::new();
        camera.pan_by_screen_delta(Vec2::new(50.0, 0.0), VIEWPORT, None);
        // Dragging right shows content further left.
        assert!((camera.center.x - -50.0).abs() < 1e-12);
    }
}
