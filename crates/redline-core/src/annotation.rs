//! Annotation entity: rectangular findings drawn over the background image.

use kurbo::{Point, Rect, Size, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for SerializableColor {
    /// Default display color for a freshly created annotation.
    fn default() -> Self {
        Self::new(0xE5, 0x39, 0x35, 0xFF)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Identity of an annotation.
///
/// An annotation is created with a session-local temporary id and promoted to
/// a persisted id once the external save collaborator assigns one. Exactly one
/// representation exists at any time; promotion swaps the variant and never
/// touches geometry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationId {
    /// Id assigned by the save collaborator once the annotation is stored.
    Persisted(i64),
    /// Session-local id minted at creation time.
    Temp(Uuid),
}

impl AnnotationId {
    /// Mint a fresh session-local id.
    pub fn mint_temp() -> Self {
        Self::Temp(Uuid::new_v4())
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }
}

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{id}"),
            Self::Temp(id) => write!(f, "{id}"),
        }
    }
}

/// The background image dimensions, in pixels.
///
/// All annotation coordinates are normalized against this. World units are
/// pixels centered at the image origin, so world x spans
/// `[-width / 2, width / 2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Background {
    width: f64,
    height: f64,
}

impl Background {
    /// Create a background; rejects non-positive or non-finite dimensions.
    pub fn new(width: f64, height: f64) -> Option<Self> {
        (width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0)
            .then_some(Self { width, height })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// The image extent as a world-space rectangle centered at the origin.
    pub fn world_rect(&self) -> Rect {
        Rect::new(
            -self.width / 2.0,
            -self.height / 2.0,
            self.width / 2.0,
            self.height / 2.0,
        )
    }

    /// Clamp a world point into the image extent.
    pub fn clamp_world_point(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(-self.width / 2.0, self.width / 2.0),
            point.y.clamp(-self.height / 2.0, self.height / 2.0),
        )
    }
}

/// A rectangular annotation over the background image.
///
/// Position and size are normalized to `[0, 1]` against the background
/// dimensions, which keeps stored annotations resolution-independent. All
/// rotation and translation math happens in world units; conversions go
/// through [`Annotation::world_center`] / [`Annotation::world_size`] and back
/// through [`Annotation::from_world`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    /// Center x, normalized to [0, 1] of the background width.
    pub x: f64,
    /// Center y, normalized to [0, 1] of the background height.
    pub y: f64,
    /// Width, normalized to [0, 1] of the background width.
    pub w: f64,
    /// Height, normalized to [0, 1] of the background height.
    pub h: f64,
    /// Rotation around the center, radians.
    #[serde(default)]
    pub rotation: f64,
    /// Class/category id.
    #[serde(default)]
    pub class: u32,
    /// Display color.
    #[serde(default)]
    pub color: SerializableColor,
}

impl Annotation {
    pub fn new(id: AnnotationId, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            id,
            x,
            y,
            w,
            h,
            rotation: 0.0,
            class: 0,
            color: SerializableColor::default(),
        }
    }

    /// Center in world units.
    pub fn world_center(&self, bg: Background) -> Point {
        Point::new(
            (self.x - 0.5) * bg.width(),
            (self.y - 0.5) * bg.height(),
        )
    }

    /// Size in world units.
    pub fn world_size(&self, bg: Background) -> Size {
        Size::new(self.w * bg.width(), self.h * bg.height())
    }

    /// Rebuild the normalized position/size from world-unit geometry,
    /// preserving identity, class, and color.
    pub fn from_world(&self, center: Point, size: Size, rotation: f64, bg: Background) -> Self {
        Self {
            id: self.id.clone(),
            x: center.x / bg.width() + 0.5,
            y: center.y / bg.height() + 0.5,
            w: size.width / bg.width(),
            h: size.height / bg.height(),
            rotation,
            class: self.class,
            color: self.color,
        }
    }

    /// Create a fresh annotation from a world-space rectangle.
    pub fn create_from_world_rect(id: AnnotationId, rect: Rect, bg: Background) -> Self {
        let center = rect.center();
        Self::new(
            id,
            center.x / bg.width() + 0.5,
            center.y / bg.height() + 0.5,
            rect.width() / bg.width(),
            rect.height() / bg.height(),
        )
    }

    /// A copy with a fresh temporary id, shifted by a world-space offset.
    /// Used for paste.
    pub fn duplicated(&self, offset: Vec2, bg: Background) -> Self {
        let mut copy = self.clone();
        copy.id = AnnotationId::mint_temp();
        copy.x += offset.x / bg.width();
        copy.y += offset.y / bg.height();
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_rejects_degenerate_dimensions() {
        assert!(Background::new(0.0, 100.0).is_none());
        assert!(Background::new(100.0, -1.0).is_none());
        assert!(Background::new(f64::NAN, 100.0).is_none());
        assert!(Background::new(640.0, 480.0).is_some());
    }

    #[test]
    fn test_world_conversion_round_trip() {
        let bg = Background::new(200.0, 100.0).unwrap();
        let ann = Annotation::new(AnnotationId::mint_temp(), 0.25, 0.75, 0.5, 0.2);

        let center = ann.world_center(bg);
        assert!((center.x - -50.0).abs() < 1e-12);
        assert!((center.y - 25.0).abs() < 1e-12);

        let size = ann.world_size(bg);
        assert!((size.width - 100.0).abs() < 1e-12);
        assert!((size.height - 20.0).abs() < 1e-12);

        let back = ann.from_world(center, size, ann.rotation, bg);
        assert!((back.x - ann.x).abs() < 1e-12);
        assert!((back.y - ann.y).abs() < 1e-12);
        assert!((back.w - ann.w).abs() < 1e-12);
        assert!((back.h - ann.h).abs() < 1e-12);
    }

    #[test]
    fn test_create_from_world_rect_normalizes() {
        let bg = Background::new(200.0, 200.0).unwrap();
        let rect = Rect::new(-50.0, -50.0, 50.0, 50.0);
        let ann = Annotation::create_from_world_rect(AnnotationId::mint_temp(), rect, bg);

        assert!((ann.x - 0.5).abs() < 1e-12);
        assert!((ann.y - 0.5).abs() < 1e-12);
        assert!((ann.w - 0.5).abs() < 1e-12);
        assert!((ann.h - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{"id":{"Persisted":7},"x":0.5,"y":0.5,"w":0.1,"h":0.1}"#;
        let ann: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(ann.id, AnnotationId::Persisted(7));
        assert_eq!(ann.rotation, 0.0);
        assert_eq!(ann.class, 0);
        assert_eq!(ann.color, SerializableColor::default());
    }

    #[test]
    fn test_duplicated_gets_fresh_temp_id() {
        let bg = Background::new(100.0, 100.0).unwrap();
        let ann = Annotation::new(AnnotationId::Persisted(3), 0.5, 0.5, 0.1, 0.1);
        let copy = ann.duplicated(Vec2::new(10.0, 10.0), bg);

        assert!(!copy.id.is_persisted());
        assert!((copy.x - 0.6).abs() < 1e-12);
        assert!((copy.y - 0.6).abs() < 1e-12);
    }
}
