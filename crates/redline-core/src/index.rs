//! Spatial index over annotation bounding boxes.
//!
//! The index is rebuilt from scratch whenever the annotation set changes
//! structurally or a manipulation gesture settles; it is never patched
//! incrementally. When no index exists (no annotations, no background, or a
//! gesture in flight) every consumer falls back to a linear scan over the
//! annotation list. Both paths share the same AABB computation, label
//! inflation included, so indexed and non-indexed hit-testing can never
//! disagree.

use crate::annotation::{Annotation, AnnotationId, Background};
use crate::geometry::{point_in_rotated_box, rotated_aabb, topmost_corner};
use crate::quadtree::{QuadTree, QUERY_EPSILON};
use kurbo::{Point, Rect};
use std::collections::HashSet;

/// Approximate footprint of an on-canvas id label, in world units, anchored
/// at the annotation's topmost rotated corner. One definition shared by the
/// index build, the indexed query path, and the linear fallback.
pub const LABEL_WORLD_WIDTH: f64 = 48.0;
pub const LABEL_WORLD_HEIGHT: f64 = 14.0;

/// The world rectangle occupied by an annotation's id label.
pub fn label_world_rect(ann: &Annotation, bg: Background) -> Rect {
    let top = topmost_corner(ann.world_center(bg), ann.world_size(bg), ann.rotation);
    Rect::new(
        top.x,
        top.y - LABEL_WORLD_HEIGHT,
        top.x + LABEL_WORLD_WIDTH,
        top.y,
    )
}

/// The AABB an annotation occupies in the index: its rotated bounding box,
/// inflated to cover the label footprint when labels are shown.
pub fn indexed_aabb(ann: &Annotation, bg: Background, labels_enabled: bool) -> Rect {
    let aabb = rotated_aabb(ann.world_center(bg), ann.world_size(bg), ann.rotation);
    if labels_enabled {
        aabb.union(label_world_rect(ann, bg))
    } else {
        aabb
    }
}

/// Precise hit test for one annotation: rotated body, plus the label
/// rectangle when labels are shown.
pub fn hit_test(ann: &Annotation, bg: Background, labels_enabled: bool, world: Point) -> bool {
    if point_in_rotated_box(world, ann.world_center(bg), ann.world_size(bg), ann.rotation) {
        return true;
    }
    if !labels_enabled {
        return false;
    }
    let label = label_world_rect(ann, bg);
    world.x >= label.x0 && world.x <= label.x1 && world.y >= label.y0 && world.y <= label.y1
}

/// A built spatial index over the current annotation set.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: QuadTree<AnnotationId>,
    labels_enabled: bool,
}

impl SpatialIndex {
    /// Build an index over `annotations`, or `None` when there is nothing to
    /// index — consumers then linear-scan.
    pub fn build(
        annotations: &[Annotation],
        bg: Background,
        labels_enabled: bool,
    ) -> Option<Self> {
        if annotations.is_empty() {
            return None;
        }

        let mut bounds: Option<Rect> = None;
        let aabbs: Vec<Rect> = annotations
            .iter()
            .map(|ann| {
                let aabb = indexed_aabb(ann, bg, labels_enabled);
                bounds = Some(match bounds {
                    Some(b) => b.union(aabb),
                    None => aabb,
                });
                aabb
            })
            .collect();

        let mut tree = QuadTree::new(bounds?);
        for (ann, aabb) in annotations.iter().zip(aabbs) {
            tree.insert(aabb, ann.id.clone());
        }

        Some(Self {
            tree,
            labels_enabled,
        })
    }

    pub fn labels_enabled(&self) -> bool {
        self.labels_enabled
    }

    /// Candidate ids whose indexed AABB intersects the query rectangle,
    /// deduplicated by effective id.
    pub fn query_rect(&self, range: Rect) -> Vec<AnnotationId> {
        let mut seen = HashSet::new();
        self.tree
            .query(range)
            .into_iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect()
    }

    /// Candidate ids for a point query.
    pub fn query_point(&self, world: Point) -> Vec<AnnotationId> {
        self.query_rect(Rect::new(world.x, world.y, world.x, world.y))
    }
}

/// Candidate ids for a point hit, indexed when possible, linear otherwise.
///
/// The linear path applies the identical label inflation via
/// [`indexed_aabb`].
pub fn hit_candidates(
    index: Option<&SpatialIndex>,
    annotations: &[Annotation],
    bg: Background,
    labels_enabled: bool,
    world: Point,
) -> HashSet<AnnotationId> {
    match index {
        Some(index) => index.query_point(world).into_iter().collect(),
        None => annotations
            .iter()
            .filter(|ann| {
                let aabb = indexed_aabb(ann, bg, labels_enabled);
                world.x >= aabb.x0 - QUERY_EPSILON
                    && world.x <= aabb.x1 + QUERY_EPSILON
                    && world.y >= aabb.y0 - QUERY_EPSILON
                    && world.y <= aabb.y1 + QUERY_EPSILON
            })
            .map(|ann| ann.id.clone())
            .collect(),
    }
}

/// Ids of annotations visible within a world rectangle (for the renderer),
/// indexed when possible, linear otherwise.
pub fn visible_candidates(
    index: Option<&SpatialIndex>,
    annotations: &[Annotation],
    bg: Background,
    labels_enabled: bool,
    range: Rect,
) -> HashSet<AnnotationId> {
    match index {
        Some(index) => index.query_rect(range).into_iter().collect(),
        None => annotations
            .iter()
            .filter(|ann| {
                let aabb = indexed_aabb(ann, bg, labels_enabled);
                aabb.x0 <= range.x1 + QUERY_EPSILON
                    && aabb.x1 >= range.x0 - QUERY_EPSILON
                    && aabb.y0 <= range.y1 + QUERY_EPSILON
                    && aabb.y1 >= range.y0 - QUERY_EPSILON
            })
            .map(|ann| ann.id.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationId;
    use std::f64::consts::FRAC_PI_4;

    fn bg() -> Background {
        Background::new(1000.0, 1000.0).unwrap()
    }

    fn ann(id: i64, x: f64, y: f64, w: f64, h: f64) -> Annotation {
        Annotation::new(AnnotationId::Persisted(id), x, y, w, h)
    }

    #[test]
    fn test_build_returns_none_for_empty_set() {
        assert!(SpatialIndex::build(&[], bg(), false).is_none());
    }

    #[test]
    fn test_point_query_finds_box_body() {
        let annotations = vec![
            ann(1, 0.25, 0.25, 0.1, 0.1),
            ann(2, 0.75, 0.75, 0.1, 0.1),
        ];
        let index = SpatialIndex::build(&annotations, bg(), false).unwrap();

        // World center of annotation 1 is (-250, -250).
        let hits = index.query_point(Point::new(-250.0, -250.0));
        assert_eq!(hits, vec![AnnotationId::Persisted(1)]);
    }

    #[test]
    fn test_label_inflation_extends_hit_area() {
        let annotations = vec![ann(1, 0.5, 0.5, 0.1, 0.1)];
        // Box body spans world [-50, 50]^2; the label sits above the top
        // edge, outside the body.
        let above_top = Point::new(-30.0, -55.0);

        let plain = SpatialIndex::build(&annotations, bg(), false).unwrap();
        assert!(plain.query_point(above_top).is_empty());

        let labeled = SpatialIndex::build(&annotations, bg(), true).unwrap();
        assert_eq!(labeled.query_point(above_top).len(), 1);
        assert!(hit_test(&annotations[0], bg(), true, above_top));
        assert!(!hit_test(&annotations[0], bg(), false, above_top));
    }

    #[test]
    fn test_indexed_and_linear_candidates_agree() {
        let mut annotations = Vec::new();
        for i in 0..40 {
            let fx = 0.1 + 0.02 * f64::from(i % 7);
            let fy = 0.1 + 0.02 * f64::from(i / 7);
            let mut a = ann(i64::from(i), fx, fy, 0.05, 0.03);
            a.rotation = f64::from(i) * 0.21;
            annotations.push(a);
        }
        let index = SpatialIndex::build(&annotations, bg(), true).unwrap();

        for probe in [
            Point::new(-380.0, -380.0),
            Point::new(-350.0, -360.0),
            Point::new(0.0, 0.0),
            Point::new(-330.0, -390.0),
        ] {
            let indexed = hit_candidates(Some(&index), &annotations, bg(), true, probe);
            let linear = hit_candidates(None, &annotations, bg(), true, probe);
            assert_eq!(indexed, linear, "candidate sets drifted at {probe:?}");
        }
    }

    #[test]
    fn test_rotated_box_candidates_cover_rotated_corner() {
        let mut a = ann(1, 0.5, 0.5, 0.2, 0.05);
        a.rotation = FRAC_PI_4;
        let annotations = vec![a.clone()];
        let index = SpatialIndex::build(&annotations, bg(), false).unwrap();

        // A corner of the rotated box that an unrotated AABB would miss.
        let corner = crate::geometry::corner_world_position(
            a.world_center(bg()),
            a.world_size(bg()),
            a.rotation,
            crate::geometry::Corner::Se,
        );
        let candidates = index.query_point(corner);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_visible_candidates_fallback_matches_index() {
        let annotations = vec![
            ann(1, 0.2, 0.2, 0.1, 0.1),
            ann(2, 0.8, 0.8, 0.1, 0.1),
        ];
        let index = SpatialIndex::build(&annotations, bg(), false).unwrap();
        let range = Rect::new(-400.0, -400.0, -200.0, -200.0);

        let via_index = visible_candidates(Some(&index), &annotations, bg(), false, range);
        let via_scan = visible_candidates(None, &annotations, bg(), false, range);
        assert_eq!(via_index, via_scan);
        assert!(via_index.contains(&AnnotationId::Persisted(1)));
        assert!(!via_index.contains(&AnnotationId::Persisted(2)));
    }
}
