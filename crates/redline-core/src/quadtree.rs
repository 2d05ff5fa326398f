//! Region quadtree for spatial queries over axis-aligned bounding boxes.
//!
//! The tree is rebuilt wholesale whenever the indexed population changes
//! structurally; there is no incremental rebalancing. An item lives at the
//! shallowest node whose bounds fully contain it; items that straddle a child
//! boundary stay at the parent, so no item is ever lost to boundary overlap.

use kurbo::Rect;

/// Slack applied to intersection tests so floating-point edge cases do not
/// drop candidates, in world units.
pub const QUERY_EPSILON: f64 = 0.001;

/// Default leaf capacity before a node subdivides.
pub const DEFAULT_CAPACITY: usize = 8;

/// Default maximum subdivision depth.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Epsilon-slackened rectangle intersection test.
fn intersects(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 + QUERY_EPSILON
        && a.x1 >= b.x0 - QUERY_EPSILON
        && a.y0 <= b.y1 + QUERY_EPSILON
        && a.y1 >= b.y0 - QUERY_EPSILON
}

/// Exact full-containment test (used to push items into children).
fn contains(outer: &Rect, inner: &Rect) -> bool {
    inner.x0 >= outer.x0 && inner.x1 <= outer.x1 && inner.y0 >= outer.y0 && inner.y1 <= outer.y1
}

/// A quadtree node storing payloads keyed by their AABBs.
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    bounds: Rect,
    capacity: usize,
    max_depth: usize,
    depth: usize,
    items: Vec<(Rect, T)>,
    children: Option<Box<[QuadTree<T>; 4]>>,
}

impl<T> QuadTree<T> {
    /// Create an empty tree covering `bounds`.
    pub fn new(bounds: Rect) -> Self {
        Self::with_limits(bounds, DEFAULT_CAPACITY, DEFAULT_MAX_DEPTH)
    }

    pub fn with_limits(bounds: Rect, capacity: usize, max_depth: usize) -> Self {
        Self {
            bounds,
            capacity: capacity.max(1),
            max_depth,
            depth: 0,
            items: Vec::new(),
            children: None,
        }
    }

    fn child(bounds: Rect, capacity: usize, max_depth: usize, depth: usize) -> Self {
        Self {
            bounds,
            capacity,
            max_depth,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Insert a payload with its AABB.
    ///
    /// Returns `false` when the AABB does not intersect this node's bounds.
    pub fn insert(&mut self, aabb: Rect, value: T) -> bool {
        if !intersects(&self.bounds, &aabb) {
            return false;
        }

        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if contains(&child.bounds, &aabb) {
                    return child.insert(aabb, value);
                }
            }
            // Straddles a child boundary: keep it here.
            self.items.push((aabb, value));
            return true;
        }

        self.items.push((aabb, value));

        if self.items.len() > self.capacity && self.depth < self.max_depth {
            self.subdivide();
        }

        true
    }

    /// Split into 4 equal quadrants and push down every item that fits
    /// entirely in one of them.
    fn subdivide(&mut self) {
        let cx = self.bounds.x0 + self.bounds.width() / 2.0;
        let cy = self.bounds.y0 + self.bounds.height() / 2.0;
        let next = self.depth + 1;

        let mut children = Box::new([
            Self::child(
                Rect::new(self.bounds.x0, self.bounds.y0, cx, cy),
                self.capacity,
                self.max_depth,
                next,
            ),
            Self::child(
                Rect::new(cx, self.bounds.y0, self.bounds.x1, cy),
                self.capacity,
                self.max_depth,
                next,
            ),
            Self::child(
                Rect::new(self.bounds.x0, cy, cx, self.bounds.y1),
                self.capacity,
                self.max_depth,
                next,
            ),
            Self::child(
                Rect::new(cx, cy, self.bounds.x1, self.bounds.y1),
                self.capacity,
                self.max_depth,
                next,
            ),
        ]);

        let mut i = 0;
        while i < self.items.len() {
            let mut moved = false;
            for child in children.iter_mut() {
                if contains(&child.bounds, &self.items[i].0) {
                    let (rect, value) = self.items.swap_remove(i);
                    child.insert(rect, value);
                    moved = true;
                    break;
                }
            }
            if !moved {
                i += 1;
            }
        }

        self.children = Some(children);
    }

    /// Collect references to every payload whose AABB intersects `range`.
    ///
    /// Results are a candidate set: callers deduplicate by their own identity
    /// before merging with any non-indexed fallback list.
    pub fn query(&self, range: Rect) -> Vec<&T> {
        let mut out = Vec::new();
        self.query_into(&range, &mut out);
        out
    }

    fn query_into<'a>(&'a self, range: &Rect, out: &mut Vec<&'a T>) {
        if !intersects(&self.bounds, range) {
            return;
        }
        for (aabb, value) in &self.items {
            if intersects(aabb, range) {
                out.push(value);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_into(range, out);
            }
        }
    }

    /// Total number of stored items, including children.
    pub fn len(&self) -> usize {
        let mut n = self.items.len();
        if let Some(children) = &self.children {
            for child in children.iter() {
                n += child.len();
            }
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum depth reached by any node; used by tests.
    pub fn max_depth_reached(&self) -> usize {
        match &self.children {
            Some(children) => children
                .iter()
                .map(|c| c.max_depth_reached())
                .max()
                .unwrap_or(self.depth),
            None => self.depth,
        }
    }
}
