//! Point-region quadtree over a fixed rectangle.
//!
//! Leaves hold up to [`BUCKET_CAPACITY`] entries and split at the rectangle
//! midpoint on overflow; past [`MAX_DEPTH`] buckets simply grow. Removal
//! never coalesces siblings. Entries carry their coordinates so queries do
//! not need the point store.

use crate::data::NIL;
use crate::geom;

pub const BUCKET_CAPACITY: usize = 10;
pub const MAX_DEPTH: u32 = 30;

/// Axis-aligned rectangle, also the query volume for pruning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
  pub min: [f64; 2],
  pub max: [f64; 2],
}

impl Rect {
  pub fn new(min: [f64; 2], max: [f64; 2]) -> Rect {
    Rect { min, max }
  }

  /// Smallest rectangle covering all points. Panics on an empty slice.
  pub fn around(pts: &[[f64; 2]]) -> Rect {
    let mut min = pts[0];
    let mut max = pts[0];
    for p in &pts[1..] {
      min[0] = min[0].min(p[0]);
      min[1] = min[1].min(p[1]);
      max[0] = max[0].max(p[0]);
      max[1] = max[1].max(p[1]);
    }
    Rect { min, max }
  }

  /// Grow by `frac` of the extent on every side. Degenerate extents are
  /// widened by the larger dimension (or unity) so the result always has
  /// positive area.
  pub fn inflated(&self, frac: f64) -> Rect {
    let w = self.max[0] - self.min[0];
    let h = self.max[1] - self.min[1];
    let fallback = w.max(h).max(1.0);
    let dx = if w > 0.0 { w * frac } else { fallback * frac };
    let dy = if h > 0.0 { h * frac } else { fallback * frac };
    Rect {
      min: [self.min[0] - dx, self.min[1] - dy],
      max: [self.max[0] + dx, self.max[1] + dy],
    }
  }

  pub fn width(&self) -> f64 {
    self.max[0] - self.min[0]
  }

  pub fn height(&self) -> f64 {
    self.max[1] - self.min[1]
  }

  pub fn diagonal(&self) -> f64 {
    self.width().hypot(self.height())
  }

  pub fn contains(&self, p: [f64; 2]) -> bool {
    p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
  }

  fn center(&self) -> [f64; 2] {
    [
      0.5 * (self.min[0] + self.max[0]),
      0.5 * (self.min[1] + self.max[1]),
    ]
  }

  /// Quadrant index: bit 0 set for the east half, bit 1 for the north half.
  fn quadrant_of(&self, p: [f64; 2]) -> usize {
    let c = self.center();
    (p[0] >= c[0]) as usize | (((p[1] >= c[1]) as usize) << 1)
  }

  fn quadrant(&self, q: usize) -> Rect {
    let c = self.center();
    let min = [
      if q & 1 == 0 { self.min[0] } else { c[0] },
      if q & 2 == 0 { self.min[1] } else { c[1] },
    ];
    let max = [
      if q & 1 == 0 { c[0] } else { self.max[0] },
      if q & 2 == 0 { c[1] } else { self.max[1] },
    ];
    Rect { min, max }
  }

  /// Squared distance from `p` to this rectangle; zero inside.
  fn dist2(&self, p: [f64; 2]) -> f64 {
    let dx = (self.min[0] - p[0]).max(0.0).max(p[0] - self.max[0]);
    let dy = (self.min[1] - p[1]).max(0.0).max(p[1] - self.max[1]);
    dx * dx + dy * dy
  }
}

#[derive(Debug, Clone)]
struct Node {
  /// Index of the first of four consecutive children, or NIL for a leaf.
  children: u32,
  bucket: Vec<(u32, [f64; 2])>,
}

impl Node {
  fn leaf() -> Node {
    Node {
      children: NIL,
      bucket: Vec::new(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Quadtree {
  bounds: Rect,
  nodes: Vec<Node>,
  len: usize,
}

impl Quadtree {
  pub fn new(bounds: Rect) -> Quadtree {
    Quadtree {
      bounds,
      nodes: vec![Node::leaf()],
      len: 0,
    }
  }

  pub fn bounds(&self) -> Rect {
    self.bounds
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn insert(&mut self, id: u32, p: [f64; 2]) {
    debug_assert!(self.bounds.contains(p), "point outside quadtree bounds");
    self.insert_at(0, self.bounds, 0, id, p);
    self.len += 1;
  }

  fn insert_at(&mut self, node: u32, rect: Rect, depth: u32, id: u32, p: [f64; 2]) {
    let n = node as usize;
    if self.nodes[n].children != NIL {
      let q = rect.quadrant_of(p);
      let child = self.nodes[n].children + q as u32;
      return self.insert_at(child, rect.quadrant(q), depth + 1, id, p);
    }
    if self.nodes[n].bucket.len() < BUCKET_CAPACITY || depth >= MAX_DEPTH {
      self.nodes[n].bucket.push((id, p));
      return;
    }
    // Split: hand the bucket down and retry.
    let first = self.nodes.len() as u32;
    for _ in 0..4 {
      self.nodes.push(Node::leaf());
    }
    self.nodes[n].children = first;
    let spill = std::mem::take(&mut self.nodes[n].bucket);
    for (sid, sp) in spill {
      let q = rect.quadrant_of(sp);
      self.insert_at(first + q as u32, rect.quadrant(q), depth + 1, sid, sp);
    }
    self.insert_at(node, rect, depth, id, p)
  }

  /// Remove an entry by id and position. Returns whether it was present.
  /// Siblings are never merged back.
  pub fn remove(&mut self, id: u32, p: [f64; 2]) -> bool {
    let mut node = 0u32;
    let mut rect = self.bounds;
    loop {
      let n = node as usize;
      if self.nodes[n].children == NIL {
        let bucket = &mut self.nodes[n].bucket;
        match bucket.iter().position(|&(i, _)| i == id) {
          Some(at) => {
            bucket.swap_remove(at);
            self.len -= 1;
            return true;
          }
          None => return false,
        }
      }
      let q = rect.quadrant_of(p);
      node = self.nodes[n].children + q as u32;
      rect = rect.quadrant(q);
    }
  }

  /// Is `(id, p)` stored in the leaf that covers `p`?
  pub fn contains(&self, id: u32, p: [f64; 2]) -> bool {
    let mut node = 0u32;
    let mut rect = self.bounds;
    loop {
      let n = node as usize;
      if self.nodes[n].children == NIL {
        return self.nodes[n].bucket.iter().any(|&(i, _)| i == id);
      }
      let q = rect.quadrant_of(p);
      node = self.nodes[n].children + q as u32;
      rect = rect.quadrant(q);
    }
  }

  /// Id of the stored point closest to `p`.
  pub fn nearest(&self, p: [f64; 2]) -> Option<u32> {
    self.nearest_where(p, |_| true)
  }

  /// Id of the closest stored point accepted by the predicate. Best-first
  /// descent, pruning any quadrant farther than the current best.
  pub fn nearest_where<F>(&self, p: [f64; 2], accept: F) -> Option<u32>
  where
    F: Fn(u32) -> bool,
  {
    let mut best = (f64::INFINITY, NIL);
    self.search(0, self.bounds, p, &accept, &mut best);
    if best.1 == NIL {
      None
    } else {
      Some(best.1)
    }
  }

  fn search<F>(&self, node: u32, rect: Rect, p: [f64; 2], accept: &F, best: &mut (f64, u32))
  where
    F: Fn(u32) -> bool,
  {
    if rect.dist2(p) >= best.0 {
      return;
    }
    let n = &self.nodes[node as usize];
    for &(id, q) in &n.bucket {
      let d = geom::dist2(p, q);
      if d < best.0 && accept(id) {
        *best = (d, id);
      }
    }
    if n.children == NIL {
      return;
    }
    let mut order = [0usize, 1, 2, 3];
    let dists = [
      rect.quadrant(0).dist2(p),
      rect.quadrant(1).dist2(p),
      rect.quadrant(2).dist2(p),
      rect.quadrant(3).dist2(p),
    ];
    order.sort_by(|&a, &b| dists[a].total_cmp(&dists[b]));
    for q in order {
      self.search(n.children + q as u32, rect.quadrant(q), p, accept, best);
    }
  }
}
