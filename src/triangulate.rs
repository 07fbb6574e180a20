//! The Delaunay / frontal kernel.
//!
//! A [`Triangulator`] owns the working mesh: the point store, the quadtree
//! index, the triangle list, and the directed-edge map. Construction seeds a
//! bounding triangulation from four corner points, inserts the input points
//! by incremental Delaunay, forces the constraint segments back into the
//! mesh, and classifies triangles against the constraint loops. The frontal
//! pass ([`Triangulator::frontal`], in `frontal.rs`) then inserts interior
//! points until every element meets the quality threshold.

mod frontal;
mod recover;
mod vtk;

use claims::debug_assert_ok;

use crate::data::{
  EdgeMap, PointStore, Quadtree, Rect, Status, Triangle, TriangleList, NIL, SUPER_POINTS,
};
use crate::geom;
use crate::predicates;
use crate::{Error, Surface};

/// Knobs for the frontal pass.
#[derive(Debug, Clone)]
pub struct Options {
  /// Quality threshold β: triangles with circumradius / feature-size at or
  /// below this are accepted as-is.
  pub quality_threshold: f64,
  /// Hard cap on frontal insertions; `None` means 100 × the input point
  /// count.
  pub max_insertions: Option<usize>,
  /// Run a Laplacian smoothing pass every this many insertions; 0 disables.
  pub smooth_every: usize,
  /// 0 keeps progress reporting at debug level; higher values promote it to
  /// info.
  pub print_level: u32,
  /// Report progress every this many insertions.
  pub print_iter: usize,
}

impl Default for Options {
  fn default() -> Options {
    Options {
      quality_threshold: 1.0,
      max_insertions: None,
      smooth_every: 0,
      print_level: 0,
      print_iter: 1000,
    }
  }
}

/// Coordinate space selector for [`Triangulator::write_vtk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSpace {
  /// Mapped spatial positions.
  Physical,
  /// Parameter positions with a zero third coordinate.
  Parametric,
}

/// Finished triangulation with densely renumbered points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
  pub params: Vec<[f64; 2]>,
  pub coords: Vec<[f64; 3]>,
  pub triangles: Vec<[u32; 3]>,
}

pub struct Triangulator<'a, S: Surface> {
  surface: &'a S,
  opts: Options,
  points: PointStore,
  tree: Quadtree,
  tris: TriangleList,
  edges: EdgeMap,
  /// Constraint pairs, stored as (min, max), sorted.
  segments: Vec<(u32, u32)>,
  holes: Vec<[f64; 2]>,
  bounds: Rect,
  n_inputs: usize,
  search_pass: u32,
  duplicate_tol: f64,
}

impl<'a, S: Surface> Triangulator<'a, S> {
  /// Build the constrained Delaunay triangulation of the input.
  ///
  /// `pts` are parameter-space positions; `segments` index into `pts` and
  /// must appear as edges of the result; `holes` are seed points whose
  /// surrounding region (up to constraint edges) is discarded. Input
  /// validation failures abort before any mesh exists.
  pub fn new(
    pts: &[[f64; 2]],
    segments: &[[usize; 2]],
    holes: &[[f64; 2]],
    surface: &'a S,
    opts: Options,
  ) -> Result<Triangulator<'a, S>, Error> {
    if pts.len() < 3 {
      return Err(Error::TooFewPoints);
    }
    for (i, s) in segments.iter().enumerate() {
      if s[0] >= pts.len() || s[1] >= pts.len() {
        return Err(Error::SegmentOutOfRange(i));
      }
      if s[0] == s[1] {
        return Err(Error::DegenerateSegment(i));
      }
    }
    for i in 0..segments.len() {
      for j in (i + 1)..segments.len() {
        if geom::segments_cross(
          pts[segments[i][0]],
          pts[segments[i][1]],
          pts[segments[j][0]],
          pts[segments[j][1]],
        ) {
          return Err(Error::CrossingSegments(i, j));
        }
      }
    }

    let bounds = Rect::around(pts).inflated(0.1);
    let mut segs: Vec<(u32, u32)> = segments
      .iter()
      .map(|s| {
        let a = s[0] as u32 + SUPER_POINTS;
        let b = s[1] as u32 + SUPER_POINTS;
        (a.min(b), a.max(b))
      })
      .collect();
    segs.sort_unstable();
    segs.dedup();

    let mut tri = Triangulator {
      surface,
      opts,
      points: PointStore::new(),
      tree: Quadtree::new(bounds),
      tris: TriangleList::new(),
      edges: EdgeMap::new(),
      segments: segs,
      holes: holes.to_vec(),
      bounds,
      n_inputs: pts.len(),
      search_pass: 0,
      duplicate_tol: bounds.diagonal() * 1e-10,
    };
    tri.init_bounding_box();
    for (i, &p) in pts.iter().enumerate() {
      tri.insert_input_point(p, i)?;
    }
    tri.recover_segments();
    debug_assert_ok!(tri.check_invariants());
    tri.classify();
    debug_assert_ok!(tri.check_invariants());
    Ok(tri)
  }

  pub fn point_count(&self) -> usize {
    self.points.len()
  }

  pub fn triangle_count(&self) -> usize {
    self.tris.len()
  }

  pub(crate) fn uv(&self, id: u32) -> [f64; 2] {
    self.points.uv(id)
  }

  pub(crate) fn xyz(&self, id: u32) -> [f64; 3] {
    self.points.xyz(id)
  }

  /// Four corner points far outside the domain and two triangles covering
  /// the whole working rectangle.
  fn init_bounding_box(&mut self) {
    let corners = [
      [self.bounds.min[0], self.bounds.min[1]],
      [self.bounds.max[0], self.bounds.min[1]],
      [self.bounds.max[0], self.bounds.max[1]],
      [self.bounds.min[0], self.bounds.max[1]],
    ];
    for c in corners {
      let xyz = self.surface.eval_point(c);
      self.points.push(c, xyz);
    }
    self.add_triangle([0, 1, 2]);
    self.add_triangle([0, 2, 3]);
  }

  fn insert_input_point(&mut self, p: [f64; 2], input_idx: usize) -> Result<u32, Error> {
    if let Some(q) = self.tree.nearest(p) {
      if geom::dist(self.points.uv(q), p) < self.duplicate_tol {
        return Err(Error::DuplicatePoint(
          input_idx,
          q.saturating_sub(SUPER_POINTS) as usize,
        ));
      }
    }
    let enclosing = self
      .locate(p)
      .expect("input point lies inside the inflated bounding box");
    let (id, _) = self.insert_point(p, enclosing);
    Ok(id)
  }

  /// Is `(a, b)` a constraint pair (in either direction)?
  pub(crate) fn is_segment(&self, a: u32, b: u32) -> bool {
    let key = (a.min(b), a.max(b));
    self.segments.binary_search(&key).is_ok()
  }

  fn add_segment_pair(&mut self, a: u32, b: u32) {
    let key = (a.min(b), a.max(b));
    if let Err(at) = self.segments.binary_search(&key) {
      self.segments.insert(at, key);
    }
  }

  fn remove_segment_pair(&mut self, a: u32, b: u32) {
    let key = (a.min(b), a.max(b));
    if let Ok(at) = self.segments.binary_search(&key) {
      self.segments.remove(at);
    }
  }

  /// Create a triangle and register its three directed edges. The vertex
  /// triple must already be counter-clockwise; a duplicate directed edge is
  /// a topology bug and aborts.
  pub(crate) fn add_triangle(&mut self, verts: [u32; 3]) -> u32 {
    assert!(
      predicates::orient(self.uv(verts[0]), self.uv(verts[1]), self.uv(verts[2])) > 0.0,
      "new triangle {:?} is not counter-clockwise",
      verts
    );
    let h = self.tris.add(Triangle::new(verts));
    let t = self.tris.get(h).clone();
    for (a, b) in t.edges() {
      assert!(
        self.edges.insert(a, b, h),
        "directed edge ({}, {}) already present",
        a,
        b
      );
    }
    for &v in &verts {
      self.points.set_hint(v, h);
    }
    h
  }

  /// Unlink a triangle and drop its three directed edges.
  pub(crate) fn delete_triangle(&mut self, h: u32) -> Triangle {
    let t = self.tris.remove(h);
    for (a, b) in t.edges() {
      let owner = self.edges.remove(a, b);
      assert_eq!(
        owner,
        Some(h),
        "edge map out of sync at directed edge ({}, {})",
        a,
        b
      );
    }
    t
  }

  /// Incremental Delaunay insertion. `enclosing` must be a live triangle
  /// containing `p` (up to tolerance). Returns the new point id and the
  /// triangles created around it.
  pub(crate) fn insert_point(&mut self, p: [f64; 2], enclosing: u32) -> (u32, Vec<u32>) {
    let xyz = self.surface.eval_point(p);
    let x = self.points.push(p, xyz);
    self.tree.insert(x, p);

    let seed = self.delete_triangle(enclosing);
    let [u, v, w] = seed.verts;
    let mut stack = vec![(u, v), (v, w), (w, u)];
    let mut created = Vec::new();

    // Grow the cavity until every wall either resists the in-circle test,
    // is a constraint, or is the mesh boundary; then wall it off with fans
    // around x. A wall that turned concave (possible once smoothing has
    // nudged the mesh off the Delaunay optimum) is swallowed as well to keep
    // the cavity star-shaped around x.
    while let Some((a, b)) = stack.pop() {
      let wall = self.is_segment(a, b);
      let across = if wall { None } else { self.edges.get(b, a) };
      match across {
        None => {
          created.push(self.add_triangle([a, b, x]));
        }
        Some(h) => {
          let t = self.tris.get(h);
          let c = t
            .apex(b, a)
            .expect("edge map points at a triangle missing the edge");
          let deep = predicates::in_circle(self.uv(b), self.uv(a), self.uv(c), p) > 0.0
            || predicates::orient(self.uv(a), self.uv(b), p) <= 0.0;
          if deep {
            self.delete_triangle(h);
            stack.push((a, c));
            stack.push((c, b));
          } else {
            created.push(self.add_triangle([a, b, x]));
          }
        }
      }
    }
    (x, created)
  }

  /// Find a live triangle containing `p`: seed from the hint of the nearest
  /// stored point, then walk across the edge whose outward half-plane holds
  /// `p`. Falls back to a tolerant linear scan when the walk runs long or
  /// leaves the mesh.
  pub(crate) fn locate(&self, p: [f64; 2]) -> Option<u32> {
    let seed = self
      .tree
      .nearest(p)
      .map(|q| self.points.hint(q))
      .filter(|&h| h != NIL && self.tris.is_live(h))
      .or_else(|| self.tris.handles().next())?;
    let limit = 4 * self.points.len().max(4);
    let mut cur = seed;
    'walk: for _ in 0..limit {
      let t = self.tris.get(cur);
      for (a, b) in t.edges() {
        if predicates::orient(self.uv(a), self.uv(b), p) < 0.0 {
          match self.edges.get(b, a) {
            Some(next) => {
              cur = next;
              continue 'walk;
            }
            None => return self.locate_by_scan(p),
          }
        }
      }
      return Some(cur);
    }
    self.locate_by_scan(p)
  }

  /// O(n) fallback: tolerant enclosure test, nearest centroid breaks ties.
  fn locate_by_scan(&self, p: [f64; 2]) -> Option<u32> {
    let mut best: Option<(f64, u32)> = None;
    for h in self.tris.handles() {
      let [a, b, c] = self.tris.get(h).verts;
      let (pa, pb, pc) = (self.uv(a), self.uv(b), self.uv(c));
      if !geom::enclosed(p, pa, pb, pc) {
        continue;
      }
      let d = geom::dist2(geom::centroid(pa, pb, pc), p);
      if best.map_or(true, |(bd, _)| d < bd) {
        best = Some((d, h));
      }
    }
    best.map(|(_, h)| h)
  }

  /// Mark and sweep everything outside the domain: triangles touching the
  /// corner points, triangles whose centroid fails the odd-crossing test
  /// against the constraint set, and triangles reachable from a hole seed
  /// without crossing a constraint.
  fn classify(&mut self) {
    let holes = self.holes.clone();
    for seed in holes {
      if let Some(h) = self.locate(seed) {
        self.flood_dead(h);
      }
    }
    let handles: Vec<u32> = self.tris.handles().collect();
    let outside = self.outside_point();
    for &h in &handles {
      let t = self.tris.get(h);
      if t.status == Status::Dead {
        continue;
      }
      if t.is_super() {
        self.tris.get_mut(h).status = Status::Dead;
        continue;
      }
      let [a, b, c] = t.verts;
      let centroid = geom::centroid(self.uv(a), self.uv(b), self.uv(c));
      if !self.odd_crossings(centroid, outside) {
        self.tris.get_mut(h).status = Status::Dead;
      }
    }
    for h in handles {
      if self.tris.is_live(h) && self.tris.get(h).status == Status::Dead {
        self.delete_triangle(h);
      }
    }
  }

  /// Spread Dead from `seed` across every non-constraint edge.
  fn flood_dead(&mut self, seed: u32) {
    let mut stack = vec![seed];
    while let Some(h) = stack.pop() {
      if !self.tris.is_live(h) || self.tris.get(h).status == Status::Dead {
        continue;
      }
      self.tris.get_mut(h).status = Status::Dead;
      let edges = self.tris.get(h).edges();
      for (a, b) in edges {
        if self.is_segment(a, b) {
          continue;
        }
        if let Some(n) = self.edges.get(b, a) {
          stack.push(n);
        }
      }
    }
  }

  /// A fixed reference point outside every constraint loop. The off-axis
  /// offsets keep the test ray clear of constraint endpoints.
  fn outside_point(&self) -> [f64; 2] {
    [
      self.bounds.min[0] - 0.5773 * self.bounds.width(),
      self.bounds.min[1] - 0.3141 * self.bounds.height(),
    ]
  }

  /// Odd-crossing (inside) test for `p` along the ray to `outside`.
  fn odd_crossings(&self, p: [f64; 2], outside: [f64; 2]) -> bool {
    let mut crossings = 0usize;
    for &(a, b) in &self.segments {
      if geom::segments_cross(p, outside, self.uv(a), self.uv(b)) {
        crossings += 1;
      }
    }
    crossings % 2 == 1
  }

  /// Merge declared-degenerate vertex pairs (indices into the input point
  /// list): every reference to the higher id is rewritten to the lower and
  /// triangles that collapse to a line disappear. Intended to run after
  /// [`Triangulator::frontal`] for surfaces whose parameterization glues
  /// distinct parameter points onto one spatial point.
  pub fn remove_degenerate_edges(&mut self, pairs: &[[usize; 2]]) {
    for pr in pairs {
      let a = pr[0] as u32 + SUPER_POINTS;
      let b = pr[1] as u32 + SUPER_POINTS;
      let (lo, hi) = (a.min(b), a.max(b));
      if lo == hi {
        continue;
      }
      // Two phases so the corridor of edges around `hi` is fully unhooked
      // before any rewritten triangle re-registers its edges.
      let affected: Vec<u32> = self
        .tris
        .handles()
        .filter(|&h| self.tris.get(h).contains(hi))
        .collect();
      let mut rewritten = Vec::new();
      for h in affected {
        let t = self.delete_triangle(h);
        let verts: Vec<u32> = t
          .verts
          .iter()
          .map(|&v| if v == hi { lo } else { v })
          .collect();
        let verts = [verts[0], verts[1], verts[2]];
        let distinct = verts[0] != verts[1] && verts[1] != verts[2] && verts[2] != verts[0];
        if distinct
          && predicates::orient(self.uv(verts[0]), self.uv(verts[1]), self.uv(verts[2])) > 0.0
        {
          rewritten.push((verts, t.status));
        }
      }
      for (verts, status) in rewritten {
        let h = self.add_triangle(verts);
        self.tris.get_mut(h).status = status;
      }
      self.tree.remove(hi, self.points.uv(hi));
      // Rewrite the constraint set the same way.
      let mut segs: Vec<(u32, u32)> = self
        .segments
        .iter()
        .filter_map(|&(x, y)| {
          let x = if x == hi { lo } else { x };
          let y = if y == hi { lo } else { y };
          if x == y {
            None
          } else {
            Some((x.min(y), x.max(y)))
          }
        })
        .collect();
      segs.sort_unstable();
      segs.dedup();
      self.segments = segs;
    }
    debug_assert_ok!(self.check_invariants());
  }

  /// The accepted triangulation with points renumbered densely in order of
  /// first use. Corner points and swept triangles never appear.
  pub fn mesh(&self) -> Mesh {
    let mut ids = vec![NIL; self.points.len()];
    let mut mesh = Mesh::default();
    for h in self.tris.handles() {
      let t = self.tris.get(h);
      if t.status == Status::Dead || t.is_super() {
        continue;
      }
      let mut tri = [0u32; 3];
      for (k, &v) in t.verts.iter().enumerate() {
        if ids[v as usize] == NIL {
          ids[v as usize] = mesh.params.len() as u32;
          mesh.params.push(self.points.uv(v));
          mesh.coords.push(self.points.xyz(v));
        }
        tri[k] = ids[v as usize];
      }
      mesh.triangles.push(tri);
    }
    mesh
  }

  /// Full structural audit; used at checkpoints and by the tests.
  pub(crate) fn check_invariants(&self) -> Result<(), String> {
    let mut edge_count = 0usize;
    for h in self.tris.handles() {
      let t = self.tris.get(h);
      for &v in &t.verts {
        if v as usize >= self.points.len() {
          return Err(format!("triangle {:?} references unknown point {}", t.verts, v));
        }
      }
      let [a, b, c] = t.verts;
      if predicates::orient(self.uv(a), self.uv(b), self.uv(c)) <= 0.0 {
        return Err(format!("triangle {:?} is not counter-clockwise", t.verts));
      }
      for (x, y) in t.edges() {
        edge_count += 1;
        if self.edges.get(x, y) != Some(h) {
          return Err(format!("directed edge ({}, {}) not mapped to its triangle", x, y));
        }
      }
    }
    if self.edges.len() != edge_count {
      return Err(format!(
        "edge map holds {} entries for {} triangle edges",
        self.edges.len(),
        edge_count
      ));
    }
    for ((x, y), h) in self.edges.iter() {
      if !self.tris.is_live(h) {
        return Err(format!("edge ({}, {}) maps to a dead triangle", x, y));
      }
      if self.tris.get(h).apex(x, y).is_none() {
        return Err(format!("edge ({}, {}) maps to a triangle without it", x, y));
      }
    }
    // Every referenced mesh point is indexed, and no two indexed points
    // coincide.
    for h in self.tris.handles() {
      for &v in &self.tris.get(h).verts {
        if v >= SUPER_POINTS && !self.tree.contains(v, self.points.uv(v)) {
          return Err(format!("point {} missing from the quadtree", v));
        }
      }
    }
    for id in SUPER_POINTS..self.points.len() as u32 {
      let p = self.points.uv(id);
      if !self.tree.contains(id, p) {
        continue;
      }
      if let Some(other) = self.tree.nearest_where(p, |o| o != id) {
        if geom::dist(p, self.points.uv(other)) < self.duplicate_tol {
          return Err(format!("points {} and {} coincide", id, other));
        }
      }
    }
    for &(a, b) in &self.segments {
      if self.edges.get(a, b).is_none() && self.edges.get(b, a).is_none() {
        return Err(format!("constraint ({}, {}) is not a mesh edge", a, b));
      }
    }
    Ok(())
  }
}
