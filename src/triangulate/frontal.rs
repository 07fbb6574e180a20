//! Frontal point insertion.
//!
//! After construction every triangle inside the domain is scored as spatial
//! circumradius over local feature size. Triangles at or under the quality
//! threshold are accepted; the rest wait. The front is the set of unaccepted
//! triangles touching an accepted triangle, a constraint, or the boundary.
//! Each iteration takes the best-quality front triangle, proposes a new
//! point off its base edge sized by the feature field, snaps to an existing
//! point when one is close enough, and otherwise inserts and rescores.

use std::collections::{BTreeSet, HashMap, HashSet};

use claims::debug_assert_ok;
use log::{debug, info, warn};
use ordered_float::OrderedFloat;

use crate::data::{Status, SUPER_POINTS};
use crate::geom;
use crate::predicates;
use crate::triangulate::Triangulator;
use crate::{Error, SizeField, Surface};

type Key = (OrderedFloat<f64>, u32);

enum Placement {
  /// An existing point is close enough; nothing to insert.
  Snap,
  Insert([f64; 2]),
}

impl<'a, S: Surface> Triangulator<'a, S> {
  /// Advance the front until no triangle exceeds the quality threshold, or
  /// the insertion cap is hit ([`Error::Convergence`]; the partial mesh
  /// stays valid).
  pub fn frontal(&mut self, size: &impl SizeField) -> Result<(), Error> {
    let beta = self.opts.quality_threshold;
    let cap = self.opts.max_insertions.unwrap_or(100 * self.n_inputs);

    let handles: Vec<u32> = self.tris.handles().collect();
    for &h in &handles {
      self.score_triangle(h, size);
      self.tris.get_mut(h).status = Status::Waiting;
    }
    let mut active: BTreeSet<Key> = BTreeSet::new();
    for &h in &handles {
      if self.tris.get(h).quality <= beta {
        self.accept_triangle(h, &mut active, beta);
      }
    }
    for &h in &handles {
      if self.tris.is_live(h)
        && self.tris.get(h).status == Status::Waiting
        && self.front_edge(h).is_some()
      {
        self.activate(h, &mut active);
      }
    }

    let mut inserted = 0usize;
    while let Some((q, h)) = active.pop_first() {
      if !self.tris.is_live(h) {
        continue;
      }
      {
        // The key may be stale: the slot can have been recycled since.
        let t = self.tris.get(h);
        if t.status != Status::Active || OrderedFloat(t.quality) != q {
          continue;
        }
      }
      let Some(base) = self.front_edge(h) else {
        self.tris.get_mut(h).status = Status::Waiting;
        continue;
      };

      match self.propose_point(h, base, size) {
        Placement::Snap => self.accept_triangle(h, &mut active, beta),
        Placement::Insert(p) => {
          let enclosing = if self.on_any_constraint(p) {
            None
          } else {
            self.locate(p).filter(|&e| {
              let [a, b, c] = self.tris.get(e).verts;
              predicates::orient(self.uv(a), self.uv(b), p) > 0.0
                && predicates::orient(self.uv(b), self.uv(c), p) > 0.0
                && predicates::orient(self.uv(c), self.uv(a), p) > 0.0
            })
          };
          let Some(enclosing) = enclosing else {
            // Nowhere to put the point; the triangle stays as it is.
            self.accept_triangle(h, &mut active, beta);
            continue;
          };
          let (_, created) = self.insert_point(p, enclosing);
          inserted += 1;
          for &c in &created {
            self.score_triangle(c, size);
            self.tris.get_mut(c).status = Status::Waiting;
          }
          for &c in &created {
            self.classify_scored(c, &mut active, beta);
          }
          // A constraint can shield the picked triangle from the cavity;
          // requeue it so the next visit snaps and accepts.
          if self.tris.is_live(h) && self.tris.get(h).status == Status::Active {
            let quality = self.tris.get(h).quality;
            active.insert((OrderedFloat(quality), h));
          }
          if self.opts.smooth_every > 0 && inserted % self.opts.smooth_every == 0 {
            self.smooth_interior(size);
          }
          if self.opts.print_iter > 0 && inserted % self.opts.print_iter == 0 {
            if self.opts.print_level > 0 {
              info!(
                "frontal: {} points inserted, {} front entries",
                inserted,
                active.len()
              );
            } else {
              debug!(
                "frontal: {} points inserted, {} front entries",
                inserted,
                active.len()
              );
            }
          }
          if inserted >= cap {
            warn!(
              "frontal: insertion cap {} reached with {} front entries left",
              cap,
              active.len()
            );
            return Err(Error::Convergence(inserted));
          }
        }
      }
    }

    // Anything the front never reached cannot be improved further.
    let rest: Vec<u32> = self.tris.handles().collect();
    for h in rest {
      self.tris.get_mut(h).status = Status::Accepted;
    }
    debug_assert_ok!(self.check_invariants());
    Ok(())
  }

  /// Cache the spatial circumradius and the quality ratio. The radius is
  /// measured on the mapped vertex positions; the feature size is sampled
  /// at the surface point of the parametric centroid.
  fn score_triangle(&mut self, h: u32, size: &impl SizeField) {
    let [a, b, c] = self.tris.get(h).verts;
    let r3 = geom::circumradius3(self.xyz(a), self.xyz(b), self.xyz(c));
    let centroid = geom::centroid(self.uv(a), self.uv(b), self.uv(c));
    let hbar = size
      .feature_size(self.surface.eval_point(centroid))
      .max(f64::MIN_POSITIVE);
    let t = self.tris.get_mut(h);
    t.circumradius = r3;
    t.quality = r3 / hbar;
  }

  /// The base edge this triangle would advance from: a constraint or
  /// boundary edge first, otherwise an edge shared with an accepted
  /// triangle.
  fn front_edge(&self, h: u32) -> Option<(u32, u32)> {
    let t = self.tris.get(h);
    for (a, b) in t.edges() {
      if self.is_segment(a, b) || self.edges.get(b, a).is_none() {
        return Some((a, b));
      }
    }
    for (a, b) in t.edges() {
      if let Some(n) = self.edges.get(b, a) {
        if self.tris.get(n).status == Status::Accepted {
          return Some((a, b));
        }
      }
    }
    None
  }

  fn activate(&mut self, h: u32, active: &mut BTreeSet<Key>) {
    let t = self.tris.get_mut(h);
    t.status = Status::Active;
    active.insert((OrderedFloat(t.quality), h));
  }

  /// Accept a triangle and pull its waiting neighbors onto the front.
  fn accept_triangle(&mut self, h: u32, active: &mut BTreeSet<Key>, beta: f64) {
    self.tris.get_mut(h).status = Status::Accepted;
    let edges = self.tris.get(h).edges();
    for (a, b) in edges {
      if let Some(n) = self.edges.get(b, a) {
        let nt = self.tris.get(n);
        if nt.status == Status::Waiting && nt.quality > beta {
          self.activate(n, active);
        }
      }
    }
  }

  /// Route a freshly created, scored triangle into the status machine.
  fn classify_scored(&mut self, h: u32, active: &mut BTreeSet<Key>, beta: f64) {
    if !self.tris.is_live(h) || self.tris.get(h).status != Status::Waiting {
      return;
    }
    if self.tris.get(h).quality <= beta {
      self.accept_triangle(h, active, beta);
    } else if self.front_edge(h).is_some() {
      self.activate(h, active);
    }
  }

  /// Propose the next point off the base edge `(a, b)` of the active
  /// triangle `h`: start from the base midpoint along the inward
  /// perpendicular, aim for a spatial distance of the local feature size to
  /// both base endpoints, and stay strictly inside the triangle's
  /// circumcircle so the insertion cavity is guaranteed to swallow `h`.
  fn propose_point(&mut self, h: u32, base: (u32, u32), size: &impl SizeField) -> Placement {
    let (a, b) = base;
    let apex = self
      .tris
      .get(h)
      .apex(a, b)
      .expect("base edge belongs to its triangle");
    let pa = self.uv(a);
    let pb = self.uv(b);
    let m = [0.5 * (pa[0] + pb[0]), 0.5 * (pa[1] + pb[1])];
    let l_uv = geom::dist(pa, pb);
    // The triangle lies to the left of its directed edge.
    let n = [-(pb[1] - pa[1]) / l_uv, (pb[0] - pa[0]) / l_uv];

    let h_target = size
      .feature_size(self.surface.eval_point(m))
      .max(f64::MIN_POSITIVE);
    let l3 = geom::dist3(self.xyz(a), self.xyz(b));
    // Spatial rise that makes both new edges h_target long, pinched to
    // within a factor of two of the base's equilateral rise.
    let equilateral = 0.5 * 3f64.sqrt() * l3;
    let rise3 = (h_target * h_target - 0.25 * l3 * l3)
      .max(0.0)
      .sqrt()
      .clamp(0.5 * equilateral, 2.0 * equilateral);

    // Spatial length of one parameter unit along n at the midpoint.
    let (_, xu, xv) = self.surface.eval_deriv(m);
    let d3 = [
      xu[0] * n[0] + xv[0] * n[1],
      xu[1] * n[0] + xv[1] * n[1],
      xu[2] * n[0] + xv[2] * n[1],
    ];
    let scale = (d3[0] * d3[0] + d3[1] * d3[1] + d3[2] * d3[2]).sqrt();
    let mut t_par = if scale > 1e-30 {
      rise3 / scale
    } else {
      rise3 * l_uv / l3.max(1e-30)
    };

    if let Some((cc, _)) = geom::circumcircle(pa, pb, self.uv(apex)) {
      // Distance along the ray at which it exits the circumcircle.
      let dproj = n[0] * (cc[0] - m[0]) + n[1] * (cc[1] - m[1]);
      let t_hit = dproj + (dproj * dproj + 0.25 * l_uv * l_uv).sqrt();
      t_par = t_par.clamp(0.25 * t_hit, 0.95 * t_hit);
    }
    let p = [m[0] + t_par * n[0], m[1] + t_par * n[1]];

    // Snap: reuse the closest existing point when the proposal lands within
    // half the local feature size of it. The triangle's own corners do not
    // count; the tag pass excludes them without touching the tree.
    self.search_pass += 1;
    let pass = self.search_pass;
    for &corner in &[a, b, apex] {
      self.points.set_tag(corner, pass);
    }
    let xp = self.surface.eval_point(p);
    let points = &self.points;
    if let Some(near) = self.tree.nearest_where(p, |id| points.tag(id) != pass) {
      if geom::dist3(xp, points.xyz(near)) < 0.5 * h_target {
        return Placement::Snap;
      }
    }
    Placement::Insert(p)
  }

  /// Exactly collinear with and interior to some constraint segment?
  /// Inserting there would collapse a cavity wall, so such proposals are
  /// rejected.
  fn on_any_constraint(&self, p: [f64; 2]) -> bool {
    self.segments.iter().any(|&(a, b)| {
      predicates::orient(self.uv(a), self.uv(b), p) == 0.0
        && geom::strictly_between(p, self.uv(a), self.uv(b))
    })
  }

  /// One Laplacian pass over interior points whose entire star is accepted.
  /// A move is discarded unless every incident triangle stays
  /// counter-clockwise; applied moves update the surface position, the
  /// quadtree entry, and the cached qualities.
  fn smooth_interior(&mut self, size: &impl SizeField) {
    let mut star: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut pinned: HashSet<u32> = HashSet::new();
    for &(a, b) in &self.segments {
      pinned.insert(a);
      pinned.insert(b);
    }
    for h in self.tris.handles() {
      let t = self.tris.get(h);
      for (a, b) in t.edges() {
        if self.edges.get(b, a).is_none() {
          pinned.insert(a);
          pinned.insert(b);
        }
      }
      for &v in &t.verts {
        star.entry(v).or_default().push(h);
      }
    }

    for (&v, incident) in &star {
      if v < SUPER_POINTS || pinned.contains(&v) {
        continue;
      }
      if !incident
        .iter()
        .all(|&h| self.tris.get(h).status == Status::Accepted)
      {
        continue;
      }
      let mut ring: Vec<u32> = incident
        .iter()
        .flat_map(|&h| self.tris.get(h).verts)
        .filter(|&w| w != v)
        .collect();
      ring.sort_unstable();
      ring.dedup();
      if ring.len() < 3 {
        continue;
      }
      let mut target = [0.0, 0.0];
      for &w in &ring {
        let q = self.uv(w);
        target[0] += q[0];
        target[1] += q[1];
      }
      target[0] /= ring.len() as f64;
      target[1] /= ring.len() as f64;

      let keeps_orientation = incident.iter().all(|&h| {
        let vs = self.tris.get(h).verts;
        let at = |w: u32| if w == v { target } else { self.uv(w) };
        predicates::orient(at(vs[0]), at(vs[1]), at(vs[2])) > 0.0
      });
      if !keeps_orientation {
        continue;
      }
      let old = self.uv(v);
      self.tree.remove(v, old);
      self.tree.insert(v, target);
      let xyz = self.surface.eval_point(target);
      self.points.set_position(v, target, xyz);
      for &h in incident {
        self.score_triangle(h, size);
      }
    }
  }
}
