//! Constraint segment recovery.
//!
//! After incremental insertion some constraint pairs may not be present as
//! mesh edges. For each missing pair the corridor of triangles crossed by
//! the straight segment is deleted, and the two resulting cavity sides are
//! re-triangulated by gift-wrapping with the in-circle candidate rule.
//! A vertex lying exactly on the constraint between its endpoints splits the
//! constraint in two at that vertex; vertices exactly on the constraint line
//! but outside the segment span are tie-broken onto one side, so collinear
//! configurations never abort the walk.

use log::warn;

use crate::geom;
use crate::predicates;
use crate::triangulate::Triangulator;
use crate::Surface;

enum Entry {
  /// The segment passes exactly through this star vertex.
  Through(u32),
  /// The corridor starts at this triangle; the segment leaves through the
  /// edge running from the right-side vertex to the left-side one.
  Corridor(u32, u32, u32),
}

impl<'a, S: Surface> Triangulator<'a, S> {
  pub(crate) fn recover_segments(&mut self) {
    let pairs = self.segments.clone();
    for (a, b) in pairs {
      if self.edges.get(a, b).is_none() && self.edges.get(b, a).is_none() {
        self.recover_segment(a, b);
      }
    }
  }

  /// Force the edge `(u, v)` into the mesh.
  pub(crate) fn recover_segment(&mut self, u: u32, v: u32) {
    if self.edges.get(u, v).is_some() || self.edges.get(v, u).is_some() {
      return;
    }
    let pu = self.uv(u);
    let pv = self.uv(v);

    // How does the segment leave the star of u: through the interior of an
    // opposite edge, or exactly through a star vertex? In a CCW triangle
    // (u, a, b) the wedge at u contains the direction to v exactly when a
    // is strictly right of u->v and b strictly left.
    let mut entry = None;
    for h in self.tris.handles() {
      let t = self.tris.get(h);
      let Some(k) = t.verts.iter().position(|&x| x == u) else {
        continue;
      };
      let a = t.verts[(k + 1) % 3];
      let b = t.verts[(k + 2) % 3];
      let oa = predicates::orient(pu, pv, self.uv(a));
      let ob = predicates::orient(pu, pv, self.uv(b));
      if oa == 0.0 && geom::strictly_between(self.uv(a), pu, pv) {
        entry = Some(Entry::Through(a));
        break;
      }
      if ob == 0.0 && geom::strictly_between(self.uv(b), pu, pv) {
        entry = Some(Entry::Through(b));
        break;
      }
      if oa < 0.0 && ob > 0.0 && geom::segments_cross(pu, pv, self.uv(a), self.uv(b)) {
        entry = Some(Entry::Corridor(h, a, b));
        break;
      }
    }
    let (h0, mut r, mut l) = match entry {
      Some(Entry::Through(mid)) => {
        self.split_constraint(u, mid, v);
        return;
      }
      Some(Entry::Corridor(h, a, b)) => (h, a, b),
      None => {
        warn!(
          "constraint ({}, {}) found no exit from the star of its start; dropping it",
          u, v
        );
        self.remove_segment_pair(u, v);
        return;
      }
    };

    let mut right_chain = vec![r];
    let mut left_chain = vec![l];
    self.delete_triangle(h0);

    // Each crossed triangle owns the directed edge (r, l); the next one
    // owns its reverse. Walk until the apex is v, sorting apexes onto the
    // side of the segment they fall on.
    loop {
      let h = self
        .edges
        .get(l, r)
        .expect("constraint corridor left the mesh");
      let t = self.delete_triangle(h);
      let c = t
        .apex(l, r)
        .expect("edge map points at a triangle missing the edge");
      if c == v {
        break;
      }
      let o = predicates::orient(pu, pv, self.uv(c));
      if o == 0.0 && geom::strictly_between(self.uv(c), pu, pv) {
        // Close the cavity at c and recover the remainder separately.
        self.wrap_both_sides(u, c, &left_chain, &right_chain);
        self.split_constraint(u, c, v);
        return;
      }
      if o > 0.0 {
        left_chain.push(c);
        l = c;
      } else {
        // An apex exactly on the constraint line but outside the segment
        // span counts as lying to the right.
        right_chain.push(c);
        r = c;
      }
    }

    self.wrap_both_sides(u, v, &left_chain, &right_chain);
  }

  fn wrap_both_sides(&mut self, from: u32, to: u32, left: &[u32], right: &[u32]) {
    self.wrap_cavity(from, to, left);
    let reversed: Vec<u32> = right.iter().rev().copied().collect();
    self.wrap_cavity(to, from, &reversed);
  }

  /// Replace the constraint `(u, v)` by `(u, mid)` and `(mid, v)` and
  /// recover both.
  fn split_constraint(&mut self, u: u32, mid: u32, v: u32) {
    self.remove_segment_pair(u, v);
    self.add_segment_pair(u, mid);
    self.add_segment_pair(mid, v);
    self.recover_segment(u, mid);
    self.recover_segment(mid, v);
  }

  /// Gift-wrap one side of an emptied corridor. `chain` holds the cavity
  /// vertices to the left of the directed base `(a, b)`, ordered from the
  /// `a` end to the `b` end. Picks the chain vertex whose circumcircle with
  /// the base excludes all the others, emits that triangle, and recurses
  /// into the two sub-cavities. Vertices exactly on the base line never
  /// become an apex; a chain with no usable apex is dropped rather than
  /// producing a degenerate triangle.
  fn wrap_cavity(&mut self, a: u32, b: u32, chain: &[u32]) {
    if chain.is_empty() {
      return;
    }
    let pa = self.uv(a);
    let pb = self.uv(b);
    let mut best: Option<usize> = None;
    for i in 0..chain.len() {
      if predicates::orient(pa, pb, self.uv(chain[i])) <= 0.0 {
        continue;
      }
      best = match best {
        None => Some(i),
        Some(j) => {
          if predicates::in_circle(pa, pb, self.uv(chain[j]), self.uv(chain[i])) > 0.0 {
            Some(i)
          } else {
            Some(j)
          }
        }
      };
    }
    let Some(best) = best else {
      warn!(
        "cavity side along edge ({}, {}) is degenerate; {} vertices dropped",
        a,
        b,
        chain.len()
      );
      return;
    };
    let c = chain[best];
    self.wrap_cavity(a, c, &chain[..best]);
    self.wrap_cavity(c, b, &chain[best + 1..]);
    self.add_triangle([a, b, c]);
  }
}
