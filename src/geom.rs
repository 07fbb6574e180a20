//! Derived geometric quantities. Unlike `predicates`, nothing here needs an
//! exact sign; results feed size heuristics and tolerant point location.

use crate::predicates::orient;

pub fn dist2(p: [f64; 2], q: [f64; 2]) -> f64 {
  let dx = p[0] - q[0];
  let dy = p[1] - q[1];
  dx * dx + dy * dy
}

pub fn dist(p: [f64; 2], q: [f64; 2]) -> f64 {
  dist2(p, q).sqrt()
}

pub fn dist3(p: [f64; 3], q: [f64; 3]) -> f64 {
  let dx = p[0] - q[0];
  let dy = p[1] - q[1];
  let dz = p[2] - q[2];
  (dx * dx + dy * dy + dz * dz).sqrt()
}

pub fn centroid(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> [f64; 2] {
  [(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0]
}

/// Circumcenter and circumradius in the parameter plane. `None` when the
/// points are (nearly) collinear.
pub fn circumcircle(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Option<([f64; 2], f64)> {
  let bx = b[0] - a[0];
  let by = b[1] - a[1];
  let cx = c[0] - a[0];
  let cy = c[1] - a[1];
  let d = 2.0 * (bx * cy - by * cx);
  if d == 0.0 || !d.is_finite() {
    return None;
  }
  let b2 = bx * bx + by * by;
  let c2 = cx * cx + cy * cy;
  let ux = (cy * b2 - by * c2) / d;
  let uy = (bx * c2 - cx * b2) / d;
  let center = [a[0] + ux, a[1] + uy];
  Some((center, (ux * ux + uy * uy).sqrt()))
}

/// Circumradius of the spatial triangle `abc`. Degenerate (collinear or
/// coincident) triangles report an infinite radius so their quality sorts
/// last.
pub fn circumradius3(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> f64 {
  let la = dist3(b, c);
  let lb = dist3(c, a);
  let lc = dist3(a, b);
  let ux = b[0] - a[0];
  let uy = b[1] - a[1];
  let uz = b[2] - a[2];
  let vx = c[0] - a[0];
  let vy = c[1] - a[1];
  let vz = c[2] - a[2];
  let nx = uy * vz - uz * vy;
  let ny = uz * vx - ux * vz;
  let nz = ux * vy - uy * vx;
  let area2 = (nx * nx + ny * ny + nz * nz).sqrt();
  if area2 <= 0.0 || !area2.is_finite() {
    return f64::INFINITY;
  }
  la * lb * lc / (2.0 * area2)
}

/// Do the open segments `p1q1` and `p2q2` properly cross? Touching at an
/// endpoint or overlapping collinearly does not count.
pub fn segments_cross(p1: [f64; 2], q1: [f64; 2], p2: [f64; 2], q2: [f64; 2]) -> bool {
  fn opposite(x: f64, y: f64) -> bool {
    (x > 0.0 && y < 0.0) || (x < 0.0 && y > 0.0)
  }
  let o1 = orient(p1, q1, p2);
  let o2 = orient(p1, q1, q2);
  let o3 = orient(p2, q2, p1);
  let o4 = orient(p2, q2, q1);
  opposite(o1, o2) && opposite(o3, o4)
}

/// Does `p` lie strictly between `a` and `b` on the segment `ab`? Assumes the
/// three points are already known to be collinear.
pub fn strictly_between(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> bool {
  let t = (p[0] - a[0]) * (b[0] - a[0]) + (p[1] - a[1]) * (b[1] - a[1]);
  t > 0.0 && t < dist2(a, b)
}

/// Tolerant point-in-triangle test: the three signed areas may dip slightly
/// negative, with the slack scaled by the triangle's own area.
pub fn enclosed(p: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> bool {
  let area = orient(a, b, c);
  let tol = -1e-12 * area.abs();
  orient(a, b, p) >= tol && orient(b, c, p) >= tol && orient(c, a, p) >= tol
}
