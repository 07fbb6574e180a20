//! Robust geometric predicates.
//!
//! All topological decisions in the kernel go through the two adaptive
//! predicates here; derived metric quantities (circumcenters, distances)
//! live in `geom` and are allowed to be inexact.

use geometry_predicates::{incircle, orient2d};

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone)]
pub enum Orientation {
  CounterClockWise,
  ClockWise,
  CoLinear,
}
use Orientation::*;

impl Orientation {
  pub fn new(p: [f64; 2], q: [f64; 2], r: [f64; 2]) -> Orientation {
    let d = orient2d(p, q, r);
    if d > 0.0 {
      CounterClockWise
    } else if d < 0.0 {
      ClockWise
    } else {
      CoLinear
    }
  }

  pub fn is_ccw(p: [f64; 2], q: [f64; 2], r: [f64; 2]) -> bool {
    Orientation::new(p, q, r) == CounterClockWise
  }

  pub fn reverse(self) -> Orientation {
    match self {
      CounterClockWise => ClockWise,
      ClockWise => CounterClockWise,
      CoLinear => CoLinear,
    }
  }
}

/// Signed doubled area of the triangle `pqr`; positive when `pqr` turns
/// counter-clockwise. Exact sign.
pub fn orient(p: [f64; 2], q: [f64; 2], r: [f64; 2]) -> f64 {
  orient2d(p, q, r)
}

/// Positive when `d` lies strictly inside the circle through `a`, `b`, `c`
/// (given counter-clockwise). Exact sign. Exactly cocircular quadruples land
/// on the non-positive side, which keeps cavity walks finite and picks one of
/// the two symmetric diagonals deterministically.
pub fn in_circle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
  incircle(a, b, c, d)
}
