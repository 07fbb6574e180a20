//! Frontal-Delaunay triangulation of a planar straight-line graph embedded
//! in the parameter domain of a surface.
//!
//! The input is a set of boundary points, constraint segments between them,
//! and optional hole seeds, all expressed in `(u, v)` parameter coordinates.
//! The output is a conforming triangulation whose element sizes follow a
//! caller-supplied feature-size field and whose interior elements satisfy a
//! circumradius-over-size quality bound.
//!
//! ```no_run
//! use frontmesh::{Options, OutputSpace, Plane, Triangulator, UniformSize};
//!
//! let pts = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
//! let segs = [[0, 1], [1, 2], [2, 3], [3, 0]];
//! let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, Options::default()).unwrap();
//! tri.frontal(&UniformSize(0.2)).unwrap();
//! let mesh = tri.mesh();
//! tri.write_vtk("square.vtk", OutputSpace::Physical).unwrap();
//! # let _ = mesh;
//! ```

use std::fmt;

pub mod data;
mod geom;
pub mod predicates;
mod triangulate;

pub use predicates::Orientation;
pub use triangulate::{Mesh, Options, OutputSpace, Triangulator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
  /// Fewer than three input points.
  TooFewPoints,
  /// Two input points coincide within the duplicate tolerance.
  DuplicatePoint(usize, usize),
  /// A segment endpoint is not a valid input point index.
  SegmentOutOfRange(usize),
  /// A segment joins a point to itself.
  DegenerateSegment(usize),
  /// Two constraint segments properly cross each other.
  CrossingSegments(usize, usize),
  /// The frontal loop gave up after this many insertions. The partial mesh
  /// is still available through [`Triangulator::mesh`].
  Convergence(usize),
}

impl fmt::Display for Error {
  fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      Error::TooFewPoints => write!(fmt, "at least three input points are required"),
      Error::DuplicatePoint(i, j) => write!(fmt, "input points {} and {} coincide", i, j),
      Error::SegmentOutOfRange(i) => write!(fmt, "segment {} references a missing point", i),
      Error::DegenerateSegment(i) => write!(fmt, "segment {} joins a point to itself", i),
      Error::CrossingSegments(i, j) => write!(fmt, "segments {} and {} cross", i, j),
      Error::Convergence(n) => write!(fmt, "frontal loop did not converge after {} insertions", n),
    }
  }
}

impl std::error::Error for Error {}

/// Read-only view of the parametric surface being meshed.
///
/// Both operations must be reentrant; the triangulator calls them freely
/// while mutating its own state.
pub trait Surface {
  /// Map a parameter point to its spatial position.
  fn eval_point(&self, uv: [f64; 2]) -> [f64; 3];

  /// Spatial position together with the first derivatives along `u` and `v`.
  fn eval_deriv(&self, uv: [f64; 2]) -> ([f64; 3], [f64; 3], [f64; 3]);
}

/// The trivial surface `(u, v) -> (u, v, 0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plane;

impl Surface for Plane {
  fn eval_point(&self, uv: [f64; 2]) -> [f64; 3] {
    [uv[0], uv[1], 0.0]
  }

  fn eval_deriv(&self, uv: [f64; 2]) -> ([f64; 3], [f64; 3], [f64; 3]) {
    ([uv[0], uv[1], 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0])
  }
}

/// Desired element edge length at each spatial location. Values must be
/// strictly positive.
pub trait SizeField {
  fn feature_size(&self, xyz: [f64; 3]) -> f64;
}

/// Constant feature size everywhere.
#[derive(Debug, Clone, Copy)]
pub struct UniformSize(pub f64);

impl SizeField for UniformSize {
  fn feature_size(&self, _xyz: [f64; 3]) -> f64 {
    self.0
  }
}

#[cfg(test)]
mod tests;
