use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use claims::assert_ok;

use crate::geom;
use crate::predicates;
use crate::{Error, Mesh, Options, OutputSpace, Plane, SizeField, Surface, Triangulator, UniformSize};

fn circle(n: usize, r: f64) -> Vec<[f64; 2]> {
  (0..n)
    .map(|i| {
      let a = 2.0 * PI * i as f64 / n as f64;
      [r * a.cos(), r * a.sin()]
    })
    .collect()
}

fn ring_segments(offset: usize, n: usize) -> Vec<[usize; 2]> {
  (0..n).map(|i| [offset + i, offset + (i + 1) % n]).collect()
}

fn shoelace(pts: &[[f64; 2]]) -> f64 {
  let mut acc = 0.0;
  for i in 0..pts.len() {
    let p = pts[i];
    let q = pts[(i + 1) % pts.len()];
    acc += p[0] * q[1] - q[0] * p[1];
  }
  0.5 * acc
}

fn mesh_area(mesh: &Mesh) -> f64 {
  mesh
    .triangles
    .iter()
    .map(|t| {
      let [a, b, c] = *t;
      0.5
        * predicates::orient(
          mesh.params[a as usize],
          mesh.params[b as usize],
          mesh.params[c as usize],
        )
    })
    .sum()
}

fn find_param(mesh: &Mesh, p: [f64; 2]) -> Option<u32> {
  mesh.params.iter().position(|&q| q == p).map(|i| i as u32)
}

fn has_edge(mesh: &Mesh, p: u32, q: u32) -> bool {
  mesh.triangles.iter().any(|t| {
    (0..3).any(|k| {
      let (a, b) = (t[k], t[(k + 1) % 3]);
      (a, b) == (p, q) || (a, b) == (q, p)
    })
  })
}

/// Rotation-insensitive triangle key.
fn canon(t: [u32; 3]) -> [u32; 3] {
  let k = (0..3).min_by_key(|&k| t[k]).unwrap();
  [t[k], t[(k + 1) % 3], t[(k + 2) % 3]]
}

fn triangle_multiset(tris: &[[u32; 3]]) -> Vec<[u32; 3]> {
  let mut v: Vec<[u32; 3]> = tris.iter().map(|&t| canon(t)).collect();
  v.sort_unstable();
  v
}

fn key(p: [f64; 2]) -> (u64, u64) {
  (p[0].to_bits(), p[1].to_bits())
}

/// Check testable property 5: across every interior non-constraint edge the
/// opposite vertices satisfy the empty-circumcircle rule.
fn assert_edge_delaunay(mesh: &Mesh, constraints: &[([f64; 2], [f64; 2])]) {
  let pinned: HashSet<((u64, u64), (u64, u64))> = constraints
    .iter()
    .map(|&(p, q)| {
      let (kp, kq) = (key(p), key(q));
      (kp.min(kq), kp.max(kq))
    })
    .collect();
  let mut apex: HashMap<(u32, u32), u32> = HashMap::new();
  for t in &mesh.triangles {
    for k in 0..3 {
      apex.insert((t[k], t[(k + 1) % 3]), t[(k + 2) % 3]);
    }
  }
  for (&(a, b), &c) in &apex {
    let Some(&d) = apex.get(&(b, a)) else {
      continue;
    };
    let (ka, kb) = (key(mesh.params[a as usize]), key(mesh.params[b as usize]));
    if pinned.contains(&(ka.min(kb), ka.max(kb))) {
      continue;
    }
    let incircle = predicates::in_circle(
      mesh.params[a as usize],
      mesh.params[b as usize],
      mesh.params[c as usize],
      mesh.params[d as usize],
    );
    assert!(
      incircle <= 1e-9,
      "edge ({}, {}) violates the empty circumcircle rule: {}",
      a,
      b,
      incircle
    );
  }
}

fn assert_quality(mesh: &Mesh, size: &impl SizeField, surface: &impl Surface, limit: f64) {
  for t in &mesh.triangles {
    let [a, b, c] = *t;
    let r = geom::circumradius3(
      mesh.coords[a as usize],
      mesh.coords[b as usize],
      mesh.coords[c as usize],
    );
    let centroid = geom::centroid(
      mesh.params[a as usize],
      mesh.params[b as usize],
      mesh.params[c as usize],
    );
    let h = size.feature_size(surface.eval_point(centroid));
    assert!(
      r / h <= limit,
      "triangle {:?} has quality {} over the limit {}",
      t,
      r / h,
      limit
    );
  }
}

#[test]
fn unit_disk_uniform_size() {
  let pts = circle(16, 1.0);
  let segs = ring_segments(0, 16);
  let size = UniformSize(0.25);
  let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, Options::default()).unwrap();
  assert_ok!(tri.frontal(&size));
  assert_ok!(tri.check_invariants());

  let mesh = tri.mesh();
  assert!(!mesh.triangles.is_empty());
  // Every boundary point survives verbatim.
  for &p in &pts {
    assert!(find_param(&mesh, p).is_some(), "boundary point {:?} lost", p);
  }
  // Quality bound with slack, and the interior stays Delaunay.
  assert_quality(&mesh, &size, &Plane, 2.0);
  let constraints: Vec<([f64; 2], [f64; 2])> = segs
    .iter()
    .map(|s| (pts[s[0]], pts[s[1]]))
    .collect();
  assert_edge_delaunay(&mesh, &constraints);
  // Coverage: the triangles tile the 16-gon.
  let area = shoelace(&pts);
  assert!((mesh_area(&mesh) - area).abs() < 1e-9 * area.abs());
}

#[test]
fn square_with_constrained_diagonal() {
  let pts = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
  let segs = [[0, 1], [1, 2], [2, 3], [3, 0], [0, 2]];
  let size = UniformSize(0.2);
  let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, Options::default()).unwrap();

  // The diagonal must already be present after construction.
  let before = tri.mesh();
  let p0 = find_param(&before, [0.0, 0.0]).unwrap();
  let p2 = find_param(&before, [1.0, 1.0]).unwrap();
  assert!(has_edge(&before, p0, p2), "diagonal missing after recovery");

  assert_ok!(tri.frontal(&size));
  assert_ok!(tri.check_invariants());
  let mesh = tri.mesh();
  let p0 = find_param(&mesh, [0.0, 0.0]).unwrap();
  let p2 = find_param(&mesh, [1.0, 1.0]).unwrap();
  assert!(has_edge(&mesh, p0, p2), "diagonal lost during refinement");

  // No mesh edge crosses the diagonal, and both halves are meshed.
  let mut above = 0;
  let mut below = 0;
  for t in &mesh.triangles {
    for k in 0..3 {
      let a = mesh.params[t[k] as usize];
      let b = mesh.params[t[(k + 1) % 3] as usize];
      assert!(
        !geom::segments_cross(a, b, [0.0, 0.0], [1.0, 1.0]),
        "edge {:?} -> {:?} crosses the constrained diagonal",
        a,
        b
      );
    }
    let c = geom::centroid(
      mesh.params[t[0] as usize],
      mesh.params[t[1] as usize],
      mesh.params[t[2] as usize],
    );
    if c[1] > c[0] {
      above += 1;
    } else {
      below += 1;
    }
  }
  assert!(above > 0 && below > 0);
  assert!((mesh_area(&mesh) - 1.0).abs() < 1e-9);
}

#[test]
fn annulus_with_hole_seed() {
  let mut pts = circle(32, 1.0);
  pts.extend(circle(16, 0.3));
  let mut segs = ring_segments(0, 32);
  segs.extend(ring_segments(32, 16));
  let size = UniformSize(0.15);
  let mut tri =
    Triangulator::new(&pts, &segs, &[[0.0, 0.0]], &Plane, Options::default()).unwrap();
  assert_ok!(tri.frontal(&size));
  assert_ok!(tri.check_invariants());

  let mesh = tri.mesh();
  for t in &mesh.triangles {
    let c = geom::centroid(
      mesh.params[t[0] as usize],
      mesh.params[t[1] as usize],
      mesh.params[t[2] as usize],
    );
    let r = (c[0] * c[0] + c[1] * c[1]).sqrt();
    assert!(r > 0.3, "triangle centroid {:?} lies in the hole", c);
  }
  let area = shoelace(&circle(32, 1.0)) - shoelace(&circle(16, 0.3));
  assert!((mesh_area(&mesh) - area).abs() < 1e-9 * area);
}

#[test]
fn l_shape_reentrant_corner() {
  let pts = [
    [0.0, 0.0],
    [0.5, 0.0],
    [1.0, 0.0],
    [1.0, 0.5],
    [0.5, 0.5],
    [0.5, 1.0],
    [0.0, 1.0],
    [0.0, 0.5],
  ];
  let segs = ring_segments(0, 8);
  let size = UniformSize(0.5);
  let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, Options::default()).unwrap();
  assert_ok!(tri.frontal(&size));
  assert_ok!(tri.check_invariants());

  let mesh = tri.mesh();
  assert!(find_param(&mesh, [0.5, 0.5]).is_some(), "reentrant corner lost");
  for t in &mesh.triangles {
    let a = mesh.params[t[0] as usize];
    let b = mesh.params[t[1] as usize];
    let c = mesh.params[t[2] as usize];
    let corner = [0.5, 0.5];
    let strictly_inside = predicates::orient(a, b, corner) > 0.0
      && predicates::orient(b, c, corner) > 0.0
      && predicates::orient(c, a, corner) > 0.0;
    assert!(!strictly_inside, "triangle {:?} straddles the reentrant corner", t);
  }
  assert!((mesh_area(&mesh) - 0.75).abs() < 1e-9);
}

/// Parameter rectangle glued onto a fan: the whole `u = 0` edge maps to one
/// spatial point.
struct Pinch;

impl Surface for Pinch {
  fn eval_point(&self, uv: [f64; 2]) -> [f64; 3] {
    [uv[0], uv[0] * uv[1], 0.0]
  }

  fn eval_deriv(&self, uv: [f64; 2]) -> ([f64; 3], [f64; 3], [f64; 3]) {
    (
      self.eval_point(uv),
      [1.0, uv[1], 0.0],
      [0.0, uv[0], 0.0],
    )
  }
}

#[test]
fn degenerate_boundary_edge_merges() {
  let pts = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
  let segs = [[0, 1], [1, 2], [2, 3], [3, 0]];
  // Coarse sizing: the mesh stays at a handful of triangles.
  let size = UniformSize(2.0);
  let mut tri = Triangulator::new(&pts, &segs, &[], &Pinch, Options::default()).unwrap();
  assert_ok!(tri.frontal(&size));

  // Inputs 0 and 3 land on the same spatial point.
  assert_eq!(Pinch.eval_point(pts[0]), Pinch.eval_point(pts[3]));
  tri.remove_degenerate_edges(&[[0, 3]]);
  assert_ok!(tri.check_invariants());

  let mesh = tri.mesh();
  assert!(!mesh.triangles.is_empty());
  assert!(find_param(&mesh, [0.0, 1.0]).is_none(), "merged point still present");
  for t in &mesh.triangles {
    assert!(t[0] != t[1] && t[1] != t[2] && t[2] != t[0]);
  }
}

#[test]
fn collinear_constraint_splits_at_vertices() {
  // The long bottom constraint overlaps three collinear boundary edges and
  // must split at the intervening vertices instead of failing.
  let pts = [
    [0.0, 0.0],
    [1.0, 0.0],
    [2.0, 0.0],
    [3.0, 0.0],
    [3.0, 1.0],
    [0.0, 1.0],
  ];
  let mut segs = ring_segments(0, 6);
  segs.push([0, 3]);
  let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, Options::default()).unwrap();
  assert_ok!(tri.check_invariants());
  assert_ok!(tri.frontal(&UniformSize(1.0)));
  assert_ok!(tri.check_invariants());

  let mesh = tri.mesh();
  assert!((mesh_area(&mesh) - 3.0).abs() < 1e-9);
  for &p in &pts {
    assert!(find_param(&mesh, p).is_some(), "boundary point {:?} lost", p);
  }
  // The split pieces are all mesh edges.
  for w in [[0usize, 1], [1, 2], [2, 3]] {
    let a = find_param(&mesh, pts[w[0]]).unwrap();
    let b = find_param(&mesh, pts[w[1]]).unwrap();
    assert!(has_edge(&mesh, a, b));
  }
}

#[test]
fn cocircular_square_terminates() {
  let pts = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
  let segs = ring_segments(0, 4);
  let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, Options::default()).unwrap();
  assert_ok!(tri.frontal(&UniformSize(2.0)));
  assert_ok!(tri.check_invariants());
  let mesh = tri.mesh();
  assert_eq!(mesh.triangles.len(), 2);
  assert!((mesh_area(&mesh) - 1.0).abs() < 1e-12);
}

#[test]
fn smoothing_preserves_invariants() {
  let pts = circle(16, 1.0);
  let segs = ring_segments(0, 16);
  let opts = Options {
    smooth_every: 7,
    ..Options::default()
  };
  let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, opts).unwrap();
  assert_ok!(tri.frontal(&UniformSize(0.25)));
  assert_ok!(tri.check_invariants());
  let mesh = tri.mesh();
  // Boundary points are pinned.
  for &p in &pts {
    assert!(find_param(&mesh, p).is_some());
  }
  let area = shoelace(&pts);
  assert!((mesh_area(&mesh) - area).abs() < 1e-9 * area);
}

#[test]
fn convergence_cap_reports_partial_mesh() {
  let pts = circle(16, 1.0);
  let segs = ring_segments(0, 16);
  let opts = Options {
    max_insertions: Some(10),
    ..Options::default()
  };
  let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, opts).unwrap();
  assert_eq!(tri.frontal(&UniformSize(0.01)), Err(Error::Convergence(10)));
  assert_ok!(tri.check_invariants());
  assert!(!tri.mesh().triangles.is_empty());
}

#[test]
fn input_validation() {
  let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
  assert_eq!(
    Triangulator::new(&square[..2], &[], &[], &Plane, Options::default()).err(),
    Some(Error::TooFewPoints)
  );
  assert_eq!(
    Triangulator::new(&square, &[[0, 7]], &[], &Plane, Options::default()).err(),
    Some(Error::SegmentOutOfRange(0))
  );
  assert_eq!(
    Triangulator::new(&square, &[[2, 2]], &[], &Plane, Options::default()).err(),
    Some(Error::DegenerateSegment(0))
  );
  assert_eq!(
    Triangulator::new(&square, &[[0, 2], [1, 3]], &[], &Plane, Options::default()).err(),
    Some(Error::CrossingSegments(0, 1))
  );
  let dup = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
  assert_eq!(
    Triangulator::new(&dup, &[], &[], &Plane, Options::default()).err(),
    Some(Error::DuplicatePoint(3, 0))
  );
}

fn read_vtk(path: &std::path::Path) -> (Vec<[f64; 3]>, Vec<[u32; 3]>) {
  let text = std::fs::read_to_string(path).unwrap();
  let mut lines = text.lines();
  assert_eq!(lines.next(), Some("# vtk DataFile Version 3.0"));
  assert_eq!(lines.next(), Some("vtk output"));
  assert_eq!(lines.next(), Some("ASCII"));
  assert_eq!(lines.next(), Some("DATASET UNSTRUCTURED_GRID"));
  let header = lines.next().unwrap();
  let n: usize = header
    .strip_prefix("POINTS ")
    .unwrap()
    .strip_suffix(" float")
    .unwrap()
    .parse()
    .unwrap();
  let mut points = Vec::with_capacity(n);
  for _ in 0..n {
    let row: Vec<f64> = lines
      .next()
      .unwrap()
      .split_whitespace()
      .map(|w| w.parse().unwrap())
      .collect();
    points.push([row[0], row[1], row[2]]);
  }
  let header = lines.next().unwrap();
  let words: Vec<&str> = header.split_whitespace().collect();
  assert_eq!(words[0], "CELLS");
  let m: usize = words[1].parse().unwrap();
  assert_eq!(words[2].parse::<usize>().unwrap(), 4 * m);
  let mut triangles = Vec::with_capacity(m);
  for _ in 0..m {
    let row: Vec<u32> = lines
      .next()
      .unwrap()
      .split_whitespace()
      .map(|w| w.parse().unwrap())
      .collect();
    assert_eq!(row[0], 3);
    triangles.push([row[1], row[2], row[3]]);
  }
  assert_eq!(lines.next(), Some(format!("CELL_TYPES {}", m)).as_deref());
  for _ in 0..m {
    assert_eq!(lines.next(), Some("5"));
  }
  (points, triangles)
}

#[test]
fn vtk_round_trip() {
  let pts = circle(12, 1.0);
  let segs = ring_segments(0, 12);
  let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, Options::default()).unwrap();
  assert_ok!(tri.frontal(&UniformSize(0.4)));
  let mesh = tri.mesh();

  let physical = std::env::temp_dir().join("frontmesh_roundtrip_physical.vtk");
  let parametric = std::env::temp_dir().join("frontmesh_roundtrip_parametric.vtk");
  tri.write_vtk(&physical, OutputSpace::Physical).unwrap();
  tri.write_vtk(&parametric, OutputSpace::Parametric).unwrap();

  let (coords, tris) = read_vtk(&physical);
  assert_eq!(coords.len(), mesh.coords.len());
  assert_eq!(coords, mesh.coords);
  assert_eq!(
    triangle_multiset(&tris),
    triangle_multiset(&mesh.triangles)
  );

  let (params, tris2) = read_vtk(&parametric);
  let expect: Vec<[f64; 3]> = mesh.params.iter().map(|p| [p[0], p[1], 0.0]).collect();
  assert_eq!(params, expect);
  assert_eq!(
    triangle_multiset(&tris2),
    triangle_multiset(&mesh.triangles)
  );
}

mod random_properties {
  use super::*;
  use proptest::prelude::*;

  fn sparse_interior() -> impl Strategy<Value = Vec<[f64; 2]>> {
    prop::collection::vec((0.05f64..0.95, 0.05f64..0.95), 0..25).prop_map(|raw| {
      let mut kept: Vec<[f64; 2]> = Vec::new();
      for (x, y) in raw {
        let p = [x, y];
        if kept.iter().all(|&q| geom::dist(p, q) > 1e-3) {
          kept.push(p);
        }
      }
      kept
    })
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn random_interior_points_stay_delaunay(interior in sparse_interior()) {
      let mut pts = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
      pts.extend(interior);
      let segs = ring_segments(0, 4);
      let tri = Triangulator::new(&pts, &segs, &[], &Plane, Options::default()).unwrap();
      prop_assert!(tri.check_invariants().is_ok());

      let mesh = tri.mesh();
      let constraints: Vec<([f64; 2], [f64; 2])> = segs
        .iter()
        .map(|s| (pts[s[0]], pts[s[1]]))
        .collect();
      assert_edge_delaunay(&mesh, &constraints);
      prop_assert!((mesh_area(&mesh) - 1.0).abs() < 1e-9);
      // Every input point appears.
      for &p in &pts {
        prop_assert!(find_param(&mesh, p).is_some());
      }
    }
  }
}

mod sized_disks {
  use super::*;
  use test_strategy::proptest;

  #[proptest]
  fn disks_meet_the_quality_bound(#[strategy(8usize..24)] n: usize) {
    let pts = circle(n, 1.0);
    let segs = ring_segments(0, n);
    let size = UniformSize(0.3);
    let mut tri = Triangulator::new(&pts, &segs, &[], &Plane, Options::default()).unwrap();
    tri.frontal(&size).unwrap();
    tri.check_invariants().unwrap();
    let mesh = tri.mesh();
    assert_quality(&mesh, &size, &Plane, 1.0 + 2.0);
    let area = shoelace(&pts);
    assert!((mesh_area(&mesh) - area).abs() < 1e-9 * area);
  }
}
