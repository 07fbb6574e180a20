//! ASCII VTK 3.0 unstructured-grid output.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::triangulate::{OutputSpace, Triangulator};
use crate::Surface;

impl<'a, S: Surface> Triangulator<'a, S> {
  /// Write the accepted triangulation as an ASCII VTK 3.0 unstructured
  /// grid (cell type 5, zero-based connectivity). `Parametric` writes the
  /// `(u, v)` positions with a zero third coordinate.
  pub fn write_vtk<P: AsRef<Path>>(&self, path: P, space: OutputSpace) -> io::Result<()> {
    let mesh = self.mesh();
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "# vtk DataFile Version 3.0")?;
    writeln!(w, "vtk output")?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET UNSTRUCTURED_GRID")?;
    writeln!(w, "POINTS {} float", mesh.params.len())?;
    match space {
      OutputSpace::Physical => {
        for p in &mesh.coords {
          writeln!(w, "{} {} {}", p[0], p[1], p[2])?;
        }
      }
      OutputSpace::Parametric => {
        for p in &mesh.params {
          writeln!(w, "{} {} 0", p[0], p[1])?;
        }
      }
    }
    writeln!(w, "CELLS {} {}", mesh.triangles.len(), 4 * mesh.triangles.len())?;
    for t in &mesh.triangles {
      writeln!(w, "3 {} {} {}", t[0], t[1], t[2])?;
    }
    writeln!(w, "CELL_TYPES {}", mesh.triangles.len())?;
    for _ in &mesh.triangles {
      writeln!(w, "5")?;
    }
    w.flush()
  }
}
