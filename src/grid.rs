//! Rectilinear Cartesian grids with trilinear interpolation.
//!
//! A [`Grid`] holds one `f64` sample per cell (electron density, cosmic-ray
//! flux, ...); a [`VectorGrid`] holds three (magnetic field components). Both
//! share the same box bounds and index arithmetic, factored into
//! [`GridShape`]. Interpolation saturates to zero outside the box rather than
//! wrapping or extrapolating -- see [`GridShape::axis_weight`].

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array1;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::errors::*;

/// Box bounds and sample counts shared by scalar and vector grids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridShape {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
}

impl GridShape {
    pub fn new(
        nx: usize,
        ny: usize,
        nz: usize,
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        zmin: f64,
        zmax: f64,
    ) -> Result<GridShape> {
        if nx == 0 || ny == 0 || nz == 0 {
            bail!(ErrorKind::Configuration(
                "grid sample counts must be positive".into()
            ));
        }
        if !(xmin < xmax) || !(ymin < ymax) || !(zmin < zmax) {
            bail!(ErrorKind::Configuration(
                "grid bounds must be strictly increasing on every axis".into()
            ));
        }
        Ok(GridShape {
            nx,
            ny,
            nz,
            xmin,
            xmax,
            ymin,
            ymax,
            zmin,
            zmax,
        })
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// `idx(i,j,k) = i*ny*nz + j*nz + k`, per the grid data model's index
    /// function.
    pub fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.ny + j) * self.nz + k
    }

    /// Physical position of the cell centre at `(i,j,k)`.
    pub fn position(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [
            lerp_cell(self.xmin, self.xmax, self.nx, i),
            lerp_cell(self.ymin, self.ymax, self.ny, j),
            lerp_cell(self.zmin, self.zmax, self.nz, k),
        ]
    }

    /// Returns `(l, d)` -- the lower grid index and fractional offset -- for
    /// one axis, or `None` if `p` falls outside `[min, max]`.
    fn axis_weight(p: f64, min: f64, max: f64, n: usize) -> Option<(usize, f64)> {
        let t = (p - min) * (n as f64 - 1.0) / (max - min);
        if t < 0.0 || t > (n - 1) as f64 {
            return None;
        }
        let l = t.floor() as usize;
        let l = l.min(n - 1);
        Some((l, t - l as f64))
    }
}

fn lerp_cell(min: f64, max: f64, n: usize, i: usize) -> f64 {
    if n == 1 {
        return min;
    }
    min + (max - min) * (i as f64) / (n as f64 - 1.0)
}

/// A scalar field sampled on a rectilinear grid.
#[derive(Debug, Clone)]
pub struct Grid {
    pub shape: GridShape,
    data: Array1<f64>,
}

impl Grid {
    pub fn zeros(shape: GridShape) -> Grid {
        Grid {
            data: Array1::zeros(shape.len()),
            shape,
        }
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.shape.idx(i, j, k)]
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let idx = self.shape.idx(i, j, k);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice().expect("grid payload is contiguous")
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data.as_slice_mut().expect("grid payload is contiguous")
    }

    /// Trilinear interpolation with boundary clamping: out-of-box positions
    /// return zero; positions on the far edge of any axis fall back to the
    /// nearest sample rather than reading past the array.
    pub fn interpolate(&self, pos: [f64; 3]) -> f64 {
        let s = &self.shape;
        let (xl, xd) = match GridShape::axis_weight(pos[0], s.xmin, s.xmax, s.nx) {
            Some(v) => v,
            None => return 0.0,
        };
        let (yl, yd) = match GridShape::axis_weight(pos[1], s.ymin, s.ymax, s.ny) {
            Some(v) => v,
            None => return 0.0,
        };
        let (zl, zd) = match GridShape::axis_weight(pos[2], s.zmin, s.zmax, s.nz) {
            Some(v) => v,
            None => return 0.0,
        };

        if xl + 1 < s.nx && yl + 1 < s.ny && zl + 1 < s.nz {
            let c = |di: usize, dj: usize, dk: usize| self.get(xl + di, yl + dj, zl + dk);
            trilinear(xd, yd, zd, [
                c(0, 0, 0), c(0, 0, 1), c(0, 1, 0), c(0, 1, 1),
                c(1, 0, 0), c(1, 0, 1), c(1, 1, 0), c(1, 1, 1),
            ])
        } else {
            self.get(xl, yl, zl)
        }
    }

    pub fn write_raw(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        for &v in self.data.iter() {
            w.write_f64::<LittleEndian>(v)?;
        }
        Ok(())
    }

    pub fn read_raw(path: impl AsRef<Path>, shape: GridShape) -> Result<Grid> {
        let mut r = BufReader::new(File::open(path)?);
        let mut grid = Grid::zeros(shape);
        for v in grid.data.iter_mut() {
            *v = r.read_f64::<LittleEndian>()?;
        }
        Ok(grid)
    }
}

/// A 3-vector field (magnetic field) sampled on a rectilinear grid. Payload
/// is laid out as three interleaved `f64` per cell, `(x,y,z)`, matching the
/// persisted file format.
#[derive(Debug, Clone)]
pub struct VectorGrid {
    pub shape: GridShape,
    data: Array1<f64>,
}

impl VectorGrid {
    pub fn zeros(shape: GridShape) -> VectorGrid {
        VectorGrid {
            data: Array1::zeros(3 * shape.len()),
            shape,
        }
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        let idx = 3 * self.shape.idx(i, j, k);
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, value: [f64; 3]) {
        let idx = 3 * self.shape.idx(i, j, k);
        self.data[idx] = value[0];
        self.data[idx + 1] = value[1];
        self.data[idx + 2] = value[2];
    }

    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice().expect("grid payload is contiguous")
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data.as_slice_mut().expect("grid payload is contiguous")
    }

    pub fn interpolate(&self, pos: [f64; 3]) -> [f64; 3] {
        let s = &self.shape;
        let (xl, xd) = match GridShape::axis_weight(pos[0], s.xmin, s.xmax, s.nx) {
            Some(v) => v,
            None => return [0.0; 3],
        };
        let (yl, yd) = match GridShape::axis_weight(pos[1], s.ymin, s.ymax, s.ny) {
            Some(v) => v,
            None => return [0.0; 3],
        };
        let (zl, zd) = match GridShape::axis_weight(pos[2], s.zmin, s.zmax, s.nz) {
            Some(v) => v,
            None => return [0.0; 3],
        };

        if xl + 1 < s.nx && yl + 1 < s.ny && zl + 1 < s.nz {
            let c = |di: usize, dj: usize, dk: usize| self.get(xl + di, yl + dj, zl + dk);
            let corners = [
                c(0, 0, 0), c(0, 0, 1), c(0, 1, 0), c(0, 1, 1),
                c(1, 0, 0), c(1, 0, 1), c(1, 1, 0), c(1, 1, 1),
            ];
            let mut out = [0.0; 3];
            for comp in 0..3 {
                let vals = [
                    corners[0][comp], corners[1][comp], corners[2][comp], corners[3][comp],
                    corners[4][comp], corners[5][comp], corners[6][comp], corners[7][comp],
                ];
                out[comp] = trilinear(xd, yd, zd, vals);
            }
            out
        } else {
            self.get(xl, yl, zl)
        }
    }

    pub fn write_raw(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        for &v in self.data.iter() {
            w.write_f64::<LittleEndian>(v)?;
        }
        Ok(())
    }

    pub fn read_raw(path: impl AsRef<Path>, shape: GridShape) -> Result<VectorGrid> {
        let mut r = BufReader::new(File::open(path)?);
        let mut grid = VectorGrid::zeros(shape);
        for v in grid.data.iter_mut() {
            *v = r.read_f64::<LittleEndian>()?;
        }
        Ok(grid)
    }
}

/// Corners ordered `[000, 001, 010, 011, 100, 101, 110, 111]` (axis order
/// x,y,z, low bit fastest on z).
fn trilinear(xd: f64, yd: f64, zd: f64, c: [f64; 8]) -> f64 {
    let c00 = c[0] * (1.0 - zd) + c[1] * zd;
    let c01 = c[2] * (1.0 - zd) + c[3] * zd;
    let c10 = c[4] * (1.0 - zd) + c[5] * zd;
    let c11 = c[6] * (1.0 - zd) + c[7] * zd;
    let c0 = c00 * (1.0 - yd) + c01 * yd;
    let c1 = c10 * (1.0 - yd) + c11 * yd;
    c0 * (1.0 - xd) + c1 * xd
}
