//! Thin 3D complex-to-complex DFT built from three passes of 1D FFTs
//! (`rustfft`), one per axis, over a buffer laid out with [`GridShape::idx`].
//!
//! Neither direction normalises -- a forward pass followed by an inverse
//! pass scales the data by `nx*ny*nz`, exactly as the FFTW convention the
//! stochastic synthesiser's normalisation step (`1/(nx*ny*nz)`) expects.

use rustfft::{num_complex::Complex64, FftPlanner};

use crate::grid::GridShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

pub fn transform(shape: &GridShape, data: &mut [Complex64], direction: Direction) {
    assert_eq!(data.len(), shape.len());
    let mut planner = FftPlanner::new();

    // z axis: contiguous, fastest-varying index.
    let fft_z = match direction {
        Direction::Forward => planner.plan_fft_forward(shape.nz),
        Direction::Inverse => planner.plan_fft_inverse(shape.nz),
    };
    for chunk in data.chunks_mut(shape.nz) {
        fft_z.process(chunk);
    }

    // y axis: stride nz.
    let fft_y = match direction {
        Direction::Forward => planner.plan_fft_forward(shape.ny),
        Direction::Inverse => planner.plan_fft_inverse(shape.ny),
    };
    let mut buf = vec![Complex64::new(0.0, 0.0); shape.ny];
    for i in 0..shape.nx {
        for k in 0..shape.nz {
            for (j, slot) in buf.iter_mut().enumerate() {
                *slot = data[shape.idx(i, j, k)];
            }
            fft_y.process(&mut buf);
            for (j, slot) in buf.iter().enumerate() {
                data[shape.idx(i, j, k)] = *slot;
            }
        }
    }

    // x axis: stride ny*nz.
    let fft_x = match direction {
        Direction::Forward => planner.plan_fft_forward(shape.nx),
        Direction::Inverse => planner.plan_fft_inverse(shape.nx),
    };
    let mut buf = vec![Complex64::new(0.0, 0.0); shape.nx];
    for j in 0..shape.ny {
        for k in 0..shape.nz {
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = data[shape.idx(i, j, k)];
            }
            fft_x.process(&mut buf);
            for (i, slot) in buf.iter().enumerate() {
                data[shape.idx(i, j, k)] = *slot;
            }
        }
    }
}

/// Signed physical wavevector component for sample index `i` of `n` along an
/// axis of physical length `length`, using the standard FFT convention
/// (indices `>= n/2` wrap to negative frequency).
pub fn k_component(i: usize, n: usize, length: f64) -> f64 {
    let k = if i < n.div_ceil(2) { i as f64 } else { i as f64 - n as f64 };
    crate::consts::TWOPI * k / length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_then_inverse_recovers_input_up_to_scale() {
        let shape = GridShape::new(4, 3, 5, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0).unwrap();
        let mut data: Vec<Complex64> = (0..shape.len())
            .map(|i| Complex64::new(i as f64, -(i as f64)))
            .collect();
        let original = data.clone();

        transform(&shape, &mut data, Direction::Forward);
        transform(&shape, &mut data, Direction::Inverse);

        let n = shape.len() as f64;
        for (got, want) in data.iter().zip(original.iter()) {
            assert!((got.re / n - want.re).abs() < 1e-9);
            assert!((got.im / n - want.im).abs() < 1e-9);
        }
    }

    #[test]
    fn k_component_wraps_like_fft_convention() {
        assert_eq!(k_component(0, 8, crate::consts::TWOPI), 0.0);
        assert!(k_component(1, 8, crate::consts::TWOPI) > 0.0);
        assert!(k_component(7, 8, crate::consts::TWOPI) < 0.0);
    }
}
