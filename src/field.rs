//! Field providers: a polymorphic value that answers `sample(pos) -> T` for
//! either a scalar (electron density) or a 3-vector (magnetic field), either
//! by evaluating a closed form or by reading a [`Grid`]/[`VectorGrid`].
//!
//! Kept as tagged enums per field kind rather than a class hierarchy -- see
//! the design notes on avoiding virtual dispatch for what is, underneath,
//! always the same `sample(pos) -> T` operation.

use std::sync::Arc;

use crate::grid::{Grid, VectorGrid};
use crate::vecmath::norm;

/// One representative closed-form regular magnetic field model, in the style
/// of a logarithmic-spiral disk field (WMAP-like), plus a constant model used
/// for test scenarios (the `Verify` role in the original modeling scheme).
#[derive(Debug, Clone, Copy)]
pub enum RegularMagneticModel {
    /// Logarithmic-spiral disk field: `B = b0` along the spiral direction at
    /// pitch angle `pitch`, confined to the galactic plane by `exp(-|z|/z0)`.
    Disk {
        b0: f64,
        pitch: f64,
        z0: f64,
    },
    /// Constant field, independent of position.
    Verify { b: [f64; 3] },
}

impl RegularMagneticModel {
    fn sample(&self, pos: [f64; 3]) -> [f64; 3] {
        match *self {
            RegularMagneticModel::Verify { b } => b,
            RegularMagneticModel::Disk { b0, pitch, z0 } => {
                let r = (pos[0] * pos[0] + pos[1] * pos[1]).sqrt();
                if r == 0.0 {
                    return [0.0; 3];
                }
                let phi = pos[1].atan2(pos[0]);
                // spiral azimuth offset at this radius
                let theta = phi - pitch.tan().recip() * r.ln();
                let amp = b0 * (-pos[2].abs() / z0).exp();
                [-amp * theta.sin(), amp * theta.cos(), 0.0]
            }
        }
    }
}

/// One representative closed-form regular electron-density model: a
/// radially/vertically exponential thick disk, in the functional family of
/// YMW16's disk component, plus a constant model for test scenarios.
#[derive(Debug, Clone, Copy)]
pub enum RegularElectronModel {
    Exponential { n0: f64, r0: f64, z0: f64 },
    Verify { n0: f64 },
}

impl RegularElectronModel {
    fn sample(&self, pos: [f64; 3]) -> f64 {
        match *self {
            RegularElectronModel::Verify { n0 } => n0,
            RegularElectronModel::Exponential { n0, r0, z0 } => {
                let r = (pos[0] * pos[0] + pos[1] * pos[1]).sqrt();
                n0 * (-r / r0).exp() * (-pos[2].abs() / z0).exp()
            }
        }
    }
}

/// A scalar field provider: electron density, regular or random.
#[derive(Clone)]
pub enum ScalarField {
    Zero,
    Analytic(RegularElectronModel),
    Gridded(Arc<Grid>),
}

impl ScalarField {
    pub fn sample(&self, pos: [f64; 3]) -> f64 {
        match self {
            ScalarField::Zero => 0.0,
            ScalarField::Analytic(m) => m.sample(pos),
            ScalarField::Gridded(g) => g.interpolate(pos),
        }
    }
}

/// A vector field provider: magnetic field, regular or random.
#[derive(Clone)]
pub enum VectorField {
    Zero,
    Analytic(RegularMagneticModel),
    Gridded(Arc<VectorGrid>),
}

impl VectorField {
    pub fn sample(&self, pos: [f64; 3]) -> [f64; 3] {
        match self {
            VectorField::Zero => [0.0; 3],
            VectorField::Analytic(m) => m.sample(pos),
            VectorField::Gridded(g) => g.interpolate(pos),
        }
    }
}

/// Decomposes `b` into the component parallel to unit vector `los` and the
/// magnitude of the perpendicular remainder, as used at every LOS quadrature
/// point.
pub fn los_components(b: [f64; 3], los: [f64; 3]) -> (f64, f64) {
    let b_par = crate::vecmath::dot(b, los);
    let perp = crate::vecmath::sub(b, crate::vecmath::scale(los, b_par));
    (b_par, norm(perp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_field_samples_zero() {
        assert_eq!(ScalarField::Zero.sample([1.0, 2.0, 3.0]), 0.0);
        assert_eq!(VectorField::Zero.sample([1.0, 2.0, 3.0]), [0.0; 3]);
    }

    #[test]
    fn verify_scalar_is_constant() {
        let f = ScalarField::Analytic(RegularElectronModel::Verify { n0: 0.1 });
        assert_eq!(f.sample([0.0, 0.0, 0.0]), 0.1);
        assert_eq!(f.sample([5.0, -2.0, 1.0]), 0.1);
    }

    #[test]
    fn los_components_split_parallel_and_perp() {
        let (par, perp) = los_components([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        assert!((par - 1.0).abs() < 1e-12);
        assert!(perp.abs() < 1e-12);

        let (par, perp) = los_components([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]);
        assert!(par.abs() < 1e-12);
        assert!((perp - 1.0).abs() < 1e-12);
    }
}
