//! Cosmic-ray electron spectra and the synchrotron emissivity they produce.
//!
//! Only the analytic spectral model is implemented: a power law in energy
//! whose spectral index and normalisation vary smoothly with galactic
//! position, integrated analytically against the synchrotron kernel (rather
//! than numerically over a particle-energy grid) via the Gamma-function
//! identity for a power-law electron spectrum. This mirrors the reference
//! implementation's `CRE_ana` model.

use special::Gamma;

use crate::consts::{MEC, MEC2, QE};

const CM2_PER_M2: f64 = 1.0e4;
const PI: f64 = std::f64::consts::PI;

/// Parameters of the analytic CRE spectral model.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticCre {
    /// Spectral index at the observer, before the radial/vertical tilt.
    pub alpha: f64,
    /// Radial tilt of the spectral index, per unit galactocentric radius.
    pub beta: f64,
    /// Vertical tilt of the spectral index, per unit height above the plane.
    pub theta: f64,
    /// Radial scale length of the flux envelope.
    pub r0: f64,
    /// Vertical scale height of the flux envelope.
    pub z0: f64,
    /// Reference energy at which `j0` is defined, erg.
    pub e0: f64,
    /// Flux normalisation at `e0` and the observer's position,
    /// `[GeV m^2 s sr]^-1`.
    pub j0: f64,
}

impl AnalyticCre {
    fn rescal(&self, pos: [f64; 3], observer: [f64; 3]) -> f64 {
        let r0_sun = (observer[0] * observer[0] + observer[1] * observer[1]).sqrt();
        let r = (pos[0] * pos[0] + pos[1] * pos[1]).sqrt();
        let cosh_z = (pos[2] / self.z0).cosh();
        ((r0_sun - r) / self.r0).exp() / (cosh_z * cosh_z)
    }

    fn flux_idx(&self, pos: [f64; 3]) -> f64 {
        let r = (pos[0] * pos[0] + pos[1] * pos[1]).sqrt();
        let z = pos[2].abs();
        -self.alpha + self.beta * r + self.theta * z
    }

    fn flux_norm(&self, pos: [f64; 3], observer: [f64; 3]) -> f64 {
        let gamma0 = self.e0 / MEC2 + 1.0;
        let beta0 = (1.0 - 1.0 / gamma0).sqrt();
        let unit = (4.0 * PI * MEC) / (gev_to_erg_inverse() * CM2_PER_M2 * beta0);
        let norm = self.j0 * gamma0.powf(-self.flux_idx(observer));
        norm * unit * self.rescal(pos, observer)
    }

    /// Total synchrotron emissivity `J_tot(nu)` at `freq_hz`, given the
    /// magnitude of the magnetic field component perpendicular to the line
    /// of sight. Units follow the reference implementation: erg / (cm^3 s Hz sr).
    pub fn emissivity_total(
        &self,
        pos: [f64; 3],
        observer: [f64; 3],
        b_perp: f64,
        freq_hz: f64,
    ) -> f64 {
        if b_perp == 0.0 {
            return 0.0;
        }
        let index = self.flux_idx(pos);
        let norm =
            self.flux_norm(pos, observer) * 3f64.sqrt() * QE.powi(3) * b_perp.abs() / (2.0 * MEC2);
        let a = 4.0 * MEC * PI * freq_hz / (3.0 * QE * b_perp.abs());
        let mu = -0.5 * (3.0 + index);
        norm * (a.powf(0.5 * (index + 1.0))
            * 2f64.powf(mu + 1.0)
            * (0.5 * mu + 7.0 / 3.0).gamma()
            * (0.5 * mu + 2.0 / 3.0).gamma()
            / (mu + 2.0))
            / (4.0 * PI)
    }

    /// Polarized synchrotron emissivity `J_pol(nu)` at `freq_hz`.
    pub fn emissivity_polarized(
        &self,
        pos: [f64; 3],
        observer: [f64; 3],
        b_perp: f64,
        freq_hz: f64,
    ) -> f64 {
        if b_perp == 0.0 {
            return 0.0;
        }
        let index = self.flux_idx(pos);
        let norm =
            self.flux_norm(pos, observer) * 3f64.sqrt() * QE.powi(3) * b_perp.abs() / (2.0 * MEC2);
        let a = 4.0 * MEC * PI * freq_hz / (3.0 * QE * b_perp.abs());
        let mu = -0.5 * (3.0 + index);
        norm * (a.powf(0.5 * (index + 1.0)) * 2f64.powf(mu) * (0.5 * mu + 4.0 / 3.0).gamma()
            * (0.5 * mu + 2.0 / 3.0).gamma())
            / (4.0 * PI)
    }
}

/// One GeV in erg, kept local to this module since nothing else needs the
/// energy unit of the CRE flux normalisation.
fn gev_to_erg_inverse() -> f64 {
    crate::consts::GEV
}

/// A cosmic-ray electron provider: either absent (no synchrotron emission)
/// or the analytic spectral model.
#[derive(Debug, Clone, Copy)]
pub enum CreField {
    Zero,
    Analytic(AnalyticCre),
}

impl CreField {
    pub fn emissivity_total(
        &self,
        pos: [f64; 3],
        observer: [f64; 3],
        b_perp: f64,
        freq_hz: f64,
    ) -> f64 {
        match self {
            CreField::Zero => 0.0,
            CreField::Analytic(cre) => cre.emissivity_total(pos, observer, b_perp, freq_hz),
        }
    }

    pub fn emissivity_polarized(
        &self,
        pos: [f64; 3],
        observer: [f64; 3],
        b_perp: f64,
        freq_hz: f64,
    ) -> f64 {
        match self {
            CreField::Zero => 0.0,
            CreField::Analytic(cre) => cre.emissivity_polarized(pos, observer, b_perp, freq_hz),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cre() -> AnalyticCre {
        AnalyticCre {
            alpha: 3.0,
            beta: 0.0,
            theta: 0.0,
            r0: 10.0 * crate::consts::KPC,
            z0: 1.0 * crate::consts::KPC,
            e0: 10.0 * crate::consts::GEV,
            j0: 1.0e-9,
        }
    }

    #[test]
    fn zero_field_has_no_emissivity() {
        let f = CreField::Zero;
        let pos = [0.0, 0.0, 0.0];
        let observer = [8.0 * crate::consts::KPC, 0.0, 0.0];
        assert_eq!(f.emissivity_total(pos, observer, 1e-6, 1e9), 0.0);
        assert_eq!(f.emissivity_polarized(pos, observer, 1e-6, 1e9), 0.0);
    }

    #[test]
    fn zero_perpendicular_field_gives_zero_emissivity() {
        let cre = sample_cre();
        let observer = [8.0 * crate::consts::KPC, 0.0, 0.0];
        assert_eq!(cre.emissivity_total(observer, observer, 0.0, 1e9), 0.0);
    }

    #[test]
    fn emissivity_is_positive_and_finite_at_the_observer() {
        let cre = sample_cre();
        let observer = [8.0 * crate::consts::KPC, 0.0, 0.0];
        let j_t = cre.emissivity_total(observer, observer, 1.0e-6, 1.4e9);
        let j_p = cre.emissivity_polarized(observer, observer, 1.0e-6, 1.4e9);
        assert!(j_t.is_finite() && j_t > 0.0);
        assert!(j_p.is_finite() && j_p > 0.0);
        // polarized emissivity cannot exceed total emissivity
        assert!(j_p <= j_t);
    }

    #[test]
    fn rescal_is_one_at_the_observer_plane() {
        let cre = sample_cre();
        let observer = [8.0 * crate::consts::KPC, 0.0, 0.0];
        assert!((cre.rescal(observer, observer) - 1.0).abs() < 1e-9);
    }
}
