//! Fourier-space stochastic field synthesiser.
//!
//! Populates a [`Grid`]/[`VectorGrid`] with a statistically homogeneous
//! Gaussian random field drawn from a prescribed isotropic power spectrum,
//! then (for the vector/magnetic variant) imposes local anisotropy relative
//! to a regular background field and cleans the result to be divergence-free
//! in k-space. Every step mirrors the phases of the reference
//! implementation's global random-field generator: fill k-space, zero the DC
//! mode, inverse-transform, rescale by the spatial envelope, (vector only)
//! impose anisotropy, forward-transform, (vector only) Gram-Schmidt clean,
//! inverse-transform, normalise.
//!
//! Reproducibility is load-bearing here: the RNG is seeded once and consumed
//! in a single sequential fill loop (never split across threads), so the
//! same seed and parameters always produce a bit-identical grid.

use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_pcg::Pcg64;
use rustfft::num_complex::Complex64;

use crate::consts::TWOPI;
use crate::errors::*;
use crate::field::VectorField;
use crate::fft::{self, Direction};
use crate::grid::{Grid, GridShape, VectorGrid};
use crate::vecmath::{dot, norm, scale, sub, versor};

/// Constants driving one isotropic random-field synthesis.
#[derive(Debug, Clone, Copy)]
pub struct RandomFieldParams {
    pub rms: f64,
    pub k0: f64,
    pub a0: f64,
    pub r0: f64,
    pub z0: f64,
    pub seed: u64,
}

/// Isotropic power spectrum. Per the reference implementation, `P(k) = 0`
/// for `0 < k <= k0` (the alternative convention of capping at `sigma^2`
/// there is not what the original code does, and is not used here).
fn spec(k: f64, p: &RandomFieldParams) -> f64 {
    if k <= 0.0 || k <= p.k0 {
        return 0.0;
    }
    p.rms * p.rms / (k / p.k0).powf(p.a0)
}

/// Per-mode spectral density used to assign variance to a k-space cell.
fn p_phys(k: f64, p: &RandomFieldParams) -> f64 {
    if k <= 0.0 {
        0.0
    } else {
        spec(k, p) / (4.0 * std::f64::consts::PI * k * k)
    }
}

/// Galactocentric radial/vertical envelope, normalised to 1 at the observer.
fn envelope(pos: [f64; 3], observer: [f64; 3], r0: f64, z0: f64) -> f64 {
    let r_cyl = (pos[0] * pos[0] + pos[1] * pos[1]).sqrt();
    let sun_r = (observer[0] * observer[0] + observer[1] * observer[1]).sqrt();
    let sun_z = observer[2].abs();
    (-(r_cyl - sun_r) / r0).exp() * (-(pos[2].abs() - sun_z) / z0).exp()
}

fn population_variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// k-cell volume `dk^3` and the Simpson half-step `halfdk` used to integrate
/// `P_phys` across one k-cell.
fn k_cell_geometry(shape: &GridShape) -> (f64, f64) {
    let lx = shape.xmax - shape.xmin;
    let ly = shape.ymax - shape.ymin;
    let lz = shape.zmax - shape.zmin;
    let dkx = TWOPI / lx;
    let dky = TWOPI / ly;
    let dkz = TWOPI / lz;
    let dk3 = dkx * dky * dkz;
    let halfdk = 0.5 * (dkx * dkx + dky * dky + dkz * dkz).sqrt();
    (dk3, halfdk)
}

fn wavevector(shape: &GridShape, i: usize, j: usize, l: usize) -> [f64; 3] {
    let lx = shape.xmax - shape.xmin;
    let ly = shape.ymax - shape.ymin;
    let lz = shape.zmax - shape.zmin;
    [
        fft::k_component(i, shape.nx, lx),
        fft::k_component(j, shape.ny, ly),
        fft::k_component(l, shape.nz, lz),
    ]
}

/// Draws the Gaussian k-space amplitudes for one scalar field, consuming
/// `2 * shape.len()` standard normal deviates from `rng` in cell-major
/// order (the real part, then the imaginary part, of every cell).
fn fill_kspace_scalar(
    shape: &GridShape,
    p: &RandomFieldParams,
    rng: &mut Pcg64,
) -> Vec<Complex64> {
    let (dk3, halfdk) = k_cell_geometry(shape);
    let mut data = vec![Complex64::new(0.0, 0.0); shape.len()];

    for i in 0..shape.nx {
        for j in 0..shape.ny {
            for l in 0..shape.nz {
                let k = norm(wavevector(shape, i, j, l));
                let element = p_phys(k, p) * 0.666_666_7
                    + p_phys(k + halfdk, p) * 0.166_666_7
                    + p_phys(k - halfdk, p).max(0.0) * 0.166_666_7;
                let sigma_cell = (0.5 * element * dk3).sqrt();
                let g_re: f64 = StandardNormal.sample(rng);
                let g_im: f64 = StandardNormal.sample(rng);
                data[shape.idx(i, j, l)] = Complex64::new(sigma_cell * g_re, sigma_cell * g_im);
            }
        }
    }
    data[0] = Complex64::new(0.0, 0.0);
    data
}

/// Isotropic random scalar field (free-electron density), §4.2 steps 1-4,9.
pub fn synthesize_scalar(shape: GridShape, p: &RandomFieldParams, observer: [f64; 3]) -> Grid {
    let mut rng = Pcg64::seed_from_u64(p.seed);
    let mut data = fill_kspace_scalar(&shape, p, &mut rng);

    fft::transform(&shape, &mut data, Direction::Inverse);
    let n = shape.len() as f64;
    let real: Vec<f64> = data.iter().map(|c| c.re / n).collect();
    let v = population_variance(real.iter().copied());

    let mut grid = Grid::zeros(shape);
    for i in 0..shape.nx {
        for j in 0..shape.ny {
            for k in 0..shape.nz {
                let pos = shape.position(i, j, k);
                let ratio = if v > 0.0 {
                    (envelope(pos, observer, p.r0, p.z0)).sqrt() * p.rms / v.sqrt()
                } else {
                    0.0
                };
                grid.set(i, j, k, real[shape.idx(i, j, k)] * ratio);
            }
        }
    }
    grid
}

/// Anisotropic random vector field (turbulent magnetic field), full §4.2
/// algorithm including Gram-Schmidt divergence cleaning.
pub fn synthesize_vector(
    shape: GridShape,
    p: &RandomFieldParams,
    rho: f64,
    breg: &VectorField,
    observer: [f64; 3],
) -> Result<VectorGrid> {
    if !(0.0..=1.0).contains(&rho) {
        bail!(ErrorKind::Numeric(format!(
            "anisotropy rho must be in [0,1], got {}",
            rho
        )));
    }

    let mut rng = Pcg64::seed_from_u64(p.seed);
    let (dk3, halfdk) = k_cell_geometry(&shape);
    let mut bx = vec![Complex64::new(0.0, 0.0); shape.len()];
    let mut by = vec![Complex64::new(0.0, 0.0); shape.len()];
    let mut bz = vec![Complex64::new(0.0, 0.0); shape.len()];

    for i in 0..shape.nx {
        for j in 0..shape.ny {
            for l in 0..shape.nz {
                let k = norm(wavevector(&shape, i, j, l));
                let element = p_phys(k, p) * 0.666_666_7
                    + p_phys(k + halfdk, p) * 0.166_666_7
                    + p_phys(k - halfdk, p).max(0.0) * 0.166_666_7;
                let sigma_cell = (0.5 * element * dk3).sqrt();
                let idx = shape.idx(i, j, l);
                let draw = |rng: &mut Pcg64| -> f64 { StandardNormal.sample(rng) };
                let (x_re, y_re, z_re) = (draw(&mut rng), draw(&mut rng), draw(&mut rng));
                let (x_im, y_im, z_im) = (draw(&mut rng), draw(&mut rng), draw(&mut rng));
                bx[idx] = Complex64::new(sigma_cell * x_re, sigma_cell * x_im);
                by[idx] = Complex64::new(sigma_cell * y_re, sigma_cell * y_im);
                bz[idx] = Complex64::new(sigma_cell * z_re, sigma_cell * z_im);
            }
        }
    }
    bx[0] = Complex64::new(0.0, 0.0);
    by[0] = Complex64::new(0.0, 0.0);
    bz[0] = Complex64::new(0.0, 0.0);

    fft::transform(&shape, &mut bx, Direction::Inverse);
    fft::transform(&shape, &mut by, Direction::Inverse);
    fft::transform(&shape, &mut bz, Direction::Inverse);

    // empirical variance of the x-component's real part, per the reference
    // implementation's single-component variance measurement.
    let v = population_variance(bx.iter().map(|c| c.re));

    for i in 0..shape.nx {
        for j in 0..shape.ny {
            for l in 0..shape.nz {
                let idx = shape.idx(i, j, l);
                let pos = shape.position(i, j, l);
                let ratio = if v > 0.0 {
                    envelope(pos, observer, p.r0, p.z0).sqrt() * p.rms / (3.0 * v).sqrt()
                } else {
                    0.0
                };
                let mut b_re = [bx[idx].re * ratio, by[idx].re * ratio, bz[idx].re * ratio];
                let mut b_im = [bx[idx].im * ratio, by[idx].im * ratio, bz[idx].im * ratio];

                let b_reg = breg.sample(pos);
                if norm(b_reg) > 0.0 {
                    let h = versor(b_reg);
                    b_re = impose_anisotropy(b_re, h, rho);
                    b_im = impose_anisotropy(b_im, h, rho);
                }

                bx[idx] = Complex64::new(b_re[0], b_im[0]);
                by[idx] = Complex64::new(b_re[1], b_im[1]);
                bz[idx] = Complex64::new(b_re[2], b_im[2]);
            }
        }
    }

    fft::transform(&shape, &mut bx, Direction::Forward);
    fft::transform(&shape, &mut by, Direction::Forward);
    fft::transform(&shape, &mut bz, Direction::Forward);

    for i in 0..shape.nx {
        for j in 0..shape.ny {
            for l in 0..shape.nz {
                let idx = shape.idx(i, j, l);
                let kvec = wavevector(&shape, i, j, l);
                let b_re = [bx[idx].re, by[idx].re, bz[idx].re];
                let b_im = [bx[idx].im, by[idx].im, bz[idx].im];
                let b_re = gram_schmidt(kvec, b_re);
                let b_im = gram_schmidt(kvec, b_im);
                bx[idx] = Complex64::new(b_re[0], b_im[0]);
                by[idx] = Complex64::new(b_re[1], b_im[1]);
                bz[idx] = Complex64::new(b_re[2], b_im[2]);
            }
        }
    }
    bx[0] = Complex64::new(0.0, 0.0);
    by[0] = Complex64::new(0.0, 0.0);
    bz[0] = Complex64::new(0.0, 0.0);

    fft::transform(&shape, &mut bx, Direction::Inverse);
    fft::transform(&shape, &mut by, Direction::Inverse);
    fft::transform(&shape, &mut bz, Direction::Inverse);

    let n = shape.len() as f64;
    let mut grid = VectorGrid::zeros(shape);
    for i in 0..shape.nx {
        for j in 0..shape.ny {
            for k in 0..shape.nz {
                let idx = shape.idx(i, j, k);
                grid.set(i, j, k, [bx[idx].re / n, by[idx].re / n, bz[idx].re / n]);
            }
        }
    }
    Ok(grid)
}

/// Replaces `b` by `versor(b_par*rho + b_perp*(1-rho)) * ||b||`, where `h` is
/// the unit vector of the regular background field at this cell.
fn impose_anisotropy(b: [f64; 3], h: [f64; 3], rho: f64) -> [f64; 3] {
    let len = norm(b);
    if len == 0.0 {
        return b;
    }
    let b_par = scale(h, dot(h, b));
    let b_perp = sub(b, b_par);
    let mixed = [
        b_par[0] * rho + b_perp[0] * (1.0 - rho),
        b_par[1] * rho + b_perp[1] * (1.0 - rho),
        b_par[2] * rho + b_perp[2] * (1.0 - rho),
    ];
    scale(versor(mixed), len)
}

/// One Gram-Schmidt step projecting `b` onto the plane perpendicular to `k`.
fn gram_schmidt(k: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    let k2 = dot(k, k);
    if k2 == 0.0 {
        return [0.0; 3];
    }
    let coeff = dot(k, b) / k2;
    sub(b, scale(k, coeff))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_shape() -> GridShape {
        GridShape::new(16, 16, 16, -8.0, 8.0, -8.0, 8.0, -8.0, 8.0).unwrap()
    }

    #[test]
    fn reproducible_for_same_seed() {
        let shape = test_shape();
        let p = RandomFieldParams {
            rms: 2.0,
            k0: 1.0,
            a0: 1.7,
            r0: 8.0,
            z0: 1.0,
            seed: 42,
        };
        let g1 = synthesize_scalar(shape, &p, [8.0, 0.0, 0.0]);
        let g2 = synthesize_scalar(shape, &p, [8.0, 0.0, 0.0]);
        assert_eq!(g1.as_slice(), g2.as_slice());
    }

    #[test]
    fn different_seed_differs() {
        let shape = test_shape();
        let mut p = RandomFieldParams {
            rms: 2.0,
            k0: 1.0,
            a0: 1.7,
            r0: 8.0,
            z0: 1.0,
            seed: 1,
        };
        let g1 = synthesize_scalar(shape, &p, [8.0, 0.0, 0.0]);
        p.seed = 2;
        let g2 = synthesize_scalar(shape, &p, [8.0, 0.0, 0.0]);
        assert_ne!(g1.as_slice(), g2.as_slice());
    }

    #[test]
    fn vector_field_is_approximately_divergence_free() {
        let shape = GridShape::new(24, 24, 24, -8.0, 8.0, -8.0, 8.0, -8.0, 8.0).unwrap();
        let p = RandomFieldParams {
            rms: 1.0,
            k0: 1.0,
            a0: 1.7,
            r0: 8.0,
            z0: 1.0,
            seed: 7,
        };
        let breg = VectorField::Analytic(crate::field::RegularMagneticModel::Verify {
            b: [1.0, 0.0, 0.0],
        });
        let grid = synthesize_vector(shape, &p, 0.5, &breg, [8.0, 0.0, 0.0]).unwrap();

        // re-transform to k-space and check k.b is negligible relative to |b|
        let mut bx: Vec<Complex64> = Vec::with_capacity(shape.len());
        let mut by: Vec<Complex64> = Vec::with_capacity(shape.len());
        let mut bz: Vec<Complex64> = Vec::with_capacity(shape.len());
        for i in 0..shape.nx {
            for j in 0..shape.ny {
                for k in 0..shape.nz {
                    let v = grid.get(i, j, k);
                    bx.push(Complex64::new(v[0], 0.0));
                    by.push(Complex64::new(v[1], 0.0));
                    bz.push(Complex64::new(v[2], 0.0));
                }
            }
        }
        fft::transform(&shape, &mut bx, Direction::Forward);
        fft::transform(&shape, &mut by, Direction::Forward);
        fft::transform(&shape, &mut bz, Direction::Forward);

        for i in 0..shape.nx {
            for j in 0..shape.ny {
                for l in 0..shape.nz {
                    if i == 0 && j == 0 && l == 0 {
                        continue;
                    }
                    let idx = shape.idx(i, j, l);
                    let kvec = wavevector(&shape, i, j, l);
                    let b = [bx[idx].re, by[idx].re, bz[idx].re];
                    let bn = norm(b);
                    if bn < 1e-12 {
                        continue;
                    }
                    // Gram-Schmidt projects the full complex k-space vector orthogonal to
                    // `kvec`; since `kvec` is real this holds separately for the real and
                    // imaginary parts, so the residual here should sit at floating-point
                    // noise, not merely "small" -- a residual anywhere near 1e-3 would mean
                    // the projection itself is wrong, not just imprecise.
                    let residual = dot(kvec, b).abs() / (norm(kvec) * bn);
                    assert!(residual < 1e-9, "residual {} too large", residual);
                }
            }
        }
    }

    /// Spec property 7 (spec.md §8: empirical rms within 5% of the requested
    /// sigma on a 128^3 grid). The rescale step divides by the exact sample
    /// variance of the unscaled field (`population_variance`), so it is an
    /// analytic normalisation, not a statistical one -- the only slack left
    /// is the envelope's deviation from uniform across the box. With
    /// `r0 = z0 = 1000` against a box half-width of 8, that deviation is
    /// `O(8/1000) ~ 0.8%`, so a correct implementation should clear a much
    /// tighter bound than the spec's 5%/128^3 figure even on the much
    /// smaller grid used here (kept small for test speed, per spec.md §9's
    /// own allowance to substitute a smaller grid for iteration speed).
    #[test]
    fn empirical_rms_matches_requested_sigma_scalar() {
        let shape = GridShape::new(32, 32, 32, -8.0, 8.0, -8.0, 8.0, -8.0, 8.0).unwrap();
        let p = RandomFieldParams {
            rms: 2.0,
            k0: 1.0,
            a0: 1.7,
            r0: 1000.0,
            z0: 1000.0,
            seed: 99,
        };
        let grid = synthesize_scalar(shape, &p, [0.0, 0.0, 0.0]);
        let values = grid.as_slice();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        let rms = var.sqrt();
        assert!(
            (rms - p.rms).abs() / p.rms < 0.02,
            "empirical rms {} vs requested sigma {}",
            rms,
            p.rms
        );
    }

    /// See `empirical_rms_matches_requested_sigma_scalar` for the tolerance
    /// rationale; the vector rescale divides by the same kind of exact
    /// sample variance (of the `x` component, per SPEC_FULL.md §4.2 step 4),
    /// so the same near-uniform-envelope argument applies.
    #[test]
    fn empirical_rms_matches_requested_sigma_vector() {
        let shape = GridShape::new(24, 24, 24, -8.0, 8.0, -8.0, 8.0, -8.0, 8.0).unwrap();
        let p = RandomFieldParams {
            rms: 2.0,
            k0: 1.0,
            a0: 1.7,
            r0: 1000.0,
            z0: 1000.0,
            seed: 7,
        };
        let breg = VectorField::Zero;
        let grid = synthesize_vector(shape, &p, 0.5, &breg, [0.0, 0.0, 0.0]).unwrap();

        let mut sum_sq = 0.0;
        let n = shape.len() as f64;
        for i in 0..shape.nx {
            for j in 0..shape.ny {
                for k in 0..shape.nz {
                    sum_sq += dot(grid.get(i, j, k), grid.get(i, j, k));
                }
            }
        }
        let rms = (sum_sq / n).sqrt();
        assert!(
            (rms - p.rms).abs() / p.rms < 0.03,
            "empirical vector rms {} vs requested sigma {}",
            rms,
            p.rms
        );
    }

    #[test]
    fn rejects_anisotropy_out_of_range() {
        let shape = test_shape();
        let p = RandomFieldParams {
            rms: 1.0,
            k0: 1.0,
            a0: 1.7,
            r0: 8.0,
            z0: 1.0,
            seed: 1,
        };
        let breg = VectorField::Zero;
        assert!(synthesize_vector(shape, &p, 1.5, &breg, [8.0, 0.0, 0.0]).is_err());
    }
}
