//! The shell walker: Simpson-rule quadrature along radial rays, shell by
//! shell, compositing each shell's working maps into the full-resolution
//! output maps. Per-pixel work within one shell is independent and runs
//! across all worker threads; shells themselves are walked strictly
//! inside-out because the Faraday rotation angle at any point depends on
//! the accumulated Faraday depth carried in from every shell closer to the
//! observer.

use log::debug;
use rayon::prelude::*;

use crate::consts::{C_LIGHT, KB, QE};
use crate::errors::*;
use crate::field::{los_components, ScalarField, VectorField};
use crate::map::Map;
use crate::shell::Shell;
use crate::vecmath::{add, los_unit_vec, north_east_basis, scale};

/// `e^3 / (2*pi*(m_e*c^2)^2)`, the Faraday-depth forefactor (with its sign
/// folded in); see `crate::consts` for the underlying physical constants.
fn fd_forefactor() -> f64 {
    -QE.powi(3) / (2.0 * std::f64::consts::PI * crate::consts::MEC2.powi(2))
}

/// Per-pixel accumulator: dispersion measure, Faraday depth, and the Stokes
/// synchrotron triple.
#[derive(Debug, Clone, Copy, Default)]
pub struct Observables {
    pub dm: f64,
    pub fd: f64,
    pub is: f64,
    pub qs: f64,
    pub us: f64,
}

/// The field providers a ray samples at every quadrature point.
pub struct FieldSet<'a> {
    pub breg: &'a VectorField,
    pub brnd: &'a VectorField,
    pub fereg: &'a ScalarField,
    pub fernd: &'a ScalarField,
    pub cre: &'a crate::cre::CreField,
}

/// Run-wide constants that do not vary per shell or per pixel.
#[derive(Debug, Clone, Copy)]
pub struct IntegratorParams {
    pub observer: [f64; 3],
    pub gc_r_max: f64,
    pub gc_z_max: f64,
    pub lat_lim: f64,
    pub freq_hz: f64,
    /// Whether to evaluate the (expensive) synchrotron emissivity and
    /// polarization angle at all; dispersion measure and Faraday depth are
    /// always computed since the rotation angle needs the latter regardless.
    pub do_sync: bool,
}

/// Walks one ray (fixed pixel direction) through one shell's quadrature
/// grid, accumulating Observables via composite Simpson's rule.
fn radial_integration(
    shell: &Shell,
    direction: (f64, f64),
    fields: &FieldSet,
    params: &IntegratorParams,
    fd_carry: f64,
) -> Result<Observables> {
    let (theta, phi) = direction;
    if (std::f64::consts::FRAC_PI_2 - theta).abs() < params.lat_lim {
        return Ok(Observables::default());
    }

    let los = los_unit_vec(theta, phi);
    let (north, east) = north_east_basis(theta, phi);

    let mut f_dm = vec![0.0; shell.step];
    let mut f_fd = vec![0.0; shell.step];
    let mut f_jtot = vec![0.0; shell.step];
    let mut f_jpol = vec![0.0; shell.step];
    let mut psi_int = vec![0.0; shell.step];
    let mut valid = vec![false; shell.step];

    let rj_factor = C_LIGHT * C_LIGHT / (2.0 * KB * params.freq_hz * params.freq_hz);

    for k in 0..shell.step {
        let pos_ec = scale(los, shell.dist[k]);
        let pos_gc = add(pos_ec, params.observer);
        if crate::vecmath::norm(pos_gc) > params.gc_r_max || pos_gc[2].abs() > params.gc_z_max {
            break;
        }
        valid[k] = true;

        let b = add(fields.breg.sample(pos_gc), fields.brnd.sample(pos_gc));
        let n_e = (fields.fereg.sample(pos_gc) + fields.fernd.sample(pos_gc)).max(0.0);
        let (b_par, b_perp) = los_components(b, los);

        f_dm[k] = n_e * shell.dd;
        f_fd[k] = n_e * b_par * fd_forefactor() * shell.dd;

        if params.do_sync {
            let j_tot =
                fields
                    .cre
                    .emissivity_total(pos_gc, params.observer, b_perp, params.freq_hz);
            let j_pol =
                fields
                    .cre
                    .emissivity_polarized(pos_gc, params.observer, b_perp, params.freq_hz);
            f_jtot[k] = j_tot * shell.dd * rj_factor;
            f_jpol[k] = j_pol * shell.dd * rj_factor;

            let b_sky = crate::vecmath::sub(b, scale(los, b_par));
            let b_n = crate::vecmath::dot(b_sky, north);
            let b_e = crate::vecmath::dot(b_sky, east);
            psi_int[k] = b_e.atan2(b_n);
        }
    }

    let mut obs = Observables::default();
    let mut fd_partial = 0.0;
    let lambda = C_LIGHT / params.freq_hz;
    let mut k = 1;
    while k + 1 < shell.step {
        if !(valid[k - 1] && valid[k] && valid[k + 1]) {
            break;
        }
        obs.dm += (f_dm[k - 1] + 4.0 * f_dm[k] + f_dm[k + 1]) / 6.0;
        let fd_increment = (f_fd[k - 1] + 4.0 * f_fd[k] + f_fd[k + 1]) / 6.0;
        obs.fd += fd_increment;
        fd_partial += fd_increment;

        if params.do_sync {
            obs.is += (f_jtot[k - 1] + 4.0 * f_jtot[k] + f_jtot[k + 1]) / 6.0;
            let jpol_inc = (f_jpol[k - 1] + 4.0 * f_jpol[k] + f_jpol[k + 1]) / 6.0;
            let psi = (fd_carry + fd_partial) * lambda * lambda + psi_int[k];
            if psi.abs() > 1.0e30 {
                bail!(ErrorKind::Numeric(format!(
                    "Faraday rotation angle diverged: {}",
                    psi
                )));
            }
            obs.qs += (2.0 * psi).cos() * jpol_inc;
            obs.us += (2.0 * psi).sin() * jpol_inc;
        }
        k += 2;
    }

    Ok(obs)
}

/// Full-resolution output maps, one entry per observable.
#[derive(Debug, Clone)]
pub struct FullMaps {
    pub nside: usize,
    pub dm: Vec<f64>,
    pub fd: Vec<f64>,
    pub is: Vec<f64>,
    pub qs: Vec<f64>,
    pub us: Vec<f64>,
}

impl FullMaps {
    fn zeros(npix: usize, nside: usize) -> FullMaps {
        FullMaps {
            nside,
            dm: vec![0.0; npix],
            fd: vec![0.0; npix],
            is: vec![0.0; npix],
            qs: vec![0.0; npix],
            us: vec![0.0; npix],
        }
    }
}

/// Runs every shell, inside-out, compositing each into the full-resolution
/// maps as it completes.
pub fn walk(
    shells: &[Shell],
    sim_nside: usize,
    fields: &FieldSet,
    params: &IntegratorParams,
) -> Result<FullMaps> {
    let sim_map = Map::new(sim_nside)?;
    let mut full = FullMaps::zeros(sim_map.npix(), sim_nside);

    for shell in shells {
        debug!(
            "shell {}: d_start={:.3e} d_stop={:.3e} step={} nside={}",
            shell.shell_idx, shell.d_start, shell.d_stop, shell.step, shell.nside
        );
        let shell_map = Map::new(shell.nside)?;
        let npix = shell_map.npix();

        let shell_obs: Vec<Observables> = (0..npix)
            .into_par_iter()
            .map(|pix| {
                let direction = shell_map.pix2ang(pix);
                let fd_carry = sim_map.interpolate(direction, &full.fd);
                radial_integration(shell, direction, fields, params, fd_carry)
            })
            .collect::<Result<Vec<Observables>>>()?;

        let dm: Vec<f64> = shell_obs.iter().map(|o| o.dm).collect();
        let fd: Vec<f64> = shell_obs.iter().map(|o| o.fd).collect();
        let is: Vec<f64> = shell_obs.iter().map(|o| o.is).collect();
        let qs: Vec<f64> = shell_obs.iter().map(|o| o.qs).collect();
        let us: Vec<f64> = shell_obs.iter().map(|o| o.us).collect();

        for p in 0..full.dm.len() {
            let direction = sim_map.pix2ang(p);
            full.dm[p] += shell_map.interpolate(direction, &dm);
            full.fd[p] += shell_map.interpolate(direction, &fd);
            full.is[p] += shell_map.interpolate(direction, &is);
            full.qs[p] += shell_map.interpolate(direction, &qs);
            full.us[p] += shell_map.interpolate(direction, &us);
        }
    }

    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cre::CreField;
    use crate::field::RegularElectronModel;
    use crate::shell::ShellPlan;

    fn sync_off_params(r_max: f64) -> IntegratorParams {
        IntegratorParams {
            observer: [0.0, 0.0, 0.0],
            gc_r_max: r_max * 2.0,
            gc_z_max: r_max * 2.0,
            lat_lim: 0.0,
            freq_hz: 1.4e9,
            do_sync: false,
        }
    }

    #[test]
    fn empty_fields_produce_zero_maps() {
        let r_max = 10.0 * crate::consts::KPC;
        let plan = ShellPlan::Auto {
            total_shell: 1,
            nside_shell: vec![4],
        };
        let shells = crate::shell::build_shells(&plan, r_max, r_max / 20.0).unwrap();
        let fields = FieldSet {
            breg: &VectorField::Zero,
            brnd: &VectorField::Zero,
            fereg: &ScalarField::Zero,
            fernd: &ScalarField::Zero,
            cre: &CreField::Zero,
        };
        let params = sync_off_params(r_max);
        let maps = walk(&shells, 4, &fields, &params).unwrap();
        assert!(maps.dm.iter().all(|&v| v == 0.0));
        assert!(maps.fd.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn uniform_density_gives_linear_dm() {
        let r_max = 10.0 * crate::consts::KPC;
        let plan = ShellPlan::Auto {
            total_shell: 1,
            nside_shell: vec![4],
        };
        let shells = crate::shell::build_shells(&plan, r_max, r_max / 50.0).unwrap();
        let n0 = 0.1;
        let fereg = ScalarField::Analytic(RegularElectronModel::Verify { n0 });
        let fields = FieldSet {
            breg: &VectorField::Zero,
            brnd: &VectorField::Zero,
            fereg: &fereg,
            fernd: &ScalarField::Zero,
            cre: &CreField::Zero,
        };
        let params = sync_off_params(r_max);
        let maps = walk(&shells, 4, &fields, &params).unwrap();
        let want = n0 * r_max;
        for &dm in &maps.dm {
            assert!((dm - want).abs() / want < 1e-3, "{} vs {}", dm, want);
        }
        assert!(maps.fd.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn uniform_b_field_gives_nonzero_fd_with_expected_sign() {
        use crate::field::RegularMagneticModel;
        let r_max = 10.0 * crate::consts::KPC;
        let plan = ShellPlan::Auto {
            total_shell: 1,
            nside_shell: vec![8],
        };
        let shells = crate::shell::build_shells(&plan, r_max, r_max / 50.0).unwrap();
        let n0 = 0.1;
        let fereg = ScalarField::Analytic(RegularElectronModel::Verify { n0 });
        let breg = VectorField::Analytic(RegularMagneticModel::Verify {
            b: [1.0e-6, 0.0, 0.0],
        });
        let fields = FieldSet {
            breg: &breg,
            brnd: &VectorField::Zero,
            fereg: &fereg,
            fernd: &ScalarField::Zero,
            cre: &CreField::Zero,
        };
        let params = sync_off_params(r_max);
        let map = Map::new(4).unwrap();
        let maps = walk(&shells, 4, &fields, &params).unwrap();

        // at longitude phi=0 (toward +x, parallel to B) |FD| should be
        // near its maximum and negative (positive B_par, positive n_e).
        let equator_pix = map.ang2pix(std::f64::consts::FRAC_PI_2, 0.0);
        assert!(maps.fd[equator_pix] < 0.0);

        // at longitude phi=pi/2 (perpendicular to B) FD should be small.
        let perp_pix = map.ang2pix(std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2);
        assert!(maps.fd[perp_pix].abs() < maps.fd[equator_pix].abs());
    }
}
