//! Concentric spherical shells: the observer's sky is subdivided into
//! annular LOS segments, each walked at its own angular resolution and
//! radial quadrature grid. Shells are built once, up front, from either an
//! automatic power-of-two radial schedule or a user-specified cumulative
//! list, then processed strictly inside-out by the integrator.

use crate::errors::*;

/// One annular LOS segment and its Simpson quadrature grid.
#[derive(Debug, Clone)]
pub struct Shell {
    pub shell_idx: usize,
    pub d_start: f64,
    pub d_stop: f64,
    /// The "Delta d" used in per-point quadrature weights (`F[k] = ... * dd`);
    /// twice the spacing between consecutive `dist` points, so that the
    /// composite Simpson sum `(F[k-1] + 4*F[k] + F[k+1]) / 6` integrates
    /// correctly over each point-pair.
    pub dd: f64,
    pub step: usize,
    pub dist: Vec<f64>,
    pub nside: usize,
}

/// How the radial schedule of shells is constructed.
pub enum ShellPlan {
    /// `d_stop(s) = R_max * 2^(s-N)` for `s < N`, `d_stop(N) = R_max`; outer
    /// shells are wider and (per `nside_shell`) coarser.
    Auto { total_shell: usize, nside_shell: Vec<usize> },
    /// User-specified cumulative `(d_stop_frac, nside)` pairs, as fractions
    /// of `r_max`.
    Manual { stops: Vec<(f64, usize)> },
}

/// Builds the full shell schedule for one run.
pub fn build_shells(plan: &ShellPlan, r_max: f64, radial_res: f64) -> Result<Vec<Shell>> {
    if !(r_max > 0.0) {
        bail!(ErrorKind::Numeric("r_max must be positive".into()));
    }
    if !(radial_res > 0.0) {
        bail!(ErrorKind::Numeric("radial_res must be positive".into()));
    }

    match plan {
        ShellPlan::Auto {
            total_shell,
            nside_shell,
        } => {
            if *total_shell == 0 {
                bail!(ErrorKind::Configuration("total_shell must be positive".into()));
            }
            if nside_shell.len() != *total_shell {
                bail!(ErrorKind::Configuration(format!(
                    "nside_shell has {} entries, expected {}",
                    nside_shell.len(),
                    total_shell
                )));
            }
            let n = *total_shell;
            let mut shells = Vec::with_capacity(n);
            let mut prev_stop = 0.0;
            for s in 1..=n {
                let d_stop = if s == n {
                    r_max
                } else {
                    r_max * 2f64.powi(s as i32 - n as i32)
                };
                shells.push(make_shell(s, prev_stop, d_stop, radial_res, nside_shell[s - 1])?);
                prev_stop = d_stop;
            }
            Ok(shells)
        }
        ShellPlan::Manual { stops } => {
            if stops.is_empty() {
                bail!(ErrorKind::Configuration("manual shell plan is empty".into()));
            }
            let mut shells = Vec::with_capacity(stops.len());
            let mut prev_stop = 0.0;
            for (i, &(frac, nside)) in stops.iter().enumerate() {
                let d_stop = r_max * frac;
                shells.push(make_shell(i + 1, prev_stop, d_stop, radial_res, nside)?);
                prev_stop = d_stop;
            }
            Ok(shells)
        }
    }
}

fn make_shell(
    shell_idx: usize,
    d_start: f64,
    d_stop: f64,
    radial_res: f64,
    nside: usize,
) -> Result<Shell> {
    if !(d_start < d_stop) {
        bail!(ErrorKind::Numeric(format!(
            "shell {}: d_start ({}) must be < d_stop ({})",
            shell_idx, d_start, d_stop
        )));
    }
    let raw = ((d_stop - d_start) / radial_res).ceil() as i64;
    let mut step = raw.max(3);
    if step % 2 == 0 {
        step += 1;
    }
    let step = step as usize;

    let half_spacing = (d_stop - d_start) / (step as f64 - 1.0);
    let dd = 2.0 * half_spacing;
    let dist: Vec<f64> = (0..step).map(|k| d_start + k as f64 * half_spacing).collect();

    Ok(Shell {
        shell_idx,
        d_start,
        d_stop,
        dd,
        step,
        dist,
        nside,
    })
}
