//! Orchestrates one end-to-end run: assemble grids and field providers from
//! [`Settings`], invoke the stochastic synthesiser for any requested random
//! field, then walk the shells once for DM/FD and once more per requested
//! synchrotron frequency. Construction order mirrors the reference
//! implementation's `Pipeline`: regular fields before random fields (the
//! random magnetic field needs the regular one for anisotropy), and both
//! before the integrator.

use std::sync::Arc;

use log::{debug, info};

use crate::config::{
    CreConfig, GridIoConfig, RegularElectronConfig, RegularMagneticConfig, Settings, ShellConfig,
};
use crate::consts::{GEV, GHZ, KPC};
use crate::cre::{AnalyticCre, CreField};
use crate::errors::*;
use crate::field::{RegularElectronModel, RegularMagneticModel, ScalarField, VectorField};
use crate::grid::{Grid, GridShape, VectorGrid};
use crate::integrator::{self, FieldSet, IntegratorParams};
use crate::shell::{self, ShellPlan};
use crate::stochastic::{self, RandomFieldParams};

/// Assembled field providers plus the settings they were built from.
pub struct Pipeline {
    pub settings: Settings,
    pub fereg: ScalarField,
    pub breg: VectorField,
    pub fernd: ScalarField,
    pub brnd: VectorField,
    pub cre: CreField,
}

/// Output of one synchrotron frequency pass.
pub struct SyncOutput {
    pub filename: String,
    pub freq_hz: f64,
    pub is: Vec<f64>,
    pub qs: Vec<f64>,
    pub us: Vec<f64>,
}

/// Output of a full pipeline run.
pub struct RunOutput {
    pub nside_sim: usize,
    pub dm: Option<Vec<f64>>,
    pub fd: Option<Vec<f64>>,
    pub sync: Vec<SyncOutput>,
}

impl Pipeline {
    /// `assemble_fereg` -> `assemble_breg` -> `assemble_fernd` ->
    /// `assemble_brnd` -> `assemble_cre`. Each field consults its
    /// `Fieldout.*_grid` toggle first: `read` loads a previously persisted
    /// grid instead of evaluating the analytic model / re-running the
    /// synthesiser, and `write` persists whatever grid the field ends up
    /// using (the analytic model resampled onto the grid, or the freshly
    /// synthesised one) to `filename`.
    pub fn assemble(settings: Settings) -> Result<Pipeline> {
        let observer = scale3(settings.observer, KPC);

        let fereg_shape = settings.grids.fereg.to_shape()?;
        let fereg = match cached_scalar_grid(&settings.fieldout.fereg_grid, fereg_shape)? {
            Some(grid) => {
                info!("reading regular electron-density field from cached grid");
                ScalarField::Gridded(Arc::new(grid))
            }
            None => {
                info!("assembling regular electron-density field");
                ScalarField::Analytic(regular_electron_model(&settings.free_electron.regular))
            }
        };
        write_scalar_grid_if_requested(&settings.fieldout.fereg_grid, fereg_shape, &fereg)?;

        let breg_shape = settings.grids.breg.to_shape()?;
        let breg = match cached_vector_grid(&settings.fieldout.breg_grid, breg_shape)? {
            Some(grid) => {
                info!("reading regular magnetic field from cached grid");
                VectorField::Gridded(Arc::new(grid))
            }
            None => {
                info!("assembling regular magnetic field");
                VectorField::Analytic(regular_magnetic_model(&settings.magnetic_field.regular))
            }
        };
        write_vector_grid_if_requested(&settings.fieldout.breg_grid, breg_shape, &breg)?;

        let fernd_shape = settings.grids.fernd.to_shape()?;
        let fernd = match cached_scalar_grid(&settings.fieldout.fernd_grid, fernd_shape)? {
            Some(grid) => {
                info!("reading random electron-density field from cached grid");
                ScalarField::Gridded(Arc::new(grid))
            }
            None => match &settings.free_electron.random {
                Some(cfg) => {
                    info!("synthesising random electron-density field, seed={}", cfg.seed);
                    let params = RandomFieldParams {
                        rms: cfg.rms,
                        k0: cfg.k0,
                        a0: cfg.a0,
                        r0: cfg.r0 * KPC,
                        z0: cfg.z0 * KPC,
                        seed: cfg.seed,
                    };
                    let grid = stochastic::synthesize_scalar(fernd_shape, &params, observer);
                    ScalarField::Gridded(Arc::new(grid))
                }
                None => {
                    debug!("no random electron-density field requested");
                    ScalarField::Zero
                }
            },
        };
        write_scalar_grid_if_requested(&settings.fieldout.fernd_grid, fernd_shape, &fernd)?;

        let brnd_shape = settings.grids.brnd.to_shape()?;
        let brnd = match cached_vector_grid(&settings.fieldout.brnd_grid, brnd_shape)? {
            Some(grid) => {
                info!("reading random magnetic field from cached grid");
                VectorField::Gridded(Arc::new(grid))
            }
            None => match &settings.magnetic_field.random {
                Some(cfg) => {
                    info!(
                        "synthesising random magnetic field, seed={}, rho={}",
                        cfg.seed, cfg.rho
                    );
                    let params = RandomFieldParams {
                        rms: cfg.rms,
                        k0: cfg.k0,
                        a0: cfg.a0,
                        r0: cfg.r0 * KPC,
                        z0: cfg.z0 * KPC,
                        seed: cfg.seed,
                    };
                    let grid =
                        stochastic::synthesize_vector(brnd_shape, &params, cfg.rho, &breg, observer)?;
                    VectorField::Gridded(Arc::new(grid))
                }
                None => {
                    debug!("no random magnetic field requested");
                    VectorField::Zero
                }
            },
        };
        write_vector_grid_if_requested(&settings.fieldout.brnd_grid, brnd_shape, &brnd)?;

        let cre = match &settings.cre {
            Some(cfg) => {
                info!("assembling analytic cosmic-ray electron spectrum");
                CreField::Analytic(analytic_cre(cfg))
            }
            None => {
                debug!("no cosmic-ray electron spectrum requested");
                CreField::Zero
            }
        };

        Ok(Pipeline {
            settings,
            fereg,
            breg,
            fernd,
            brnd,
            cre,
        })
    }

    /// `assemble_obs`: one DM/FD pass, then one pass per enabled
    /// synchrotron frequency.
    pub fn run(&self) -> Result<RunOutput> {
        let obsout = &self.settings.obsout;
        let observer = scale3(self.settings.observer, KPC);
        let plan = shell_plan(&obsout.shells);
        let shells = shell::build_shells(&plan, obsout.ec_r_max * KPC, obsout.radial_res * KPC)?;

        let fields = FieldSet {
            breg: &self.breg,
            brnd: &self.brnd,
            fereg: &self.fereg,
            fernd: &self.fernd,
            cre: &self.cre,
        };

        let base_params = IntegratorParams {
            observer,
            gc_r_max: obsout.gc_r_max * KPC,
            gc_z_max: obsout.gc_z_max * KPC,
            lat_lim: obsout.lat_lim_deg.to_radians(),
            freq_hz: 0.0,
            do_sync: false,
        };

        info!("running DM/FD pass over {} shells", shells.len());
        let base_maps = integrator::walk(&shells, obsout.nside_sim, &fields, &base_params)?;
        let dm = obsout.do_dm.then(|| base_maps.dm.clone());
        let fd = obsout.do_fd.then(|| base_maps.fd.clone());

        let mut sync = Vec::new();
        for cfg in &obsout.sync {
            if !cfg.enable {
                debug!("synchrotron output '{}' disabled, skipping", cfg.filename);
                continue;
            }
            info!(
                "running synchrotron pass at {} GHz ('{}')",
                cfg.freq_ghz, cfg.filename
            );
            let params = IntegratorParams {
                freq_hz: cfg.freq_ghz * GHZ,
                do_sync: true,
                ..base_params
            };
            let maps = integrator::walk(&shells, obsout.nside_sim, &fields, &params)?;
            sync.push(SyncOutput {
                filename: cfg.filename.clone(),
                freq_hz: params.freq_hz,
                is: maps.is,
                qs: maps.qs,
                us: maps.us,
            });
        }

        Ok(RunOutput {
            nside_sim: obsout.nside_sim,
            dm,
            fd,
            sync,
        })
    }
}

fn scale3(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// If `io.read` is set, loads a scalar grid from `io.filename` at `shape`;
/// otherwise returns `None` so the caller falls back to its own construction
/// (analytic model or synthesis).
fn cached_scalar_grid(io: &Option<GridIoConfig>, shape: GridShape) -> Result<Option<Grid>> {
    match io {
        Some(cfg) if cfg.read => Ok(Some(Grid::read_raw(&cfg.filename, shape)?)),
        _ => Ok(None),
    }
}

/// As [`cached_scalar_grid`], for vector grids.
fn cached_vector_grid(io: &Option<GridIoConfig>, shape: GridShape) -> Result<Option<VectorGrid>> {
    match io {
        Some(cfg) if cfg.read => Ok(Some(VectorGrid::read_raw(&cfg.filename, shape)?)),
        _ => Ok(None),
    }
}

/// If `io.write` is set, samples `field` onto a fresh grid of `shape` and
/// writes it to `io.filename` as the raw little-endian format of §6. A field
/// that was itself just loaded from that file round-trips harmlessly.
fn write_scalar_grid_if_requested(
    io: &Option<GridIoConfig>,
    shape: GridShape,
    field: &ScalarField,
) -> Result<()> {
    let Some(cfg) = io else { return Ok(()) };
    if !cfg.write {
        return Ok(());
    }
    info!("writing grid to {}", cfg.filename);
    let mut grid = Grid::zeros(shape);
    for i in 0..shape.nx {
        for j in 0..shape.ny {
            for k in 0..shape.nz {
                grid.set(i, j, k, field.sample(shape.position(i, j, k)));
            }
        }
    }
    grid.write_raw(&cfg.filename)
}

/// As [`write_scalar_grid_if_requested`], for vector fields/grids.
fn write_vector_grid_if_requested(
    io: &Option<GridIoConfig>,
    shape: GridShape,
    field: &VectorField,
) -> Result<()> {
    let Some(cfg) = io else { return Ok(()) };
    if !cfg.write {
        return Ok(());
    }
    info!("writing grid to {}", cfg.filename);
    let mut grid = VectorGrid::zeros(shape);
    for i in 0..shape.nx {
        for j in 0..shape.ny {
            for k in 0..shape.nz {
                grid.set(i, j, k, field.sample(shape.position(i, j, k)));
            }
        }
    }
    grid.write_raw(&cfg.filename)
}

fn shell_plan(cfg: &ShellConfig) -> ShellPlan {
    match cfg.clone() {
        ShellConfig::Auto {
            total_shell,
            nside_shell,
        } => ShellPlan::Auto {
            total_shell,
            nside_shell,
        },
        ShellConfig::Manual { stops } => ShellPlan::Manual { stops },
    }
}

fn regular_magnetic_model(cfg: &RegularMagneticConfig) -> RegularMagneticModel {
    match *cfg {
        RegularMagneticConfig::Disk { b0, pitch, z0 } => RegularMagneticModel::Disk {
            b0,
            pitch,
            z0: z0 * KPC,
        },
        RegularMagneticConfig::Verify { b } => RegularMagneticModel::Verify { b },
    }
}

fn regular_electron_model(cfg: &RegularElectronConfig) -> RegularElectronModel {
    match *cfg {
        RegularElectronConfig::Exponential { n0, r0, z0 } => RegularElectronModel::Exponential {
            n0,
            r0: r0 * KPC,
            z0: z0 * KPC,
        },
        RegularElectronConfig::Verify { n0 } => RegularElectronModel::Verify { n0 },
    }
}

fn analytic_cre(cfg: &CreConfig) -> AnalyticCre {
    AnalyticCre {
        alpha: cfg.alpha,
        beta: cfg.beta / KPC,
        theta: cfg.theta / KPC,
        r0: cfg.r0 * KPC,
        z0: cfg.z0 * KPC,
        e0: cfg.e0 * GEV,
        j0: cfg.j0,
    }
}
