//! TOML configuration, deserialised via `serde`/`toml` into a typed
//! [`Settings`] tree mirroring the semantic groups of the external
//! interface: grid boxes, field models, CRE, and the observation/output
//! toggles. Unknown keys are rejected so a typo in a parameter file fails
//! fast rather than being silently ignored.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::errors::*;
use crate::grid::GridShape;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridBoxConfig {
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

impl GridBoxConfig {
    /// Builds the internal [`GridShape`], converting box bounds from the
    /// configuration file's kiloparsecs into the crate's internal
    /// centimetre units (see `crate::consts`).
    pub fn to_shape(self) -> Result<GridShape> {
        let kpc = crate::consts::KPC;
        GridShape::new(
            self.nx,
            self.ny,
            self.nz,
            self.xmin * kpc,
            self.xmax * kpc,
            self.ymin * kpc,
            self.ymax * kpc,
            self.zmin * kpc,
            self.zmax * kpc,
        )
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridsConfig {
    pub breg: GridBoxConfig,
    pub brnd: GridBoxConfig,
    pub fereg: GridBoxConfig,
    pub fernd: GridBoxConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type")]
#[serde(deny_unknown_fields)]
pub enum RegularMagneticConfig {
    Disk { b0: f64, pitch: f64, z0: f64 },
    Verify { b: [f64; 3] },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type")]
#[serde(deny_unknown_fields)]
pub enum RegularElectronConfig {
    Exponential { n0: f64, r0: f64, z0: f64 },
    Verify { n0: f64 },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomVectorConfig {
    pub rms: f64,
    pub k0: f64,
    pub a0: f64,
    pub r0: f64,
    pub z0: f64,
    pub seed: u64,
    pub rho: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomScalarConfig {
    pub rms: f64,
    pub k0: f64,
    pub a0: f64,
    pub r0: f64,
    pub z0: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MagneticFieldConfig {
    pub regular: RegularMagneticConfig,
    pub random: Option<RandomVectorConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FreeElectronConfig {
    pub regular: RegularElectronConfig,
    pub random: Option<RandomScalarConfig>,
}

/// Only the analytic CRE model is implemented; its absence means no
/// synchrotron emission (`CreField::Zero`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreConfig {
    pub alpha: f64,
    pub beta: f64,
    pub theta: f64,
    pub r0: f64,
    pub z0: f64,
    pub e0: f64,
    pub j0: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    pub freq_ghz: f64,
    pub filename: String,
    pub enable: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode")]
#[serde(deny_unknown_fields)]
pub enum ShellConfig {
    Auto {
        total_shell: usize,
        nside_shell: Vec<usize>,
    },
    Manual {
        stops: Vec<(f64, usize)>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObsoutConfig {
    pub do_dm: bool,
    pub do_fd: bool,
    #[serde(default)]
    pub sync: Vec<SyncConfig>,
    pub nside_sim: usize,
    pub shells: ShellConfig,
    pub ec_r_max: f64,
    pub gc_r_max: f64,
    pub gc_z_max: f64,
    pub radial_res: f64,
    pub lat_lim_deg: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridIoConfig {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldoutConfig {
    pub breg_grid: Option<GridIoConfig>,
    pub brnd_grid: Option<GridIoConfig>,
    pub fereg_grid: Option<GridIoConfig>,
    pub fernd_grid: Option<GridIoConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub observer: [f64; 3],
    pub grids: GridsConfig,
    pub magnetic_field: MagneticFieldConfig,
    pub free_electron: FreeElectronConfig,
    pub cre: Option<CreConfig>,
    pub obsout: ObsoutConfig,
    #[serde(default)]
    pub fieldout: FieldoutConfig,
}

/// Reads and validates a parameter file at `path`.
pub fn read_parameter_file(path: impl AsRef<Path>) -> Result<Settings> {
    let text = fs::read_to_string(path.as_ref()).chain_err(|| {
        format!(
            "unable to read parameter file {}",
            path.as_ref().display()
        )
    })?;
    let settings: Settings = toml::from_str(&text).chain_err(|| "unable to parse parameter file")?;
    check_settings(&settings)?;
    Ok(settings)
}

fn check_settings(s: &Settings) -> Result<()> {
    if s.obsout.ec_r_max <= 0.0 {
        bail!(ErrorKind::Configuration(
            "obsout.ec_r_max must be positive".into()
        ));
    }
    if s.obsout.radial_res <= 0.0 {
        bail!(ErrorKind::Configuration(
            "obsout.radial_res must be positive".into()
        ));
    }
    if !(0.0..=90.0).contains(&s.obsout.lat_lim_deg) {
        bail!(ErrorKind::Configuration(
            "obsout.lat_lim_deg must be in [0, 90]".into()
        ));
    }
    if !(s.obsout.nside_sim > 0 && s.obsout.nside_sim.is_power_of_two()) {
        bail!(ErrorKind::Configuration(
            "obsout.nside_sim must be a positive power of two".into()
        ));
    }
    if let ShellConfig::Auto { nside_shell, .. } = &s.obsout.shells {
        for &n in nside_shell {
            if n == 0 || !n.is_power_of_two() {
                bail!(ErrorKind::Configuration(
                    "every entry of obsout.shells.nside_shell must be a power of two".into()
                ));
            }
        }
    }
    if let Some(rnd) = s.magnetic_field.random {
        if !(0.0..=1.0).contains(&rnd.rho) {
            bail!(ErrorKind::Configuration(format!(
                "magnetic_field.random.rho must be in [0,1], got {}",
                rnd.rho
            )));
        }
    }
    for sync in &s.obsout.sync {
        if sync.freq_ghz <= 0.0 {
            bail!(ErrorKind::Configuration(
                "obsout.sync[].freq_ghz must be positive".into()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
        observer = [8.5, 0.0, 0.0]

        [grids.breg]
        nx = 4
        ny = 4
        nz = 4
        xmin = -10.0
        xmax = 10.0
        ymin = -10.0
        ymax = 10.0
        zmin = -2.0
        zmax = 2.0

        [grids.brnd]
        nx = 4
        ny = 4
        nz = 4
        xmin = -10.0
        xmax = 10.0
        ymin = -10.0
        ymax = 10.0
        zmin = -2.0
        zmax = 2.0

        [grids.fereg]
        nx = 4
        ny = 4
        nz = 4
        xmin = -10.0
        xmax = 10.0
        ymin = -10.0
        ymax = 10.0
        zmin = -2.0
        zmax = 2.0

        [grids.fernd]
        nx = 4
        ny = 4
        nz = 4
        xmin = -10.0
        xmax = 10.0
        ymin = -10.0
        ymax = 10.0
        zmin = -2.0
        zmax = 2.0

        [magnetic_field.regular]
        type = "Verify"
        b = [1.0e-6, 0.0, 0.0]

        [free_electron.regular]
        type = "Verify"
        n0 = 0.1

        [obsout]
        do_dm = true
        do_fd = true
        nside_sim = 8
        ec_r_max = 10.0
        gc_r_max = 20.0
        gc_z_max = 5.0
        radial_res = 0.2
        lat_lim_deg = 5.0

        [obsout.shells]
        mode = "Auto"
        total_shell = 2
        nside_shell = [4, 8]
        "#
    }

    #[test]
    fn parses_minimal_document() {
        let s: Settings = toml::from_str(minimal_toml()).unwrap();
        check_settings(&s).unwrap();
        assert_eq!(s.grids.breg.nx, 4);
        assert!(matches!(
            s.magnetic_field.regular,
            RegularMagneticConfig::Verify { .. }
        ));
    }

    #[test]
    fn rejects_unknown_field() {
        let bad = minimal_toml().replace("do_dm = true", "do_dm = true\nbogus = 1");
        let res: std::result::Result<Settings, toml::de::Error> = toml::from_str(&bad);
        assert!(res.is_err());
    }

    #[test]
    fn rejects_non_power_of_two_nside_sim() {
        let bad = minimal_toml().replace("nside_sim = 8", "nside_sim = 7");
        let s: Settings = toml::from_str(&bad).unwrap();
        assert!(check_settings(&s).is_err());
    }
}
