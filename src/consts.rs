//! Physical constants in the CGS-Gaussian unit system used throughout the
//! crate. Position coordinates are stored in centimetres; callers working in
//! kiloparsecs should multiply by [`KPC`] before handing positions to a
//! [`Grid`](crate::grid::Grid).

/// 2*pi, used constantly in Fourier-space bookkeeping.
pub const TWOPI: f64 = std::f64::consts::PI * 2.0;

/// One kiloparsec in centimetres.
pub const KPC: f64 = 3.0856775814671916e21;

/// One microgauss, in Gauss (the internal field unit).
pub const MICROGAUSS: f64 = 1.0e-6;

/// One gigahertz, in Hz.
pub const GHZ: f64 = 1.0e9;

/// One GeV, in erg.
pub const GEV: f64 = 1.602176634e-3;

/// Speed of light, cm/s.
pub const C_LIGHT: f64 = 2.99792458e10;

/// Electron rest mass energy, erg (511 keV).
pub const MEC2: f64 = 8.187105776823886e-7;

/// Electron rest mass times the speed of light, g*cm/s.
pub const MEC: f64 = MEC2 / C_LIGHT;

/// Elementary charge, esu (statcoulomb).
pub const QE: f64 = 4.80320425e-10;

/// Boltzmann constant, erg/K.
pub const KB: f64 = 1.380649e-16;
