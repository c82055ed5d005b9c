//! Core simulation engine for an all-sky Galactic radio map: a Fourier-space
//! stochastic field synthesiser, rectilinear grid samplers, cosmic-ray
//! synchrotron emissivity, and the line-of-sight shell integrator that ties
//! them together into dispersion-measure, Faraday-depth, and Stokes I/Q/U
//! maps.

#[macro_use]
extern crate error_chain;

pub mod config;
pub mod consts;
pub mod cre;
pub mod errors;
pub mod fft;
pub mod field;
pub mod grid;
pub mod integrator;
pub mod map;
pub mod pipeline;
pub mod shell;
pub mod stochastic;
pub mod vecmath;
