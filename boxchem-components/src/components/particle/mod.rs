//! Particle-resolved aerosol microphysics.
//!
//! The adapter owns one [`ParticleEngine`] per domain element and treats the
//! shared domain state as authoritative for the environment: temperature
//! and pressure are pulled before every advance, and the engine's derived
//! mass and number concentrations are pushed back afterwards.
//!
//! [`MonteCarloPopulation`] is the reference engine. It tracks a sample of
//! computational particles in a finite volume and applies nucleation,
//! coagulation, emission, dilution and background mixing stochastically
//! on its own internal time step.

mod adapter;
mod population;

pub use adapter::{ParticleMicrophysics, ParticleMicrophysicsConfig};
pub use population::{
    AerosolSpecies, Coagulation, Dilution, MonteCarloPopulation, Nucleation, ParticleMode,
    ParticleSource, PopulationConfig,
};

use boxchem_core::errors::BoxModelResult;
use std::fmt::Debug;

/// Contract between the particle adapter and a particle engine.
///
/// Species indices are fixed for the lifetime of the engine.
pub trait ParticleEngine: Debug {
    /// Names of the aerosol species the engine tracks.
    fn species(&self) -> &[String];

    /// Environment for the next call to [`ParticleEngine::advance`].
    fn set_environment(&mut self, temperature_k: f64, pressure_pa: f64) -> BoxModelResult<()>;

    /// Advances the population by `dt_s` seconds.
    fn advance(&mut self, dt_s: f64) -> BoxModelResult<()>;

    /// Particle number concentration.
    ///
    /// unit: m-3
    fn number_concentration(&self) -> f64;

    /// Mass concentration of each species, indexed like
    /// [`ParticleEngine::species`].
    ///
    /// unit: kg m-3
    fn mass_concentrations(&self) -> Vec<f64>;
}
