use super::ParticleEngine;
use crate::constants::REFERENCE_TEMPERATURE;
use boxchem_core::errors::{BoxModelError, BoxModelResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution as _, Poisson};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::f64::consts::PI;
use tracing::{debug, trace};

const NAME: &str = "particle microphysics";

/// Volume used when there are no initial particles to size it from.
///
/// unit: m3
const DEFAULT_VOLUME: f64 = 1.0e-6;

fn default_maximum_particles() -> usize {
    2000
}

fn default_time_step() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AerosolSpecies {
    pub name: String,
    /// unit: kg m-3
    pub density: f64,
}

/// Particles sharing one diameter and composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleMode {
    /// unit: m-3
    #[serde(rename = "number concentration")]
    pub number_concentration: f64,
    /// unit: m
    pub diameter: f64,
    /// Mass fraction of each species, normalized when the population is built.
    pub composition: BTreeMap<String, f64>,
}

/// Continuous source of particles of one diameter and composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSource {
    /// unit: m-3 s-1
    pub rate: f64,
    /// unit: m
    pub diameter: f64,
    pub composition: BTreeMap<String, f64>,
}

/// New particles of a single species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nucleation {
    /// unit: m-3 s-1
    pub rate: f64,
    /// unit: m
    pub diameter: f64,
    pub species: String,
}

/// Constant coagulation kernel.
///
/// The kernel scales linearly with temperature,
///
/// $$ K(T) = K_0 \frac{T}{T_0} $$
///
/// where $T_0$ is the reference temperature of 298.15 K.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coagulation {
    /// $K_0$
    ///
    /// unit: m3 s-1
    pub kernel: f64,
}

/// Exchange with a background air mass.
///
/// Particles are removed at `rate` and background particles mixed in at
/// `rate` times their concentration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dilution {
    /// unit: s-1
    pub rate: f64,
    #[serde(default)]
    pub background: Vec<ParticleMode>,
}

/// Configuration of a [`MonteCarloPopulation`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub species: Vec<AerosolSpecies>,
    #[serde(default)]
    pub initial: Vec<ParticleMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nucleation: Option<Nucleation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coagulation: Option<Coagulation>,
    #[serde(default)]
    pub emissions: Vec<ParticleSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dilution: Option<Dilution>,
    /// Population size that triggers halving of the computational volume.
    #[serde(rename = "maximum particles", default = "default_maximum_particles")]
    pub maximum_particles: usize,
    /// Internal sub-step.
    ///
    /// unit: s
    #[serde(rename = "time step", default = "default_time_step")]
    pub time_step_s: f64,
    /// Initial computational volume. Sized so the initial particles fill
    /// half of `maximum particles` when absent.
    ///
    /// unit: m3
    #[serde(
        rename = "computational volume",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub computational_volume: Option<f64>,
    #[serde(default)]
    pub seed: u64,
}

impl PopulationConfig {
    pub fn validate(&self) -> BoxModelResult<()> {
        let invalid = |key: &str, message: String| {
            Err(BoxModelError::configuration(format!("{NAME}.{key}"), message))
        };

        if self.species.is_empty() {
            return invalid("species", "at least one aerosol species is required".into());
        }
        let mut seen = HashSet::new();
        for s in &self.species {
            if !seen.insert(s.name.as_str()) {
                return invalid("species", format!("duplicate species '{}'", s.name));
            }
            if !(s.density > 0.0 && s.density.is_finite()) {
                return invalid(
                    "species",
                    format!("density of '{}' must be positive, got {}", s.name, s.density),
                );
            }
        }
        if self.maximum_particles < 4 {
            return invalid(
                "maximum particles",
                format!("must be at least 4, got {}", self.maximum_particles),
            );
        }
        if !(self.time_step_s > 0.0 && self.time_step_s.is_finite()) {
            return invalid("time step", format!("must be positive, got {}", self.time_step_s));
        }
        if let Some(volume) = self.computational_volume {
            if !(volume > 0.0 && volume.is_finite()) {
                return invalid("computational volume", format!("must be positive, got {volume}"));
            }
        }
        if let Some(nucleation) = &self.nucleation {
            if !self.species.iter().any(|s| s.name == nucleation.species) {
                return invalid(
                    "nucleation.species",
                    format!("unknown aerosol species '{}'", nucleation.species),
                );
            }
            if !(nucleation.rate >= 0.0) {
                return invalid("nucleation.rate", format!("must not be negative, got {}", nucleation.rate));
            }
        }
        if let Some(coagulation) = &self.coagulation {
            if !(coagulation.kernel >= 0.0) {
                return invalid(
                    "coagulation.kernel",
                    format!("must not be negative, got {}", coagulation.kernel),
                );
            }
        }
        if let Some(dilution) = &self.dilution {
            if !(dilution.rate >= 0.0) {
                return invalid("dilution.rate", format!("must not be negative, got {}", dilution.rate));
            }
        }
        for source in &self.emissions {
            if !(source.rate >= 0.0) {
                return invalid("emissions", format!("rate must not be negative, got {}", source.rate));
            }
        }
        for mode in self.all_modes() {
            if !(mode.number_concentration >= 0.0) {
                return invalid(
                    "initial",
                    format!(
                        "number concentration must not be negative, got {}",
                        mode.number_concentration
                    ),
                );
            }
        }
        Ok(())
    }

    fn all_modes(&self) -> impl Iterator<Item = &ParticleMode> {
        self.initial
            .iter()
            .chain(self.dilution.iter().flat_map(|d| d.background.iter()))
    }

    /// Mass of each species in one particle.
    ///
    /// unit: kg
    fn particle_masses(
        &self,
        diameter: f64,
        composition: &BTreeMap<String, f64>,
    ) -> BoxModelResult<Vec<f64>> {
        if !(diameter > 0.0 && diameter.is_finite()) {
            return Err(BoxModelError::configuration(
                NAME,
                format!("particle diameter must be positive, got {diameter} m"),
            ));
        }
        let total: f64 = composition.values().sum();
        if composition.values().any(|f| *f < 0.0) || !(total > 0.0) {
            return Err(BoxModelError::configuration(
                NAME,
                format!("mass fractions must be non-negative with a positive sum, got {composition:?}"),
            ));
        }

        let mut fractions = vec![0.0; self.species.len()];
        let mut specific_volume = 0.0;
        for (name, fraction) in composition {
            let index = self
                .species
                .iter()
                .position(|s| &s.name == name)
                .ok_or_else(|| {
                    BoxModelError::configuration(NAME, format!("unknown aerosol species '{name}'"))
                })?;
            fractions[index] = fraction / total;
            specific_volume += fraction / total / self.species[index].density;
        }

        let mass = PI / 6.0 * diameter.powi(3) / specific_volume;
        Ok(fractions.into_iter().map(|f| f * mass).collect())
    }
}

/// A rate paired with the species masses of each particle it produces.
#[derive(Debug, Clone)]
struct Compiled {
    rate: f64,
    masses: Vec<f64>,
}

/// Particle-resolved population in a finite computational volume.
///
/// Each particle is a vector of species masses. Concentrations are the
/// particle sums divided by the computational volume. When the population
/// grows past `maximum particles` a random half is discarded and the volume
/// halved; when it falls below a quarter of that every particle is
/// duplicated and the volume doubled.
#[derive(Debug)]
pub struct MonteCarloPopulation {
    species: Vec<String>,
    particles: Vec<Vec<f64>>,
    volume_m3: f64,
    temperature_k: f64,
    rng: StdRng,
    maximum_particles: usize,
    time_step_s: f64,
    nucleation: Option<Compiled>,
    coagulation_kernel: Option<f64>,
    sources: Vec<Compiled>,
    dilution_rate: f64,
    background: Vec<Compiled>,
}

impl MonteCarloPopulation {
    /// Builds the initial population.
    ///
    /// `stream` is added to the configured seed so each domain element gets
    /// an independent random sequence.
    pub fn new(config: &PopulationConfig, stream: u64) -> BoxModelResult<Self> {
        config.validate()?;

        let compile = |rate: f64, diameter: f64, composition: &BTreeMap<String, f64>| {
            config
                .particle_masses(diameter, composition)
                .map(|masses| Compiled { rate, masses })
        };
        let initial = config
            .initial
            .iter()
            .map(|m| compile(m.number_concentration, m.diameter, &m.composition))
            .collect::<BoxModelResult<Vec<_>>>()?;
        let nucleation = match &config.nucleation {
            Some(n) => {
                let composition = BTreeMap::from([(n.species.clone(), 1.0)]);
                Some(compile(n.rate, n.diameter, &composition)?)
            }
            None => None,
        };
        let sources = config
            .emissions
            .iter()
            .map(|s| compile(s.rate, s.diameter, &s.composition))
            .collect::<BoxModelResult<Vec<_>>>()?;
        let (dilution_rate, background) = match &config.dilution {
            Some(d) => (
                d.rate,
                d.background
                    .iter()
                    .map(|m| compile(m.number_concentration, m.diameter, &m.composition))
                    .collect::<BoxModelResult<Vec<_>>>()?,
            ),
            None => (0.0, Vec::new()),
        };

        let total_number: f64 = initial.iter().map(|m| m.rate).sum();
        let volume_m3 = match config.computational_volume {
            Some(volume) => volume,
            None if total_number > 0.0 => config.maximum_particles as f64 / 2.0 / total_number,
            None => DEFAULT_VOLUME,
        };

        let mut particles = Vec::new();
        for mode in &initial {
            let count = (mode.rate * volume_m3).round() as usize;
            particles.extend(std::iter::repeat(mode.masses.clone()).take(count));
        }

        let mut population = Self {
            species: config.species.iter().map(|s| s.name.clone()).collect(),
            particles,
            volume_m3,
            temperature_k: REFERENCE_TEMPERATURE,
            rng: StdRng::seed_from_u64(config.seed.wrapping_add(stream)),
            maximum_particles: config.maximum_particles,
            time_step_s: config.time_step_s,
            nucleation,
            coagulation_kernel: config.coagulation.map(|c| c.kernel),
            sources,
            dilution_rate,
            background,
        };
        population.rebalance();
        debug!(
            particles = population.particles.len(),
            volume_m3 = population.volume_m3,
            "Initialized particle population"
        );
        Ok(population)
    }

    /// Number of computational particles.
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// unit: m3
    pub fn volume_m3(&self) -> f64 {
        self.volume_m3
    }

    /// Coagulation kernel at the current temperature, if coagulation is on.
    ///
    /// unit: m3 s-1
    pub fn coagulation_kernel(&self) -> Option<f64> {
        self.coagulation_kernel
            .map(|k| k * self.temperature_k / REFERENCE_TEMPERATURE)
    }

    fn nucleate(&mut self, dt_s: f64) -> BoxModelResult<()> {
        if let Some(nucleation) = &self.nucleation {
            let mean = nucleation.rate * self.volume_m3 * dt_s;
            add_particles(&mut self.particles, &mut self.rng, mean, &nucleation.masses)?;
        }
        Ok(())
    }

    fn emit(&mut self, dt_s: f64) -> BoxModelResult<()> {
        for source in &self.sources {
            let mean = source.rate * self.volume_m3 * dt_s;
            add_particles(&mut self.particles, &mut self.rng, mean, &source.masses)?;
        }
        Ok(())
    }

    fn dilute(&mut self, dt_s: f64) -> BoxModelResult<()> {
        if self.dilution_rate <= 0.0 {
            return Ok(());
        }
        let survival = (-self.dilution_rate * dt_s).exp();
        let rng = &mut self.rng;
        self.particles.retain(|_| rng.gen::<f64>() < survival);
        for mode in &self.background {
            let mean = self.dilution_rate * mode.rate * self.volume_m3 * dt_s;
            add_particles(&mut self.particles, &mut self.rng, mean, &mode.masses)?;
        }
        Ok(())
    }

    /// Merges random pairs, with the pair count drawn from the expected
    /// number of collisions over the sub-step.
    fn coagulate(&mut self, dt_s: f64) -> BoxModelResult<()> {
        let Some(kernel) = self.coagulation_kernel() else {
            return Ok(());
        };
        let n = self.particles.len() as f64;
        let mean = kernel * n * (n - 1.0) / 2.0 / self.volume_m3 * dt_s;
        let events = poisson(&mut self.rng, mean)?;
        for _ in 0..events {
            let n = self.particles.len();
            if n < 2 {
                break;
            }
            let first = self.rng.gen_range(0..n);
            let mut second = self.rng.gen_range(0..n - 1);
            if second >= first {
                second += 1;
            }
            let (keep, merge) = (first.min(second), first.max(second));
            let absorbed = self.particles.swap_remove(merge);
            for (mass, extra) in self.particles[keep].iter_mut().zip(absorbed) {
                *mass += extra;
            }
        }
        Ok(())
    }

    fn rebalance(&mut self) {
        while self.particles.len() > self.maximum_particles {
            self.particles.shuffle(&mut self.rng);
            self.particles.truncate(self.particles.len() / 2);
            self.volume_m3 /= 2.0;
            debug!(particles = self.particles.len(), volume_m3 = self.volume_m3, "Halved volume");
        }
        while !self.particles.is_empty() && self.particles.len() < self.maximum_particles / 4 {
            let copies = self.particles.clone();
            self.particles.extend(copies);
            self.volume_m3 *= 2.0;
            debug!(particles = self.particles.len(), volume_m3 = self.volume_m3, "Doubled volume");
        }
    }
}

impl ParticleEngine for MonteCarloPopulation {
    fn species(&self) -> &[String] {
        &self.species
    }

    /// The constant kernel has no pressure dependence, so pressure is only
    /// checked.
    fn set_environment(&mut self, temperature_k: f64, pressure_pa: f64) -> BoxModelResult<()> {
        if !(temperature_k > 0.0 && temperature_k.is_finite()) {
            return Err(BoxModelError::solver(
                NAME,
                format!("temperature must be positive, got {temperature_k} K"),
            ));
        }
        if !(pressure_pa > 0.0 && pressure_pa.is_finite()) {
            return Err(BoxModelError::solver(
                NAME,
                format!("pressure must be positive, got {pressure_pa} Pa"),
            ));
        }
        self.temperature_k = temperature_k;
        Ok(())
    }

    fn advance(&mut self, dt_s: f64) -> BoxModelResult<()> {
        if !(dt_s > 0.0) {
            return Ok(());
        }
        let substeps = (dt_s / self.time_step_s).ceil().max(1.0) as usize;
        let h = dt_s / substeps as f64;
        for _ in 0..substeps {
            self.nucleate(h)?;
            self.emit(h)?;
            self.dilute(h)?;
            self.coagulate(h)?;
            self.rebalance();
        }
        trace!(
            substeps,
            particles = self.particles.len(),
            volume_m3 = self.volume_m3,
            "Advanced particle population"
        );
        Ok(())
    }

    fn number_concentration(&self) -> f64 {
        self.particles.len() as f64 / self.volume_m3
    }

    fn mass_concentrations(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.species.len()];
        for particle in &self.particles {
            for (total, mass) in totals.iter_mut().zip(particle) {
                *total += mass;
            }
        }
        totals.into_iter().map(|m| m / self.volume_m3).collect()
    }
}

fn add_particles(
    particles: &mut Vec<Vec<f64>>,
    rng: &mut StdRng,
    mean: f64,
    masses: &[f64],
) -> BoxModelResult<()> {
    let count = poisson(rng, mean)?;
    particles.extend(std::iter::repeat_with(|| masses.to_vec()).take(count));
    Ok(())
}

/// Number of events over an interval with `mean` expected events.
///
/// A zero mean yields no events. Negative or non-finite means are errors.
pub(crate) fn poisson<R: Rng + ?Sized>(rng: &mut R, mean: f64) -> BoxModelResult<usize> {
    if mean == 0.0 {
        return Ok(0);
    }
    let distribution = Poisson::new(mean).map_err(|e| {
        BoxModelError::configuration(NAME, format!("invalid expected event count {mean}: {e}"))
    })?;
    Ok(distribution.sample(rng) as usize)
}
