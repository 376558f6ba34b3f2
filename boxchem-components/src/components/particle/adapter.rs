use boxchem_core::component::{check_time_step, BuildContext, Component, ComponentConfig};
use boxchem_core::domain::{Accessor, DomainState, ElementId, Mutator};
use boxchem_core::errors::{BoxModelError, BoxModelResult};
use boxchem_core::standard_properties::{
    aerosol_mass, AEROSOL_MASS_UNITS, AEROSOL_NUMBER_CONCENTRATION, NUMBER_CONCENTRATION_UNITS,
    PRESSURE, TEMPERATURE,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::population::{MonteCarloPopulation, PopulationConfig};
use super::ParticleEngine;

const NAME: &str = "particle microphysics";

/// Configuration of the [`ParticleMicrophysics`] component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleMicrophysicsConfig {
    #[serde(flatten)]
    pub population: PopulationConfig,
}

/// Couples one [`ParticleEngine`] per domain element to the domain state.
///
/// Temperature and pressure are pulled from the domain state before every
/// advance. Afterwards the engine's mass concentration of each species is
/// pushed to `aerosol_mass_concentration%<species>` and its number
/// concentration to `aerosol_number_concentration`.
#[derive(Debug)]
pub struct ParticleMicrophysics {
    config: ParticleMicrophysicsConfig,
    engines: Vec<Box<dyn ParticleEngine>>,
    temperature: Accessor,
    pressure: Accessor,
    /// Indexed like the engines' species.
    mass: Vec<Mutator>,
    number: Mutator,
}

impl ParticleMicrophysics {
    /// Registers the aerosol properties and outputs for `engines`, which
    /// must hold one engine per domain element with identical species.
    pub fn new(
        context: &mut BuildContext,
        config: ParticleMicrophysicsConfig,
        engines: Vec<Box<dyn ParticleEngine>>,
    ) -> BoxModelResult<Self> {
        let domain = &mut *context.domain;
        if engines.len() != domain.size() {
            return Err(BoxModelError::configuration(
                NAME,
                format!(
                    "{} particle engines for a domain of {} elements",
                    engines.len(),
                    domain.size()
                ),
            ));
        }
        let species: Vec<String> = engines
            .first()
            .map(|e| e.species().to_vec())
            .unwrap_or_default();

        let mut mass = Vec::with_capacity(species.len());
        for name in &species {
            let property = aerosol_mass(name);
            domain.register(property.clone())?;
            mass.push(domain.mutator(property.name(), AEROSOL_MASS_UNITS, NAME)?);
            context.output.register_output_variable(
                domain,
                property.name(),
                AEROSOL_MASS_UNITS,
                &format!("AERO.{name}"),
            )?;
        }
        domain.register(AEROSOL_NUMBER_CONCENTRATION.to_property())?;
        let number = domain.mutator(
            AEROSOL_NUMBER_CONCENTRATION.name,
            NUMBER_CONCENTRATION_UNITS,
            NAME,
        )?;
        context.output.register_output_variable(
            domain,
            AEROSOL_NUMBER_CONCENTRATION.name,
            NUMBER_CONCENTRATION_UNITS,
            "AERO.number_concentration",
        )?;

        info!(species = species.len(), elements = engines.len(), "Bound particle microphysics");
        Ok(Self {
            config,
            engines,
            temperature: domain.accessor(TEMPERATURE.name, "K", NAME)?,
            pressure: domain.accessor(PRESSURE.name, "Pa", NAME)?,
            mass,
            number,
        })
    }

    pub fn species_names(&self) -> &[String] {
        self.engines
            .first()
            .map(|e| e.species())
            .unwrap_or_default()
    }
}

#[typetag::serde(name = "particle microphysics")]
impl ComponentConfig for ParticleMicrophysicsConfig {
    fn build(&self, context: &mut BuildContext) -> BoxModelResult<Box<dyn Component>> {
        let engines = (0..context.domain.size())
            .map(|index| {
                MonteCarloPopulation::new(&self.population, index as u64)
                    .map(|engine| Box::new(engine) as Box<dyn ParticleEngine>)
            })
            .collect::<BoxModelResult<Vec<_>>>()?;
        Ok(Box::new(ParticleMicrophysics::new(context, self.clone(), engines)?))
    }
}

impl Component for ParticleMicrophysics {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Particle-resolved aerosol microphysics"
    }

    fn advance_state(
        &mut self,
        state: &mut DomainState,
        element: ElementId,
        _current_time_s: f64,
        dt_s: f64,
    ) -> BoxModelResult<()> {
        if !check_time_step(dt_s)? {
            return Ok(());
        }
        let engine = self.engines.get_mut(element.index()).ok_or_else(|| {
            BoxModelError::solver(NAME, format!("no particle engine for element {element}"))
        })?;
        engine.set_environment(
            state.get(element, &self.temperature)?,
            state.get(element, &self.pressure)?,
        )?;
        engine.advance(dt_s)?;

        for (handle, value) in self.mass.iter().zip(engine.mass_concentrations()) {
            state.update(element, handle, value)?;
        }
        state.update(element, &self.number, engine.number_concentration())
    }

    fn preprocess_input(&self, _output_path: &Path) -> BoxModelResult<serde_json::Value> {
        let mut value = serde_json::to_value(&self.config)
            .map_err(|e| BoxModelError::configuration(NAME, e.to_string()))?;
        value["type"] = serde_json::json!(NAME);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use boxchem_core::domain::{Domain, Grid};
    use boxchem_core::io::OutputTable;
    use boxchem_core::standard_properties::environment_properties;
    use serde_json::json;

    fn domain(grid: Grid) -> Domain {
        let mut domain = Domain::new(grid);
        for property in environment_properties() {
            domain.register(property.to_property()).unwrap();
        }
        domain
    }

    fn config() -> serde_json::Value {
        json!({
            "type": "particle microphysics",
            "species": [{ "name": "SO4", "density": 1770.0 }],
            "initial": [
                { "number concentration": 1.0e9, "diameter": 1.0e-7, "composition": { "SO4": 1.0 } }
            ],
            "dilution": { "rate": 0.01 },
            "seed": 5
        })
    }

    #[test]
    fn test_registers_aerosol_properties() {
        let mut domain = domain(Grid::Box);
        let mut output = OutputTable::new();
        let config: Box<dyn ComponentConfig> = serde_json::from_value(config()).unwrap();
        let mut context = BuildContext {
            domain: &mut domain,
            output: &mut output,
            base_dir: ".".into(),
        };
        let component = config.build(&mut context).unwrap();

        assert_eq!(component.name(), "particle microphysics");
        assert!(domain.is_variable("aerosol_mass_concentration%SO4"));
        assert!(domain.is_variable("aerosol_number_concentration"));
        assert_eq!(
            output.headers(),
            vec!["time.s", "AERO.SO4.kg m-3", "AERO.number_concentration.m-3"]
        );
    }

    #[test]
    fn test_pushes_concentrations_per_element() {
        let mut domain = domain(Grid::Cells(2));
        let mut output = OutputTable::new();
        let config: Box<dyn ComponentConfig> = serde_json::from_value(config()).unwrap();
        let mut context = BuildContext {
            domain: &mut domain,
            output: &mut output,
            base_dir: ".".into(),
        };
        let mut component = config.build(&mut context).unwrap();
        let number = domain
            .accessor("aerosol_number_concentration", "cm-3", "test")
            .unwrap();
        let mut state = domain.new_state();

        for element in domain.iterator() {
            component.advance_state(&mut state, element, 0.0, 100.0).unwrap();
            assert_relative_eq!(
                state.get(element, &number).unwrap(),
                1.0e3 * (-1.0f64).exp(),
                max_relative = 0.15
            );
        }
    }

    #[test]
    fn test_pulls_environment() {
        let mut domain = domain(Grid::Box);
        let mut output = OutputTable::new();
        let config: Box<dyn ComponentConfig> = serde_json::from_value(config()).unwrap();
        let mut context = BuildContext {
            domain: &mut domain,
            output: &mut output,
            base_dir: ".".into(),
        };
        let mut component = config.build(&mut context).unwrap();
        let temperature = domain.mutator("temperature", "K", "test").unwrap();
        let mut state = domain.new_state();
        let e = ElementId::new(0);
        state.update(e, &temperature, -5.0).unwrap();

        let result = component.advance_state(&mut state, e, 0.0, 1.0);
        assert!(matches!(result, Err(BoxModelError::SolverDivergence { .. })));
    }

    #[test]
    fn test_preprocess_round_trip() {
        let mut domain = domain(Grid::Box);
        let mut output = OutputTable::new();
        let config: Box<dyn ComponentConfig> = serde_json::from_value(config()).unwrap();
        let mut context = BuildContext {
            domain: &mut domain,
            output: &mut output,
            base_dir: ".".into(),
        };
        let component = config.build(&mut context).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let descriptor = component.preprocess_input(dir.path()).unwrap();
        assert_eq!(descriptor["type"], "particle microphysics");
        assert_eq!(descriptor["seed"], 5);

        let rebuilt: Box<dyn ComponentConfig> = serde_json::from_value(descriptor).unwrap();
        let mut domain = self::domain(Grid::Box);
        let mut output = OutputTable::new();
        let mut context = BuildContext {
            domain: &mut domain,
            output: &mut output,
            base_dir: ".".into(),
        };
        assert!(rebuilt.build(&mut context).is_ok());
    }
}
