//! Emissions component
//!
//! Adds emitted mass to gas-phase species concentrations.

use boxchem_core::component::{check_time_step, BuildContext, Component, ComponentConfig};
use boxchem_core::domain::{Accessor, DomainState, ElementId, Mutator};
use boxchem_core::errors::BoxModelResult;
use boxchem_core::property::base_name;
use boxchem_core::standard_properties::{emission_rate, EMISSION_RATE_UNITS};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::{debug, warn};

use super::species_mutators;

const NAME: &str = "emissions";

/// Configuration of the [`Emissions`] component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmissionsConfig {
    /// Species to emit.
    ///
    /// Empty selects every chemical species registered by earlier
    /// components.
    #[serde(default)]
    pub species: Vec<String>,
}

#[derive(Debug)]
struct EmittedSpecies {
    rate: Accessor,
    concentration: Mutator,
}

/// Explicit Euler update of concentrations from emission rates
///
/// For each species the emission rate (mol m-3 s-1) is held constant over
/// the step:
/// $$ C_{t + \Delta t} = C_t + E \Delta t $$
#[derive(Debug)]
pub struct Emissions {
    species: Vec<EmittedSpecies>,
}

impl Emissions {
    /// Names of the emitted species, in update order.
    pub fn species_names(&self) -> Vec<&str> {
        self.species
            .iter()
            .map(|s| base_name(s.concentration.name()))
            .collect()
    }
}

#[typetag::serde(name = "emissions")]
impl ComponentConfig for EmissionsConfig {
    fn build(&self, context: &mut BuildContext) -> BoxModelResult<Box<dyn Component>> {
        let concentrations = species_mutators(context.domain, &self.species, NAME)?;
        if concentrations.is_empty() {
            warn!("Emissions component has no species to emit");
        }

        let mut species = Vec::with_capacity(concentrations.len());
        for concentration in concentrations {
            let property = emission_rate(base_name(concentration.name()));
            context.domain.register(property.clone())?;
            let rate = context
                .domain
                .accessor(property.name(), EMISSION_RATE_UNITS, NAME)?;
            debug!(species = concentration.name(), rate = rate.name(), "Bound emission");
            species.push(EmittedSpecies {
                rate,
                concentration,
            });
        }
        Ok(Box::new(Emissions { species }))
    }
}

impl Component for Emissions {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Adds species emissions at constant rates over each step"
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
        for species in &self.species {
            let concentration = state.get(element, &species.concentration)?;
            let rate = state.get(element, &species.rate)?;
            state.update(element, &species.concentration, concentration + rate * dt_s)?;
        }
        Ok(())
    }

    fn preprocess_input(&self, _output_path: &Path) -> BoxModelResult<serde_json::Value> {
        Ok(json!({
            "type": NAME,
            "species": self.species_names(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxchem_core::domain::Domain;
    use boxchem_core::io::OutputTable;
    use boxchem_core::standard_properties::species;
    use std::path::PathBuf;

    fn build(domain: &mut Domain, config: &EmissionsConfig) -> Box<dyn Component> {
        let mut output = OutputTable::new();
        let mut context = BuildContext {
            domain,
            output: &mut output,
            base_dir: PathBuf::from("."),
        };
        config.build(&mut context).unwrap()
    }

    #[test]
    fn test_emission_is_linear() {
        let mut domain = Domain::box_model();
        let mut component = build(
            &mut domain,
            &EmissionsConfig {
                species: vec!["NO".to_string()],
            },
        );
        let rate = domain
            .mutator("emission_rates%NO", "mol m-3 s-1", "test")
            .unwrap();
        let conc = domain
            .accessor("chemical_species%NO", "mol m-3", "test")
            .unwrap();
        let mut state = domain.new_state();
        let e = ElementId::new(0);
        state.update(e, &rate, 2.0).unwrap();

        component.advance_state(&mut state, e, 0.0, 5.0).unwrap();
        assert_eq!(state.get(e, &conc).unwrap(), 10.0);
    }

    #[test]
    fn test_all_registered_species() {
        let mut domain = Domain::box_model();
        for name in ["O3", "NO", "NO2"] {
            domain.register(species(name)).unwrap();
        }
        let component = build(&mut domain, &EmissionsConfig::default());
        let description = component.preprocess_input(Path::new(".")).unwrap();

        assert_eq!(description["species"], json!(["O3", "NO", "NO2"]));
        assert!(domain.is_variable("emission_rates%NO2"));
    }

    #[test]
    fn test_zero_and_negative_steps() {
        let mut domain = Domain::box_model();
        let mut component = build(
            &mut domain,
            &EmissionsConfig {
                species: vec!["CO".to_string()],
            },
        );
        let rate = domain
            .mutator("emission_rates%CO", "mol m-3 s-1", "test")
            .unwrap();
        let conc = domain
            .accessor("chemical_species%CO", "mol m-3", "test")
            .unwrap();
        let mut state = domain.new_state();
        let e = ElementId::new(0);
        state.update(e, &rate, 1.0).unwrap();

        component.advance_state(&mut state, e, 0.0, 0.0).unwrap();
        assert_eq!(state.get(e, &conc).unwrap(), 0.0);
        assert!(component.advance_state(&mut state, e, 0.0, -1.0).is_err());
    }
}
