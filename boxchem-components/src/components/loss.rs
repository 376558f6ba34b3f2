//! First-order loss component
//!
//! Removes gas-phase species at a first-order rate, as for deposition or
//! wall loss.

use boxchem_core::component::{check_time_step, BuildContext, Component, ComponentConfig};
use boxchem_core::domain::{Accessor, DomainState, ElementId, Mutator};
use boxchem_core::errors::BoxModelResult;
use boxchem_core::property::base_name;
use boxchem_core::standard_properties::{loss_rate, FIRST_ORDER_RATE_UNITS};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::{debug, warn};

use super::species_mutators;

const NAME: &str = "first-order loss";

/// Configuration of the [`FirstOrderLoss`] component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirstOrderLossConfig {
    /// Species subject to loss.
    ///
    /// Empty selects every chemical species registered by earlier
    /// components.
    #[serde(default)]
    pub species: Vec<String>,
}

#[derive(Debug)]
struct LostSpecies {
    rate_constant: Accessor,
    concentration: Mutator,
}

/// Exact solution of first-order decay over each step
///
/// $$ C_{t + \Delta t} = C_t \exp(-k \Delta t) $$
///
/// Stable for any step size and any non-negative rate constant `k` (s-1).
#[derive(Debug)]
pub struct FirstOrderLoss {
    species: Vec<LostSpecies>,
}

impl FirstOrderLoss {
    pub fn species_names(&self) -> Vec<&str> {
        self.species
            .iter()
            .map(|s| base_name(s.concentration.name()))
            .collect()
    }
}

#[typetag::serde(name = "first-order loss")]
impl ComponentConfig for FirstOrderLossConfig {
    fn build(&self, context: &mut BuildContext) -> BoxModelResult<Box<dyn Component>> {
        let concentrations = species_mutators(context.domain, &self.species, NAME)?;
        if concentrations.is_empty() {
            warn!("First-order loss component has no species to remove");
        }

        let mut species = Vec::with_capacity(concentrations.len());
        for concentration in concentrations {
            let property = loss_rate(base_name(concentration.name()));
            context.domain.register(property.clone())?;
            let rate_constant =
                context
                    .domain
                    .accessor(property.name(), FIRST_ORDER_RATE_UNITS, NAME)?;
            debug!(
                species = concentration.name(),
                rate = rate_constant.name(),
                "Bound first-order loss"
            );
            species.push(LostSpecies {
                rate_constant,
                concentration,
            });
        }
        Ok(Box::new(FirstOrderLoss { species }))
    }
}

impl Component for FirstOrderLoss {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Removes species at first-order rates"
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
            let k = state.get(element, &species.rate_constant)?;
            state.update(
                element,
                &species.concentration,
                concentration * (-k * dt_s).exp(),
            )?;
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
