mod emissions;
pub mod gas_phase;
mod loss;
pub mod particle;

pub use emissions::{Emissions, EmissionsConfig};
pub use gas_phase::{GasPhaseChemistry, GasPhaseChemistryConfig};
pub use loss::{FirstOrderLoss, FirstOrderLossConfig};
pub use particle::{ParticleMicrophysics, ParticleMicrophysicsConfig};

use boxchem_core::domain::{Domain, Mutator};
use boxchem_core::errors::BoxModelResult;
use boxchem_core::property::{join_name, AppliesTo};
use boxchem_core::standard_properties::{species, CHEMICAL_SPECIES, CONCENTRATION_UNITS};

/// Concentration mutators for the named species.
///
/// An empty list selects every species registered so far, in registration
/// order. Named species are registered if no other component has done so.
pub(crate) fn species_mutators(
    domain: &mut Domain,
    names: &[String],
    requester: &str,
) -> BoxModelResult<Vec<Mutator>> {
    if names.is_empty() {
        let prefix = join_name(CHEMICAL_SPECIES, "");
        return domain.mutator_set(&prefix, CONCENTRATION_UNITS, AppliesTo::AllCells);
    }
    names
        .iter()
        .map(|name| {
            let property = species(name);
            domain.register(property.clone())?;
            domain.mutator(property.name(), CONCENTRATION_UNITS, requester)
        })
        .collect()
}
