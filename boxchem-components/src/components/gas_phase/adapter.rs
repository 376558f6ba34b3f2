use boxchem_core::component::{check_time_step, BuildContext, Component, ComponentConfig};
use boxchem_core::domain::{Accessor, DomainState, ElementId, Mutator};
use boxchem_core::errors::{BoxModelError, BoxModelResult};
use boxchem_core::property::Property;
use boxchem_core::standard_properties::{
    emission_rate, loss_rate, photolysis_rate, species, user_defined_rate, CONCENTRATION_UNITS,
    NUMBER_DENSITY_AIR, PRESSURE, TEMPERATURE,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

use super::mass_action::{MassActionOptions, MassActionSolver};
use super::mechanism::Mechanism;
use super::{ChemistrySolver, RateParameterKind, SolveStatus, SolverState};
use crate::constants::PPM;

const NAME: &str = "gas phase chemistry";

fn default_maximum_iterations() -> usize {
    10
}

/// Configuration of the [`GasPhaseChemistry`] component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasPhaseChemistryConfig {
    /// Mechanism file, relative to the configuration file.
    pub mechanism: PathBuf,
    /// Solve calls allowed per step before the step counts as diverged.
    #[serde(rename = "maximum iterations", default = "default_maximum_iterations")]
    pub maximum_iterations: usize,
    #[serde(default)]
    pub solver: MassActionOptions,
}

impl GasPhaseChemistryConfig {
    pub fn new(mechanism: impl Into<PathBuf>) -> Self {
        Self {
            mechanism: mechanism.into(),
            maximum_iterations: default_maximum_iterations(),
            solver: MassActionOptions::default(),
        }
    }
}

#[derive(Debug)]
struct Environment {
    temperature: Accessor,
    pressure: Accessor,
    number_density_air: Accessor,
}

/// Couples a [`ChemistrySolver`] to the domain state.
///
/// Each advance pushes the environment, then the rate parameters, then the
/// species mixing ratios into the solver state, solves, and pulls the
/// species back. Solve calls that only cover part of the step are repeated
/// on the remainder, up to `maximum iterations` calls per step.
#[derive(Debug)]
pub struct GasPhaseChemistry {
    solver: Box<dyn ChemistrySolver>,
    solver_state: SolverState,
    mechanism: Mechanism,
    config: GasPhaseChemistryConfig,
    environment: Environment,
    /// Indexed like the solver's species.
    species: Vec<Mutator>,
    /// Indexed like the solver's rate parameters.
    rate_parameters: Vec<Accessor>,
}

impl GasPhaseChemistry {
    /// Registers the mechanism's properties and binds the solver to them.
    pub fn new(
        context: &mut BuildContext,
        mechanism: Mechanism,
        solver: Box<dyn ChemistrySolver>,
        config: GasPhaseChemistryConfig,
    ) -> BoxModelResult<Self> {
        let domain = &mut *context.domain;
        let environment = Environment {
            temperature: domain.accessor(TEMPERATURE.name, "K", NAME)?,
            pressure: domain.accessor(PRESSURE.name, "Pa", NAME)?,
            number_density_air: domain.accessor(NUMBER_DENSITY_AIR.name, "mol m-3", NAME)?,
        };

        let mut species_handles = Vec::with_capacity(solver.species().len());
        for name in solver.species() {
            let property = species(name);
            domain.register(property.clone())?;
            species_handles.push(domain.mutator(property.name(), CONCENTRATION_UNITS, NAME)?);
            context.output.register_output_variable(
                domain,
                property.name(),
                CONCENTRATION_UNITS,
                &format!("CONC.{name}"),
            )?;
        }

        let mut rate_handles = Vec::with_capacity(solver.rate_parameters().len());
        for parameter in solver.rate_parameters() {
            let property: Property = match parameter.kind {
                RateParameterKind::Photolysis => photolysis_rate(&parameter.name),
                RateParameterKind::Emission => emission_rate(&parameter.name),
                RateParameterKind::FirstOrderLoss => loss_rate(&parameter.name),
                RateParameterKind::UserDefined => {
                    user_defined_rate(&parameter.name, &parameter.units)
                }
            };
            domain.register(property.clone())?;
            rate_handles.push(domain.accessor(property.name(), &parameter.units, NAME)?);
        }

        info!(
            species = species_handles.len(),
            rate_parameters = rate_handles.len(),
            "Bound gas-phase chemistry"
        );
        let solver_state = solver.new_state();
        Ok(Self {
            solver,
            solver_state,
            mechanism,
            config,
            environment,
            species: species_handles,
            rate_parameters: rate_handles,
        })
    }

    pub fn species_names(&self) -> &[String] {
        self.solver.species()
    }

    /// Sends the environment and rate parameters to the solver and returns
    /// the air number density.
    fn push_conditions(
        &mut self,
        state: &DomainState,
        element: ElementId,
    ) -> BoxModelResult<f64> {
        let env = &self.environment;
        let number_density_air = state.get(element, &env.number_density_air)?;
        if !(number_density_air > 0.0) {
            return Err(BoxModelError::solver(
                NAME,
                format!("air number density must be positive, got {number_density_air} mol m-3"),
            ));
        }
        self.solver_state.temperature_k = state.get(element, &env.temperature)?;
        self.solver_state.pressure_pa = state.get(element, &env.pressure)?;
        self.solver_state.number_density_air = number_density_air;

        for (value, handle) in self
            .solver_state
            .rate_parameters
            .iter_mut()
            .zip(&self.rate_parameters)
        {
            *value = state.get(element, handle)?;
        }
        Ok(number_density_air)
    }

    fn push_species(
        &mut self,
        state: &DomainState,
        element: ElementId,
        number_density_air: f64,
    ) -> BoxModelResult<()> {
        for (ratio, handle) in self.solver_state.mixing_ratios.iter_mut().zip(&self.species) {
            *ratio = state.get(element, handle)? / number_density_air * PPM;
        }
        Ok(())
    }

    fn pull(
        &self,
        state: &mut DomainState,
        element: ElementId,
        number_density_air: f64,
    ) -> BoxModelResult<()> {
        for (ratio, handle) in self.solver_state.mixing_ratios.iter().zip(&self.species) {
            state.update(element, handle, ratio / PPM * number_density_air)?;
        }
        Ok(())
    }
}

#[typetag::serde(name = "gas phase chemistry")]
impl ComponentConfig for GasPhaseChemistryConfig {
    fn build(&self, context: &mut BuildContext) -> BoxModelResult<Box<dyn Component>> {
        let path = context.resolve(&self.mechanism);
        let contents = fs::read_to_string(&path).map_err(|e| {
            BoxModelError::io(format!("reading mechanism '{}'", path.display()), e)
        })?;
        let mechanism = Mechanism::from_json(&path.display().to_string(), &contents)?;
        let solver = MassActionSolver::new(&mechanism, self.solver)?;
        let component = GasPhaseChemistry::new(context, mechanism, Box::new(solver), self.clone())?;
        Ok(Box::new(component))
    }
}

impl Component for GasPhaseChemistry {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Gas-phase chemistry solved in mixing ratio space"
    }

    fn advance_state(
        &mut self,
        state: &mut DomainState,
        element: ElementId,
        current_time_s: f64,
        dt_s: f64,
    ) -> BoxModelResult<()> {
        if !check_time_step(dt_s)? {
            return Ok(());
        }
        let number_density_air = self.push_conditions(state, element)?;
        self.push_species(state, element, number_density_air)?;

        let mut remaining = dt_s;
        let mut iterations = 0;
        let mut last_status = SolveStatus::Converged;
        while remaining > dt_s * 1.0e-12 {
            if iterations == self.config.maximum_iterations {
                return Err(BoxModelError::solver(
                    NAME,
                    format!(
                        "{remaining} s of the step starting at {current_time_s} s left after \
                         {iterations} iterations ({last_status})"
                    ),
                ));
            }
            iterations += 1;
            // Environment and rate parameters precede every solve call
            if iterations > 1 {
                self.push_conditions(state, element)?;
            }
            let outcome = self.solver.solve(&mut self.solver_state, remaining);
            trace!(
                iteration = iterations,
                achieved_dt_s = outcome.achieved_dt_s,
                status = %outcome.status,
                "Chemistry solve"
            );
            remaining -= outcome.achieved_dt_s;
            last_status = outcome.status;
        }
        if iterations > 1 {
            debug!(iterations, time_s = current_time_s, "Chemistry step needed sub-steps");
        }

        self.pull(state, element, number_density_air)
    }

    fn preprocess_input(&self, output_path: &Path) -> BoxModelResult<serde_json::Value> {
        let file_name = self
            .config
            .mechanism
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("mechanism.json"));
        let path = output_path.join(&file_name);
        let contents = serde_json::to_string_pretty(&self.mechanism)
            .map_err(|e| BoxModelError::configuration(NAME, e.to_string()))?;
        fs::write(&path, contents)
            .map_err(|e| BoxModelError::io(format!("writing '{}'", path.display()), e))?;

        Ok(json!({
            "type": NAME,
            "mechanism": file_name,
            "maximum iterations": self.config.maximum_iterations,
            "solver": self.config.solver,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::gas_phase::{RateParameter, SolveOutcome};
    use approx::assert_relative_eq;
    use boxchem_core::domain::Domain;
    use boxchem_core::io::OutputTable;
    use boxchem_core::standard_properties::environment_properties;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Integrates nothing but reports a fixed fraction of each request.
    ///
    /// Records the temperature it was given on each call, then clears it.
    #[derive(Debug)]
    struct Stubborn {
        species: Vec<String>,
        fraction: f64,
        temperatures: Rc<RefCell<Vec<f64>>>,
    }

    impl Stubborn {
        fn new(fraction: f64) -> Self {
            Self {
                species: vec!["A".to_string(), "B".to_string()],
                fraction,
                temperatures: Rc::default(),
            }
        }
    }

    impl ChemistrySolver for Stubborn {
        fn species(&self) -> &[String] {
            &self.species
        }

        fn rate_parameters(&self) -> &[RateParameter] {
            &[]
        }

        fn new_state(&self) -> SolverState {
            SolverState {
                mixing_ratios: vec![0.0; self.species.len()],
                rate_parameters: Vec::new(),
                temperature_k: 0.0,
                pressure_pa: 0.0,
                number_density_air: 0.0,
            }
        }

        fn solve(&mut self, state: &mut SolverState, dt_s: f64) -> SolveOutcome {
            self.temperatures.borrow_mut().push(state.temperature_k);
            state.temperature_k = 0.0;
            state.mixing_ratios[0] *= 2.0;
            SolveOutcome {
                status: SolveStatus::Incomplete,
                achieved_dt_s: dt_s * self.fraction,
            }
        }
    }

    fn domain() -> Domain {
        let mut domain = Domain::box_model();
        for property in environment_properties() {
            domain.register(property.to_property()).unwrap();
        }
        domain
    }

    fn mechanism() -> Mechanism {
        Mechanism::from_json(
            "test.json",
            r#"{
                "species": [{ "name": "A" }, { "name": "B" }],
                "reactions": [
                    { "type": "PHOTOLYSIS", "name": "A_1", "reactants": { "A": {} }, "products": { "B": {} } }
                ]
            }"#,
        )
        .unwrap()
    }

    fn adapter(
        domain: &mut Domain,
        output: &mut OutputTable,
        solver: Box<dyn ChemistrySolver>,
    ) -> GasPhaseChemistry {
        let mut context = BuildContext {
            domain,
            output,
            base_dir: PathBuf::from("."),
        };
        let mut config = GasPhaseChemistryConfig::new("test.json");
        config.maximum_iterations = 3;
        GasPhaseChemistry::new(&mut context, mechanism(), solver, config).unwrap()
    }

    #[test]
    fn test_registers_species_rates_and_outputs() {
        let mut domain = domain();
        let mut output = OutputTable::new();
        let mechanism = mechanism();
        let solver = MassActionSolver::new(&mechanism, MassActionOptions::default()).unwrap();
        let component = adapter(&mut domain, &mut output, Box::new(solver));

        assert_eq!(component.species_names(), &["A", "B"]);
        assert_eq!(domain.variable_names("chemical_species%").len(), 2);
        assert!(domain.is_variable("photolysis_rate_constants%A_1"));
        assert_eq!(
            output.headers(),
            vec!["time.s", "CONC.A.mol m-3", "CONC.B.mol m-3"]
        );
    }

    #[test]
    fn test_photolysis_round_trip_in_domain_units() {
        let mut domain = domain();
        let mut output = OutputTable::new();
        let mechanism = mechanism();
        let solver = MassActionSolver::new(&mechanism, MassActionOptions::default()).unwrap();
        let mut component = adapter(&mut domain, &mut output, Box::new(solver));

        let j = domain
            .mutator("photolysis_rate_constants%A_1", "min-1", "test")
            .unwrap();
        let a = domain
            .mutator("chemical_species%A", "mol m-3", "test")
            .unwrap();
        let b = domain
            .accessor("chemical_species%B", "mol m-3", "test")
            .unwrap();
        let mut state = domain.new_state();
        let e = ElementId::new(0);
        state.update(e, &j, 0.6).unwrap();
        state.update(e, &a, 2.0e-6).unwrap();

        component.advance_state(&mut state, e, 0.0, 10.0).unwrap();

        // 0.6 min-1 is 0.01 s-1
        let expected = 2.0e-6 * (-0.1f64).exp();
        assert_relative_eq!(state.get(e, &a).unwrap(), expected, max_relative = 1e-5);
        assert_relative_eq!(
            state.get(e, &b).unwrap(),
            2.0e-6 - expected,
            max_relative = 1e-5
        );
    }

    #[test]
    fn test_partial_solves_repeat_until_step_done() {
        let mut domain = domain();
        let mut output = OutputTable::new();
        let solver = Stubborn::new(0.5);
        let temperatures = Rc::clone(&solver.temperatures);
        let mut component = adapter(&mut domain, &mut output, Box::new(solver));
        let mut state = domain.new_state();

        // Halving the remainder never finishes within three calls
        let result = component.advance_state(&mut state, ElementId::new(0), 0.0, 60.0);
        assert!(matches!(result, Err(BoxModelError::SolverDivergence { .. })));

        // The environment is sent again before every call
        assert_eq!(*temperatures.borrow(), vec![298.15; 3]);
    }

    #[test]
    fn test_converging_solver_within_budget() {
        let mut domain = domain();
        let mut output = OutputTable::new();
        let solver = Stubborn::new(1.0);
        let mut component = adapter(&mut domain, &mut output, Box::new(solver));
        let a = domain
            .mutator("chemical_species%A", "mol m-3", "test")
            .unwrap();
        let mut state = domain.new_state();
        let e = ElementId::new(0);
        state.update(e, &a, 1.0e-6).unwrap();

        component.advance_state(&mut state, e, 0.0, 60.0).unwrap();
        assert_relative_eq!(state.get(e, &a).unwrap(), 2.0e-6, max_relative = 1e-12);
    }

    #[test]
    fn test_preprocess_writes_mechanism() {
        let dir = tempfile::tempdir().unwrap();
        let mut domain = domain();
        let mut output = OutputTable::new();
        let mechanism = mechanism();
        let solver = MassActionSolver::new(&mechanism, MassActionOptions::default()).unwrap();
        let component = adapter(&mut domain, &mut output, Box::new(solver));

        let descriptor = component.preprocess_input(dir.path()).unwrap();
        assert_eq!(descriptor["type"], "gas phase chemistry");
        assert_eq!(descriptor["mechanism"], "test.json");

        let written = fs::read_to_string(dir.path().join("test.json")).unwrap();
        assert_eq!(Mechanism::from_json("test.json", &written).unwrap(), mechanism);

        let rebuilt: Box<dyn ComponentConfig> = serde_json::from_value(descriptor).unwrap();
        let mut domain = self::domain();
        let mut output = OutputTable::new();
        let mut context = BuildContext {
            domain: &mut domain,
            output: &mut output,
            base_dir: dir.path().to_path_buf(),
        };
        let component = rebuilt.build(&mut context).unwrap();
        assert_eq!(component.name(), "gas phase chemistry");
    }
}
