//! Mass-action kinetics integrated with an explicit Runge-Kutta method.

use boxchem_core::errors::{BoxModelError, BoxModelResult};
use nalgebra::DVector;
use ode_solvers::{Dopri5, System};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::iter::zip;
use tracing::{debug, trace};

use super::mechanism::{arrhenius, Mechanism, Reaction};
use super::{ChemistrySolver, RateParameter, SolveOutcome, SolveStatus, SolverState};
use crate::constants::PPM;

fn default_relative_tolerance() -> f64 {
    1.0e-6
}

fn default_absolute_tolerance() -> f64 {
    1.0e-12
}

fn default_maximum_halvings() -> u32 {
    8
}

/// Solver options for the ODE integration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassActionOptions {
    #[serde(rename = "relative tolerance", default = "default_relative_tolerance")]
    pub relative_tolerance: f64,
    /// unit: ppm
    #[serde(rename = "absolute tolerance", default = "default_absolute_tolerance")]
    pub absolute_tolerance: f64,
    /// How many times a failed interval is halved before giving up.
    #[serde(rename = "maximum halvings", default = "default_maximum_halvings")]
    pub maximum_halvings: u32,
}

impl Default for MassActionOptions {
    fn default() -> Self {
        Self {
            relative_tolerance: default_relative_tolerance(),
            absolute_tolerance: default_absolute_tolerance(),
            maximum_halvings: default_maximum_halvings(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RateConstant {
    Arrhenius { a: f64, b: f64, c: f64, d: f64, e: f64 },
    /// Index into the rate parameters
    Parameter(usize),
}

#[derive(Debug, Clone)]
struct CompiledReaction {
    reactants: Vec<(usize, u32)>,
    products: Vec<(usize, f64)>,
    rate_constant: RateConstant,
}

/// Right hand side of the rate equations for fixed rate constants.
struct RateEquations<'a> {
    reactions: &'a [CompiledReaction],
    constant: &'a [bool],
    rate_constants: Vec<f64>,
    /// ppm to mol m-3
    to_concentration: f64,
}

impl System<f64, DVector<f64>> for RateEquations<'_> {
    fn system(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy.fill(0.0);
        for (reaction, k) in zip(self.reactions, &self.rate_constants) {
            // mol m-3 s-1
            let mut rate = *k;
            for &(i, qty) in &reaction.reactants {
                rate *= (y[i].max(0.0) * self.to_concentration).powi(qty as i32);
            }
            let rate_ppm = rate / self.to_concentration;
            for &(i, qty) in &reaction.reactants {
                dy[i] -= f64::from(qty) * rate_ppm;
            }
            for &(i, yield_factor) in &reaction.products {
                dy[i] += yield_factor * rate_ppm;
            }
        }
        for (i, _) in self.constant.iter().enumerate().filter(|(_, c)| **c) {
            dy[i] = 0.0;
        }
    }
}

/// Integrates a [`Mechanism`] in mixing ratio space.
///
/// Concentrations of species `i` are recovered as `y_i n_air / 1e6` when
/// evaluating rates, so rate constants keep their SI molar units. A failed
/// integration is retried on half the interval, up to
/// [`MassActionOptions::maximum_halvings`] times, and the interval actually
/// integrated is reported back.
#[derive(Debug, Clone)]
pub struct MassActionSolver {
    species: Vec<String>,
    constant: Vec<bool>,
    reactions: Vec<CompiledReaction>,
    rate_parameters: Vec<RateParameter>,
    options: MassActionOptions,
}

impl MassActionSolver {
    pub fn new(mechanism: &Mechanism, options: MassActionOptions) -> BoxModelResult<Self> {
        let species: Vec<String> = mechanism.species.iter().map(|s| s.name.clone()).collect();
        let constant = mechanism.species.iter().map(|s| s.constant).collect();
        let index: HashMap<&str, usize> = species
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let lookup = |name: &str| {
            index.get(name).copied().ok_or_else(|| {
                BoxModelError::configuration("mechanism", format!("unknown species '{name}'"))
            })
        };

        let mut rate_parameters = Vec::new();
        let mut reactions = Vec::with_capacity(mechanism.reactions.len());
        for reaction in &mechanism.reactions {
            let rate_constant = match (reaction.rate_parameter(), reaction) {
                (Some(parameter), _) => {
                    rate_parameters.push(parameter);
                    RateConstant::Parameter(rate_parameters.len() - 1)
                }
                (None, Reaction::Arrhenius { a, b, c, d, e, ea, .. }) => RateConstant::Arrhenius {
                    a: *a,
                    b: *b,
                    c: Mechanism::arrhenius_c(*c, *ea),
                    d: *d,
                    e: *e,
                },
                (None, other) => {
                    return Err(BoxModelError::configuration(
                        "mechanism",
                        format!("reaction without a rate constant: {other:?}"),
                    ))
                }
            };
            reactions.push(CompiledReaction {
                reactants: reaction
                    .reactants()
                    .into_iter()
                    .map(|(name, qty)| lookup(name).map(|i| (i, qty)))
                    .collect::<BoxModelResult<_>>()?,
                products: reaction
                    .products()
                    .into_iter()
                    .map(|(name, y)| lookup(name).map(|i| (i, y)))
                    .collect::<BoxModelResult<_>>()?,
                rate_constant,
            });
        }

        debug!(
            species = species.len(),
            reactions = reactions.len(),
            rate_parameters = rate_parameters.len(),
            "Compiled mechanism"
        );
        Ok(Self {
            species,
            constant,
            reactions,
            rate_parameters,
            options,
        })
    }

    pub fn options(&self) -> &MassActionOptions {
        &self.options
    }

    /// Rate constant of every reaction at the state's conditions.
    pub fn rate_constants(&self, state: &SolverState) -> Vec<f64> {
        self.reactions
            .iter()
            .map(|r| match r.rate_constant {
                RateConstant::Arrhenius { a, b, c, d, e } => {
                    arrhenius(a, b, c, d, e, state.temperature_k, state.pressure_pa)
                }
                RateConstant::Parameter(i) => state.rate_parameters[i],
            })
            .collect()
    }

    fn integrate(
        &self,
        state: &SolverState,
        rate_constants: &[f64],
        interval_s: f64,
    ) -> Result<DVector<f64>, String> {
        let system = RateEquations {
            reactions: &self.reactions,
            constant: &self.constant,
            rate_constants: rate_constants.to_vec(),
            to_concentration: state.number_density_air / PPM,
        };
        let y0 = DVector::from_column_slice(&state.mixing_ratios);
        // Integrate marginally past the interval so the dense output includes its end
        let end = interval_s * (1.0 + 1.0e-12);
        let mut stepper = Dopri5::new(
            system,
            0.0,
            end,
            interval_s,
            y0,
            self.options.relative_tolerance,
            self.options.absolute_tolerance,
        );
        let stats = stepper.integrate().map_err(|e| format!("{e:?}"))?;
        trace!(
            evaluations = stats.num_eval,
            accepted = stats.accepted_steps,
            rejected = stats.rejected_steps,
            "Integrated interval"
        );

        let y = stepper
            .y_out()
            .last()
            .cloned()
            .ok_or_else(|| "integrator produced no output".to_string())?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err("non-finite mixing ratio".to_string());
        }
        Ok(y)
    }
}

impl ChemistrySolver for MassActionSolver {
    fn species(&self) -> &[String] {
        &self.species
    }

    fn rate_parameters(&self) -> &[RateParameter] {
        &self.rate_parameters
    }

    fn new_state(&self) -> SolverState {
        SolverState {
            mixing_ratios: vec![0.0; self.species.len()],
            rate_parameters: vec![0.0; self.rate_parameters.len()],
            temperature_k: 0.0,
            pressure_pa: 0.0,
            number_density_air: 0.0,
        }
    }

    fn solve(&mut self, state: &mut SolverState, dt_s: f64) -> SolveOutcome {
        if dt_s <= 0.0 {
            return SolveOutcome {
                status: SolveStatus::Converged,
                achieved_dt_s: 0.0,
            };
        }
        if !(state.number_density_air > 0.0 && state.temperature_k > 0.0) {
            return SolveOutcome {
                status: SolveStatus::Failed(format!(
                    "invalid environment: T = {} K, n_air = {} mol m-3",
                    state.temperature_k, state.number_density_air
                )),
                achieved_dt_s: 0.0,
            };
        }

        let rate_constants = self.rate_constants(state);
        let mut interval = dt_s;
        let mut reason = String::new();
        for attempt in 0..=self.options.maximum_halvings {
            match self.integrate(state, &rate_constants, interval) {
                Ok(y) => {
                    for (ratio, value) in zip(state.mixing_ratios.iter_mut(), y.iter()) {
                        *ratio = value.max(0.0);
                    }
                    let status = if attempt == 0 {
                        SolveStatus::Converged
                    } else {
                        SolveStatus::Incomplete
                    };
                    return SolveOutcome {
                        status,
                        achieved_dt_s: interval,
                    };
                }
                Err(e) => {
                    debug!(interval_s = interval, error = e.as_str(), "Integration failed, halving interval");
                    reason = e;
                    interval /= 2.0;
                }
            }
        }
        SolveOutcome {
            status: SolveStatus::Failed(reason),
            achieved_dt_s: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GAS_CONSTANT;
    use approx::assert_relative_eq;

    fn solver(json: &str) -> MassActionSolver {
        let mechanism = Mechanism::from_json("test.json", json).unwrap();
        MassActionSolver::new(&mechanism, MassActionOptions::default()).unwrap()
    }

    fn state(solver: &MassActionSolver) -> SolverState {
        let mut state = solver.new_state();
        state.temperature_k = 298.15;
        state.pressure_pa = 101325.0;
        state.number_density_air = 101325.0 / (GAS_CONSTANT * 298.15);
        state
    }

    #[test]
    fn test_first_order_decay() {
        let mut solver = solver(
            r#"{
                "species": [{ "name": "A" }, { "name": "B" }],
                "reactions": [
                    { "type": "ARRHENIUS", "A": 0.01, "reactants": { "A": {} }, "products": { "B": {} } }
                ]
            }"#,
        );
        let mut state = state(&solver);
        state.mixing_ratios = vec![1.0, 0.0];

        let outcome = solver.solve(&mut state, 100.0);
        assert_eq!(outcome.status, SolveStatus::Converged);
        assert_eq!(outcome.achieved_dt_s, 100.0);
        assert_relative_eq!(state.mixing_ratios[0], (-1.0f64).exp(), max_relative = 1e-5);
        assert_relative_eq!(
            state.mixing_ratios[0] + state.mixing_ratios[1],
            1.0,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_second_order_uses_air_density() {
        let mut solver = solver(
            r#"{
                "species": [{ "name": "A" }, { "name": "B" }],
                "reactions": [
                    { "type": "USER_DEFINED", "name": "k", "reactants": { "A": { "qty": 2 } }, "products": { "B": {} } }
                ]
            }"#,
        );
        assert_eq!(solver.rate_parameters()[0].units, "m3 mol-1 s-1");

        let mut state = state(&solver);
        let n_air = state.number_density_air;
        state.mixing_ratios = vec![1.0, 0.0];
        state.rate_parameters = vec![1.0];

        // dA/dt = -2 k c_A^2, analytic A(t) = A0 / (1 + 2 k c0 t)
        solver.solve(&mut state, 10.0);
        let c0 = n_air / PPM;
        let expected = 1.0 / (1.0 + 2.0 * c0 * 10.0);
        assert_relative_eq!(state.mixing_ratios[0], expected, max_relative = 1e-5);
        assert_relative_eq!(state.mixing_ratios[1], (1.0 - expected) / 2.0, max_relative = 1e-5);
    }

    #[test]
    fn test_emission_and_loss_parameters() {
        let mut solver = solver(
            r#"{
                "species": [{ "name": "NO" }],
                "reactions": [
                    { "type": "EMISSION", "name": "NO", "species": "NO" },
                    { "type": "FIRST_ORDER_LOSS", "name": "NO", "species": "NO" }
                ]
            }"#,
        );
        let mut state = state(&solver);
        let n_air = state.number_density_air;
        // 1 ppm s-1 source, no loss
        state.rate_parameters = vec![n_air / PPM, 0.0];

        solver.solve(&mut state, 5.0);
        assert_relative_eq!(state.mixing_ratios[0], 5.0, max_relative = 1e-9);
    }

    #[test]
    fn test_constant_species_fixed() {
        let mut solver = solver(
            r#"{
                "species": [{ "name": "A" }, { "name": "M", "constant": true }],
                "reactions": [
                    { "type": "ARRHENIUS", "A": 1.0e-3, "reactants": { "A": {}, "M": {} } }
                ]
            }"#,
        );
        let mut state = state(&solver);
        state.mixing_ratios = vec![1.0, 2.0];

        solver.solve(&mut state, 1.0);
        assert_eq!(state.mixing_ratios[1], 2.0);
        assert!(state.mixing_ratios[0] < 1.0);
    }

    #[test]
    fn test_invalid_environment_fails() {
        let mut solver = solver(r#"{ "species": [{ "name": "A" }], "reactions": [] }"#);
        let mut state = solver.new_state();
        let outcome = solver.solve(&mut state, 1.0);
        assert!(matches!(outcome.status, SolveStatus::Failed(_)));
        assert_eq!(outcome.achieved_dt_s, 0.0);
    }
}
