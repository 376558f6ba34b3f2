//! Gas-phase chemistry
//!
//! The [`GasPhaseChemistry`] component couples the domain state to a
//! [`ChemistrySolver`]. The solver works in its own units (mixing ratios in
//! ppm) and keeps its species and rate parameters at fixed indices for its
//! whole lifetime, so the adapter binds one handle per index once, when it
//! is built.
//!
//! [`MassActionSolver`] is the solver used by configurations: it reads a
//! mechanism file and integrates the mass-action rate equations.

mod adapter;
mod mass_action;
mod mechanism;

pub use adapter::{GasPhaseChemistry, GasPhaseChemistryConfig};
pub use mass_action::{MassActionOptions, MassActionSolver};
pub use mechanism::{Mechanism, Product, Reactant, Reaction, SpeciesDefinition};

use std::fmt::{self, Debug};

/// Role of an externally supplied rate parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateParameterKind {
    /// Photolysis rate constant (s-1)
    Photolysis,
    /// Zero-order source (mol m-3 s-1)
    Emission,
    /// First-order sink (s-1)
    FirstOrderLoss,
    /// Rate constant supplied as-is, in units that depend on the reaction
    /// order
    UserDefined,
}

/// A rate parameter the solver expects to be set before each solve.
#[derive(Debug, Clone, PartialEq)]
pub struct RateParameter {
    pub name: String,
    pub kind: RateParameterKind,
    /// Units the value is expected in.
    pub units: String,
}

/// The solver's working state.
///
/// Vectors are indexed like [`ChemistrySolver::species`] and
/// [`ChemistrySolver::rate_parameters`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolverState {
    /// unit: ppm
    pub mixing_ratios: Vec<f64>,
    pub rate_parameters: Vec<f64>,
    /// unit: K
    pub temperature_k: f64,
    /// unit: Pa
    pub pressure_pa: f64,
    /// unit: mol m-3
    pub number_density_air: f64,
}

/// Result of a single solve call.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    /// The whole requested interval was integrated.
    Converged,
    /// Only part of the interval was integrated, see
    /// [`SolveOutcome::achieved_dt_s`].
    Incomplete,
    /// Nothing was integrated.
    Failed(String),
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Converged => write!(f, "converged"),
            SolveStatus::Incomplete => write!(f, "incomplete"),
            SolveStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub achieved_dt_s: f64,
}

/// External gas-phase solver contract.
pub trait ChemistrySolver: Debug {
    /// Species names; a species' position is its index for the solver's
    /// lifetime.
    fn species(&self) -> &[String];

    fn rate_parameters(&self) -> &[RateParameter];

    /// A state sized for this solver with every value zeroed.
    fn new_state(&self) -> SolverState;

    /// Advances `state` by up to `dt_s` seconds.
    fn solve(&mut self, state: &mut SolverState, dt_s: f64) -> SolveOutcome;
}
