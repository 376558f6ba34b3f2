pub use boxchem_core::standard_properties::GAS_CONSTANT;
pub use boxchem_core::units::{AVOGADRO, BOLTZMANN};

/// Mixing ratio scale of the gas-phase solver, parts per million.
pub const PPM: f64 = 1.0e6;

/// Reference temperature for temperature-scaled coagulation
/// unit: K
pub const REFERENCE_TEMPERATURE: f64 = 298.15;
