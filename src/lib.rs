//! Box-model atmospheric chemistry driver.
//!
//! Loads a JSON run configuration, builds the configured components against
//! a shared domain and writes the results as CSV. The domain, handles and
//! driver live in [`boxchem_core`]; the process components in
//! [`boxchem_components`].

pub mod config;
pub mod demos;
pub mod input;
pub mod output;

pub use boxchem_components::components;
pub use boxchem_core::{driver, errors, io, options};
pub use config::{Configuration, InitialConditions};
pub use output::CsvOutput;

