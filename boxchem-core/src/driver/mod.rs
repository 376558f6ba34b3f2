//! The simulation driver couples components, inputs and output around a
//! single domain state.
//!
//! A [`DriverBuilder`] covers initialization: the domain is created, the
//! environment properties are registered and each component registers the
//! properties it needs while it is built. [`DriverBuilder::build`] freezes the
//! domain and creates the state. The [`Driver`] then owns the simulation
//! clock, running every component in registration order over each element
//! for every step, and writing output at output time boundaries.

mod builder;
mod runtime;

#[cfg(test)]
mod tests;

pub use builder::DriverBuilder;
pub use runtime::{Driver, Phase};
