pub mod component;
pub mod domain;
pub mod driver;
pub mod errors;
pub mod io;
pub mod options;
pub mod property;
pub mod standard_properties;
pub mod units;

#[cfg(test)]
mod example_components;
