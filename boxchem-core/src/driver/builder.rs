//! Driver builder: everything that happens while the driver is initializing.

use crate::component::{BuildContext, Component, ComponentConfig};
use crate::domain::Domain;
use crate::errors::BoxModelResult;
use crate::io::{InputUpdater, Output};
use crate::options::BoxModelOptions;
use crate::standard_properties::{environment_properties, NUMBER_DENSITY_AIR, PRESSURE, TEMPERATURE};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::runtime::{Driver, Environment};

/// Build a driver from options, components and inputs.
///
/// Construction registers the standard environment properties against a new
/// domain and registers them with the output. Components are built in the
/// order they are added and run in that same order every step. Any failure
/// aborts before a domain state exists.
pub struct DriverBuilder {
    options: BoxModelOptions,
    domain: Domain,
    components: Vec<Box<dyn Component>>,
    inputs: Vec<Box<dyn InputUpdater>>,
    output: Box<dyn Output>,
    base_dir: PathBuf,
}

impl DriverBuilder {
    pub fn new(options: BoxModelOptions, mut output: Box<dyn Output>) -> BoxModelResult<Self> {
        options.validate()?;

        let mut domain = Domain::new(options.grid);
        for property in environment_properties() {
            domain.register(property.to_property())?;
        }
        for (property, external_name) in [
            (&TEMPERATURE, "ENV.temperature"),
            (&PRESSURE, "ENV.pressure"),
            (&NUMBER_DENSITY_AIR, "ENV.number_density_air"),
        ] {
            output.register_output_variable(&domain, property.name, property.units, external_name)?;
        }

        Ok(Self {
            options,
            domain,
            components: Vec::new(),
            inputs: Vec::new(),
            output,
            base_dir: PathBuf::from("."),
        })
    }

    /// Directory relative paths in component configurations resolve against.
    pub fn with_base_dir(&mut self, base_dir: impl AsRef<Path>) -> &mut Self {
        self.base_dir = base_dir.as_ref().to_path_buf();
        self
    }

    pub fn options(&self) -> &BoxModelOptions {
        &self.options
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn domain_mut(&mut self) -> &mut Domain {
        &mut self.domain
    }

    /// Builds a component from its configuration and appends it.
    pub fn add_component(&mut self, config: &dyn ComponentConfig) -> BoxModelResult<&mut Self> {
        let mut context = BuildContext {
            domain: &mut self.domain,
            output: self.output.as_mut(),
            base_dir: self.base_dir.clone(),
        };
        let component = config.build(&mut context)?;
        Ok(self.push_component(component))
    }

    /// Appends an already constructed component.
    pub fn push_component(&mut self, component: Box<dyn Component>) -> &mut Self {
        info!(
            component = component.name(),
            position = self.components.len(),
            "Added component"
        );
        self.components.push(component);
        self
    }

    pub fn add_input(&mut self, input: Box<dyn InputUpdater>) -> &mut Self {
        debug!(entries = input.entry_times_s().len(), "Added input");
        self.inputs.push(input);
        self
    }

    /// Registers an additional output column.
    pub fn add_output_variable(
        &mut self,
        internal_name: &str,
        units: &str,
        external_name: &str,
    ) -> BoxModelResult<&mut Self> {
        self.output
            .register_output_variable(&self.domain, internal_name, units, external_name)?;
        Ok(self)
    }

    /// Freezes the domain, creates the domain state and hands everything to
    /// a [`Driver`].
    pub fn build(self) -> BoxModelResult<Driver> {
        let DriverBuilder {
            options,
            mut domain,
            components,
            inputs,
            output,
            ..
        } = self;

        let environment = Environment {
            temperature: domain.accessor(TEMPERATURE.name, TEMPERATURE.units, "driver")?,
            pressure: domain.accessor(PRESSURE.name, PRESSURE.units, "driver")?,
            number_density_air: domain.mutator(
                NUMBER_DENSITY_AIR.name,
                NUMBER_DENSITY_AIR.units,
                "driver",
            )?,
        };
        let state = domain.new_state();
        info!(
            components = components.len(),
            inputs = inputs.len(),
            elements = domain.size(),
            "Built driver"
        );

        Ok(Driver::new(
            options,
            domain,
            state,
            components,
            inputs,
            output,
            environment,
        ))
    }
}
