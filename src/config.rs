//! JSON run configuration.
//!
//! ```json
//! {
//!   "box model options": {
//!     "grid": "box",
//!     "chemistry time step [min]": 1,
//!     "output time step": { "value": 1, "units": "h" },
//!     "simulation length [day]": 3
//!   },
//!   "model components": [
//!     { "type": "gas phase chemistry", "mechanism": "mechanism.json" },
//!     { "type": "first-order loss" }
//!   ],
//!   "initial conditions": { "ENV.temperature.K": 280.0, "CONC.O3.mol m-3": 1.7e-6 },
//!   "evolving conditions": { "evolving.csv": {} }
//! }
//! ```
//!
//! Every time option may be given either with a `[unit]` suffix on the key
//! or as a `{value, units}` object. File paths are relative to the
//! directory holding the configuration file. Concentrations must be given in
//! units convertible to `mol m-3`, such as `molec cm-3`; mixing ratios are
//! rejected.

use boxchem_core::component::ComponentConfig;
use boxchem_core::domain::Grid;
use boxchem_core::driver::{Driver, DriverBuilder};
use boxchem_core::errors::{BoxModelError, BoxModelResult};
use boxchem_core::io::Output;
use boxchem_core::options::BoxModelOptions;
use boxchem_core::units::convert_value;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::input;

const OPTIONS: &str = "box model options";

#[derive(Debug, Deserialize)]
struct RawConfiguration {
    #[serde(rename = "box model options")]
    options: Map<String, Value>,
    #[serde(rename = "model components", default)]
    components: Vec<Box<dyn ComponentConfig>>,
    #[serde(rename = "initial conditions", default)]
    initial_conditions: Option<RawInitialConditions>,
    #[serde(rename = "evolving conditions", default)]
    evolving_conditions: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInitialConditions {
    File(PathBuf),
    Values(BTreeMap<String, f64>),
}

/// Where the values applied at `t = 0` come from.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialConditions {
    /// Column header to value, using the CSV header convention.
    Values(BTreeMap<String, f64>),
    /// CSV file with a single data row.
    File(PathBuf),
}

/// A fully parsed run configuration.
#[derive(Debug)]
pub struct Configuration {
    pub options: BoxModelOptions,
    /// Component configurations in execution order.
    pub components: Vec<Box<dyn ComponentConfig>>,
    pub initial_conditions: Option<InitialConditions>,
    /// Evolving conditions files, resolved against `base_dir`.
    pub evolving_conditions: Vec<PathBuf>,
    pub base_dir: PathBuf,
}

impl Configuration {
    pub fn from_file(path: &Path) -> BoxModelResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| BoxModelError::io(format!("reading '{}'", path.display()), e))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        info!(path = %path.display(), "Loading configuration");
        Self::from_json(&path.display().to_string(), &contents, base_dir)
    }

    /// Parses a configuration document. `source` names it in errors.
    pub fn from_json(source: &str, contents: &str, base_dir: PathBuf) -> BoxModelResult<Self> {
        let raw: RawConfiguration = serde_json::from_str(contents)
            .map_err(|e| BoxModelError::configuration(source, e.to_string()))?;

        let options = parse_options(&raw.options)?;
        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        };
        let initial_conditions = raw.initial_conditions.map(|initial| match initial {
            RawInitialConditions::File(path) => InitialConditions::File(resolve(path)),
            RawInitialConditions::Values(values) => InitialConditions::Values(values),
        });
        let evolving_conditions = raw
            .evolving_conditions
            .into_keys()
            .map(|name| resolve(PathBuf::from(name)))
            .collect();
        debug!(
            components = raw.components.len(),
            ?options,
            "Parsed configuration"
        );

        Ok(Self {
            options,
            components: raw.components,
            initial_conditions,
            evolving_conditions,
            base_dir,
        })
    }

    /// Builds every component, attaches the conditions inputs and returns a
    /// driver ready to run.
    pub fn build_driver(&self, output: Box<dyn Output>) -> BoxModelResult<Driver> {
        let mut builder = DriverBuilder::new(self.options, output)?;
        builder.with_base_dir(&self.base_dir);
        for component in &self.components {
            builder.add_component(component.as_ref())?;
        }

        match &self.initial_conditions {
            Some(InitialConditions::Values(values)) => {
                let table = input::initial_conditions(builder.domain(), values)?;
                builder.add_input(Box::new(table));
            }
            Some(InitialConditions::File(path)) => {
                let table = input::read_initial_conditions(builder.domain(), path)?;
                builder.add_input(Box::new(table));
            }
            None => {}
        }
        for path in &self.evolving_conditions {
            let table = input::read_evolving_conditions(builder.domain(), path)?;
            builder.add_input(Box::new(table));
        }

        builder.build()
    }
}

fn parse_options(options: &Map<String, Value>) -> BoxModelResult<BoxModelOptions> {
    let grid = match options.get("grid") {
        None => Grid::Box,
        Some(Value::String(grid)) => grid.parse()?,
        Some(other) => {
            return Err(BoxModelError::configuration(
                format!("{OPTIONS}.grid"),
                format!("expected a string, found {other}"),
            ))
        }
    };

    let parsed = BoxModelOptions {
        grid,
        chemistry_time_step_s: time_option(options, "chemistry time step")?,
        output_time_step_s: time_option(options, "output time step")?,
        simulation_length_s: time_option(options, "simulation length")?,
    };
    parsed.validate()?;
    Ok(parsed)
}

/// Reads a time option in seconds.
///
/// Accepts `"key": {"value": v, "units": u}`, `"key [u]": v` and a bare
/// `"key": v` in seconds.
fn time_option(options: &Map<String, Value>, key: &str) -> BoxModelResult<f64> {
    let path = format!("{OPTIONS}.{key}");
    let number = |value: &Value| {
        value.as_f64().ok_or_else(|| {
            BoxModelError::configuration(&path, format!("expected a number, found {value}"))
        })
    };

    let (value, units) = if let Some(entry) = options.get(key) {
        match entry {
            Value::Object(fields) => {
                let value = fields.get("value").ok_or_else(|| {
                    BoxModelError::configuration(&path, "missing 'value'")
                })?;
                let units = fields.get("units").and_then(Value::as_str).unwrap_or("s");
                (number(value)?, units.to_string())
            }
            other => (number(other)?, "s".to_string()),
        }
    } else {
        let prefix = format!("{key} [");
        let (name, value) = options
            .iter()
            .find(|(name, _)| name.starts_with(&prefix) && name.ends_with(']'))
            .ok_or_else(|| BoxModelError::configuration(&path, "missing required option"))?;
        let units = &name[prefix.len()..name.len() - 1];
        (number(value)?, units.to_string())
    };

    convert_value(value, &units, "s")
        .map_err(|e| BoxModelError::configuration(&path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> BoxModelResult<BoxModelOptions> {
        match value {
            Value::Object(map) => parse_options(&map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_bracketed_units() {
        let parsed = options(json!({
            "grid": "box",
            "chemistry time step [min]": 1.0,
            "output time step [hr]": 1.0,
            "simulation length [day]": 3.0
        }))
        .unwrap();

        assert_eq!(parsed.chemistry_time_step_s, 60.0);
        assert_eq!(parsed.output_time_step_s, 3600.0);
        assert_eq!(parsed.simulation_length_s, 3.0 * 86400.0);
    }

    #[test]
    fn test_value_units_objects() {
        let parsed = options(json!({
            "chemistry time step": { "value": 30, "units": "s" },
            "output time step": { "value": 2, "units": "min" },
            "simulation length": 600
        }))
        .unwrap();

        assert_eq!(parsed.grid, Grid::Box);
        assert_eq!(parsed.chemistry_time_step_s, 30.0);
        assert_eq!(parsed.output_time_step_s, 120.0);
        assert_eq!(parsed.simulation_length_s, 600.0);
    }

    #[test]
    fn test_option_errors_name_key() {
        let missing = options(json!({
            "chemistry time step [min]": 1.0,
            "output time step [min]": 1.0
        }))
        .unwrap_err();
        assert!(missing.to_string().contains("box model options.simulation length"));

        let bad_units = options(json!({
            "chemistry time step [K]": 1.0,
            "output time step [min]": 1.0,
            "simulation length [min]": 1.0
        }))
        .unwrap_err();
        assert!(bad_units.to_string().contains("chemistry time step"));

        let grid = options(json!({
            "grid": "column",
            "chemistry time step [min]": 1.0,
            "output time step [min]": 1.0,
            "simulation length [min]": 1.0
        }))
        .unwrap_err();
        assert!(matches!(grid, BoxModelError::Configuration { .. }));
    }

    #[test]
    fn test_paths_resolve_against_base_dir() {
        let config = Configuration::from_json(
            "test",
            &json!({
                "box model options": {
                    "chemistry time step [s]": 1,
                    "output time step [s]": 1,
                    "simulation length [s]": 1
                },
                "initial conditions": "initial.csv",
                "evolving conditions": { "b.csv": {}, "a.csv": {} }
            })
            .to_string(),
            PathBuf::from("/runs/one"),
        )
        .unwrap();

        assert_eq!(
            config.initial_conditions,
            Some(InitialConditions::File(PathBuf::from("/runs/one/initial.csv")))
        );
        assert_eq!(
            config.evolving_conditions,
            vec![
                PathBuf::from("/runs/one/a.csv"),
                PathBuf::from("/runs/one/b.csv")
            ]
        );
        assert!(config.components.is_empty());
    }

    #[test]
    fn test_unknown_component_type() {
        let err = Configuration::from_json(
            "test",
            &json!({
                "box model options": {
                    "chemistry time step [s]": 1,
                    "output time step [s]": 1,
                    "simulation length [s]": 1
                },
                "model components": [{ "type": "dry deposition" }]
            })
            .to_string(),
            PathBuf::from("."),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    fn write_module_example(dir: &Path, initial_conditions: Value) -> Configuration {
        fs::write(
            dir.join("mechanism.json"),
            json!({
                "species": [{ "name": "O3" }, { "name": "O2" }],
                "reactions": [{
                    "type": "PHOTOLYSIS",
                    "name": "O3_1",
                    "reactants": { "O3": {} },
                    "products": { "O2": { "yield": 1.5 } }
                }]
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.join("evolving.csv"),
            "time.hr,PHOTO.O3_1.s-1\n0,1.0e-4\n12,0\n",
        )
        .unwrap();
        let config = json!({
            "box model options": {
                "grid": "box",
                "chemistry time step [min]": 1,
                "output time step": { "value": 1, "units": "h" },
                "simulation length [day]": 3
            },
            "model components": [
                { "type": "gas phase chemistry", "mechanism": "mechanism.json" },
                { "type": "first-order loss" }
            ],
            "initial conditions": initial_conditions,
            "evolving conditions": { "evolving.csv": {} }
        });
        let path = dir.join("config.json");
        fs::write(&path, config.to_string()).unwrap();
        Configuration::from_file(&path).unwrap()
    }

    #[test]
    fn test_module_example_builds() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_module_example(
            dir.path(),
            json!({ "ENV.temperature.K": 280.0, "CONC.O3.mol m-3": 1.7e-6 }),
        );

        assert_eq!(config.options.simulation_length_s, 3.0 * 86400.0);
        assert_eq!(config.components.len(), 2);
        let driver = config
            .build_driver(Box::new(boxchem_core::io::OutputTable::new()))
            .unwrap();
        assert!(driver.domain().is_variable("chemical_species%O3"));
    }

    #[test]
    fn test_mixing_ratio_concentration_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_module_example(
            dir.path(),
            json!({ "ENV.temperature.K": 280.0, "CONC.O3.ppm": 0.04 }),
        );

        let err = config
            .build_driver(Box::new(boxchem_core::io::OutputTable::new()))
            .unwrap_err();
        assert_eq!(err.kind(), "UnitError");
    }
}
