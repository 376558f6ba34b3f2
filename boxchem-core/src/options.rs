use crate::domain::Grid;
use crate::errors::{BoxModelError, BoxModelResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Timing and layout of a box model run, all times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxModelOptions {
    pub grid: Grid,
    pub chemistry_time_step_s: f64,
    pub output_time_step_s: f64,
    pub simulation_length_s: f64,
}

impl BoxModelOptions {
    pub fn new(chemistry_time_step_s: f64, output_time_step_s: f64, simulation_length_s: f64) -> Self {
        Self {
            grid: Grid::Box,
            chemistry_time_step_s,
            output_time_step_s,
            simulation_length_s,
        }
    }

    pub fn validate(&self) -> BoxModelResult<()> {
        let checks = [
            ("chemistry time step", self.chemistry_time_step_s),
            ("output time step", self.output_time_step_s),
            ("simulation length", self.simulation_length_s),
        ];
        for (key, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(BoxModelError::configuration(
                    format!("box model options.{key}"),
                    format!("must be a positive number of seconds, got {value}"),
                ));
            }
        }
        if self.grid.size() == 0 {
            return Err(BoxModelError::configuration(
                "box model options.grid",
                "grid must contain at least one element",
            ));
        }
        Ok(())
    }

    /// The options in the form the configuration loader reads back.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "grid": "box",
            "chemistry time step": { "value": self.chemistry_time_step_s, "units": "s" },
            "output time step": { "value": self.output_time_step_s, "units": "s" },
            "simulation length": { "value": self.simulation_length_s, "units": "s" },
        })
    }
}
