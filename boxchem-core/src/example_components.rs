use crate::component::{check_time_step, BuildContext, Component, ComponentConfig};
use crate::domain::{DomainState, ElementId, Mutator};
use crate::errors::{BoxModelError, BoxModelResult};
use crate::property::Property;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Shared log the test components append to.
pub(crate) type CallLog = Rc<RefCell<Vec<String>>>;

// ============================================================================
// Source - adds `rate * dt` to a property every step
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SourceConfig {
    pub property: String,
    pub units: String,
    pub rate: f64,
}

#[derive(Debug)]
pub(crate) struct Source {
    target: Mutator,
    config: SourceConfig,
}

#[typetag::serde(name = "source")]
impl ComponentConfig for SourceConfig {
    fn build(&self, context: &mut BuildContext) -> BoxModelResult<Box<dyn Component>> {
        context
            .domain
            .register(Property::new(&self.property, &self.units, 0.0))?;
        context
            .output
            .register_output_variable(context.domain, &self.property, &self.units, &self.property)?;
        let target = context.domain.mutator(&self.property, &self.units, "source")?;
        Ok(Box::new(Source {
            target,
            config: self.clone(),
        }))
    }
}

impl Component for Source {
    fn name(&self) -> &str {
        "source"
    }

    fn description(&self) -> &str {
        "Constant source of a single property"
    }

    fn advance_state(
        &mut self,
        state: &mut DomainState,
        element: ElementId,
        _current_time_s: f64,
        dt_s: f64,
    ) -> BoxModelResult<()> {
        if !check_time_step(dt_s)? {
            return Ok(());
        }
        let value = state.get(element, &self.target)?;
        state.update(element, &self.target, value + self.config.rate * dt_s)
    }

    fn preprocess_input(&self, _output_path: &Path) -> BoxModelResult<serde_json::Value> {
        let mut value = serde_json::to_value(&self.config)
            .map_err(|e| BoxModelError::configuration("source", e.to_string()))?;
        value["type"] = json!("source");
        Ok(value)
    }
}

// ============================================================================
// Recorder - logs every call and its own release
// ============================================================================

#[derive(Debug)]
pub(crate) struct Recorder {
    pub name: String,
    pub log: CallLog,
}

impl Recorder {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: Rc::clone(log),
        }
    }
}

impl Component for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records calls for inspection"
    }

    fn advance_state(
        &mut self,
        _state: &mut DomainState,
        element: ElementId,
        current_time_s: f64,
        dt_s: f64,
    ) -> BoxModelResult<()> {
        self.log.borrow_mut().push(format!(
            "{}@{}:{}+{}",
            self.name, element, current_time_s, dt_s
        ));
        Ok(())
    }

    fn preprocess_input(&self, _output_path: &Path) -> BoxModelResult<serde_json::Value> {
        Ok(json!({ "type": "recorder", "name": self.name }))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.log.borrow_mut().push(format!("drop {}", self.name));
    }
}

// ============================================================================
// Failing - reports a solver failure once a time is reached
// ============================================================================

#[derive(Debug)]
pub(crate) struct Failing {
    pub fail_at_s: f64,
}

impl Component for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn description(&self) -> &str {
        "Fails after a given time"
    }

    fn advance_state(
        &mut self,
        _state: &mut DomainState,
        _element: ElementId,
        current_time_s: f64,
        _dt_s: f64,
    ) -> BoxModelResult<()> {
        if current_time_s >= self.fail_at_s {
            return Err(BoxModelError::solver(
                "failing",
                format!("no convergence at t = {current_time_s} s"),
            ));
        }
        Ok(())
    }

    fn preprocess_input(&self, _output_path: &Path) -> BoxModelResult<serde_json::Value> {
        Ok(json!({ "type": "failing" }))
    }
}
