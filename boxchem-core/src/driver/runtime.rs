//! Driver struct and runtime execution.

use crate::component::Component;
use crate::domain::{Accessor, Domain, DomainState, Mutator};
use crate::errors::{BoxModelError, BoxModelResult};
use crate::io::{InputUpdater, Output, TIME_TOLERANCE_S};
use crate::options::BoxModelOptions;
use crate::standard_properties::air_density;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Lifecycle of a [`Driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Built but not yet started.
    Initializing,
    Running,
    Finalizing,
    /// Output closed and components released.
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initializing => "initializing",
            Phase::Running => "running",
            Phase::Finalizing => "finalizing",
            Phase::Finished => "finished",
        };
        write!(f, "{name}")
    }
}

/// Handles the driver keeps into the standard environment properties.
#[derive(Debug)]
pub(super) struct Environment {
    pub temperature: Accessor,
    pub pressure: Accessor,
    pub number_density_air: Mutator,
}

#[derive(Debug)]
struct InputCursor {
    input: Box<dyn InputUpdater>,
    /// Index of the first entry not yet applied.
    next_index: usize,
}

impl InputCursor {
    fn next_time(&self) -> Option<f64> {
        self.input.entry_times_s().get(self.next_index).copied()
    }
}

/// Advances a domain state through time by operator splitting.
///
/// Every step runs each component, in the order they were added, over each
/// domain element for the same interval. Step sizes follow the chemistry
/// time step but are clamped so the clock never passes an output time, an
/// input entry time or the end of the simulation.
pub struct Driver {
    options: BoxModelOptions,
    domain: Domain,
    state: DomainState,
    components: Vec<Box<dyn Component>>,
    inputs: Vec<InputCursor>,
    output: Box<dyn Output>,
    environment: Environment,
    phase: Phase,
    sim_time_s: f64,
    step_sizes: Vec<f64>,
    output_times: Vec<f64>,
}

impl Driver {
    pub(super) fn new(
        options: BoxModelOptions,
        domain: Domain,
        state: DomainState,
        components: Vec<Box<dyn Component>>,
        inputs: Vec<Box<dyn InputUpdater>>,
        output: Box<dyn Output>,
        environment: Environment,
    ) -> Self {
        Self {
            options,
            domain,
            state,
            components,
            inputs: inputs
                .into_iter()
                .map(|input| InputCursor {
                    input,
                    next_index: 0,
                })
                .collect(),
            output,
            environment,
            phase: Phase::Initializing,
            sim_time_s: 0.0,
            step_sizes: Vec::new(),
            output_times: Vec::new(),
        }
    }

    pub fn options(&self) -> &BoxModelOptions {
        &self.options
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn state(&self) -> &DomainState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current simulation time in seconds since the start of the run.
    pub fn sim_time_s(&self) -> f64 {
        self.sim_time_s
    }

    /// Every step size taken so far.
    pub fn step_sizes(&self) -> &[f64] {
        &self.step_sizes
    }

    /// Times at which output was written.
    pub fn output_times(&self) -> &[f64] {
        &self.output_times
    }

    /// Component names in execution order.
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    /// Returns true if the simulation clock has reached the end of the run.
    pub fn finished(&self) -> bool {
        self.sim_time_s >= self.options.simulation_length_s
    }

    /// Advances the simulation by one step.
    ///
    /// The first call also applies inputs at `t = 0` and writes the initial
    /// output. Returns the step size taken, or `None` once the run is over.
    pub fn step(&mut self) -> BoxModelResult<Option<f64>> {
        match self.phase {
            Phase::Initializing => self.start()?,
            Phase::Running => {}
            Phase::Finalizing | Phase::Finished => return Ok(None),
        }
        if self.finished() {
            return Ok(None);
        }

        let t = self.sim_time_s;
        let dt = self.next_step_size();
        trace!(time_s = t, dt_s = dt, "Advancing components");
        for element in self.domain.iterator() {
            for component in self.components.iter_mut() {
                component.advance_state(&mut self.state, element, t, dt)?;
            }
        }

        self.sim_time_s = self.snap_time(t + dt);
        self.step_sizes.push(dt);

        self.apply_inputs()?;
        self.update_environment()?;
        let at_end = self.finished();
        if at_end || on_boundary(self.sim_time_s, self.options.output_time_step_s) {
            self.write_output()?;
        }
        Ok(Some(dt))
    }

    /// Steps until the end of the simulation, then finalizes.
    ///
    /// An error from any component aborts the run immediately without
    /// flushing output.
    pub fn run(&mut self) -> BoxModelResult<()> {
        while self.step()?.is_some() {}
        self.finalize()
    }

    /// Closes the output and releases components in reverse order.
    ///
    /// Components are released even if closing the output fails; the close
    /// error is returned afterwards.
    pub fn finalize(&mut self) -> BoxModelResult<()> {
        if self.phase == Phase::Finished {
            return Ok(());
        }
        self.phase = Phase::Finalizing;
        info!(time_s = self.sim_time_s, steps = self.step_sizes.len(), "Finalizing");
        let closed = self.output.close();
        if let Err(e) = &closed {
            warn!(error = %e, "Closing output failed");
        }
        while let Some(component) = self.components.pop() {
            debug!(component = component.name(), "Releasing component");
            drop(component);
        }
        self.phase = Phase::Finished;
        closed
    }

    /// Writes a `config.json` able to rebuild this run's options and
    /// components into `output_dir`, along with any files the components
    /// need. Returns the path of the configuration file.
    pub fn preprocess_input(&self, output_dir: &Path) -> BoxModelResult<PathBuf> {
        fs::create_dir_all(output_dir).map_err(|e| {
            BoxModelError::io(format!("creating '{}'", output_dir.display()), e)
        })?;
        let components = self
            .components
            .iter()
            .map(|c| c.preprocess_input(output_dir))
            .collect::<BoxModelResult<Vec<_>>>()?;
        let config = serde_json::json!({
            "box model options": self.options.to_json(),
            "model components": components,
        });

        let path = output_dir.join("config.json");
        let contents = serde_json::to_string_pretty(&config).map_err(|e| {
            BoxModelError::configuration("config.json", e.to_string())
        })?;
        fs::write(&path, contents)
            .map_err(|e| BoxModelError::io(format!("writing '{}'", path.display()), e))?;
        info!(path = %path.display(), "Wrote preprocessed configuration");
        Ok(path)
    }

    fn start(&mut self) -> BoxModelResult<()> {
        info!(
            chemistry_time_step_s = self.options.chemistry_time_step_s,
            output_time_step_s = self.options.output_time_step_s,
            simulation_length_s = self.options.simulation_length_s,
            "Starting run"
        );
        self.phase = Phase::Running;
        self.apply_inputs()?;
        self.update_environment()?;
        self.write_output()
    }

    fn next_step_size(&self) -> f64 {
        let t = self.sim_time_s;
        let mut dt = self.options.simulation_length_s - t;
        dt = dt.min(time_to_boundary(t, self.options.chemistry_time_step_s));
        dt = dt.min(time_to_boundary(t, self.options.output_time_step_s));
        for cursor in &self.inputs {
            if let Some(next) = cursor.next_time() {
                if next > t + TIME_TOLERANCE_S {
                    dt = dt.min(next - t);
                }
            }
        }
        dt
    }

    /// Removes floating point drift when the clock lands on a boundary.
    fn snap_time(&self, t: f64) -> f64 {
        let end = self.options.simulation_length_s;
        if (end - t).abs() <= TIME_TOLERANCE_S * end.max(1.0) {
            return end;
        }
        for step in [self.options.chemistry_time_step_s, self.options.output_time_step_s] {
            let nearest = (t / step).round() * step;
            if (nearest - t).abs() <= TIME_TOLERANCE_S * step.max(1.0) {
                return nearest;
            }
        }
        t
    }

    fn apply_inputs(&mut self) -> BoxModelResult<()> {
        let t = self.sim_time_s;
        for cursor in self.inputs.iter_mut() {
            let times = cursor.input.entry_times_s();
            let due = times[cursor.next_index..]
                .iter()
                .take_while(|&&entry| entry <= t + TIME_TOLERANCE_S)
                .count();
            if due > 0 {
                cursor.input.update_state(&self.domain, &mut self.state, t)?;
                cursor.next_index += due;
            }
        }
        Ok(())
    }

    /// Recomputes the air number density from temperature and pressure.
    fn update_environment(&mut self) -> BoxModelResult<()> {
        let env = &self.environment;
        for element in self.domain.iterator() {
            let temperature = self.state.get(element, &env.temperature)?;
            let pressure = self.state.get(element, &env.pressure)?;
            self.state.update(
                element,
                &env.number_density_air,
                air_density(temperature, pressure),
            )?;
        }
        Ok(())
    }

    fn write_output(&mut self) -> BoxModelResult<()> {
        if self.output_times.last() == Some(&self.sim_time_s) {
            return Ok(());
        }
        debug!(time_s = self.sim_time_s, "Writing output");
        self.output
            .output(self.sim_time_s, &self.domain, &self.state)?;
        self.output_times.push(self.sim_time_s);
        Ok(())
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("options", &self.options)
            .field("components", &self.component_names())
            .field("phase", &self.phase)
            .field("sim_time_s", &self.sim_time_s)
            .finish()
    }
}

/// Time from `t` to the next multiple of `step` strictly after it.
fn time_to_boundary(t: f64, step: f64) -> f64 {
    let intervals = (t / step + TIME_TOLERANCE_S).floor();
    (intervals + 1.0) * step - t
}

fn on_boundary(t: f64, step: f64) -> bool {
    let nearest = (t / step).round() * step;
    (nearest - t).abs() <= TIME_TOLERANCE_S * step.max(1.0)
}
