//! Input and output collaborators of the driver.
//!
//! Inputs push time series (evolving conditions, initial conditions) into the
//! domain state through the same mutators components use. Outputs read the
//! state through accessors at every output event and own all formatting.

use crate::domain::{Accessor, Domain, DomainState, Mutator};
use crate::errors::{BoxModelError, BoxModelResult};
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use tracing::{debug, trace};

/// Tolerance used when matching simulation times against entry times.
pub const TIME_TOLERANCE_S: f64 = 1e-9;

/// Receives the domain state at output events.
pub trait Output {
    /// Adds a column reading `internal_name` in `units`, labelled
    /// `external_name`.
    fn register_output_variable(
        &mut self,
        domain: &Domain,
        internal_name: &str,
        units: &str,
        external_name: &str,
    ) -> BoxModelResult<()>;

    fn output(&mut self, time_s: f64, domain: &Domain, state: &DomainState) -> BoxModelResult<()>;

    /// Flushes anything buffered. Called once while finalizing.
    fn close(&mut self) -> BoxModelResult<()> {
        Ok(())
    }
}

impl<T: Output> Output for Rc<RefCell<T>> {
    fn register_output_variable(
        &mut self,
        domain: &Domain,
        internal_name: &str,
        units: &str,
        external_name: &str,
    ) -> BoxModelResult<()> {
        self.borrow_mut()
            .register_output_variable(domain, internal_name, units, external_name)
    }

    fn output(&mut self, time_s: f64, domain: &Domain, state: &DomainState) -> BoxModelResult<()> {
        self.borrow_mut().output(time_s, domain, state)
    }

    fn close(&mut self) -> BoxModelResult<()> {
        self.borrow_mut().close()
    }
}

/// Pushes externally supplied values into the domain state.
pub trait InputUpdater: Debug {
    /// Times at which the input has new values, sorted ascending.
    fn entry_times_s(&self) -> &[f64];

    /// Applies the latest entry at or before `time_s`.
    ///
    /// If there is no such entry the state is left untouched.
    fn update_state(
        &self,
        domain: &Domain,
        state: &mut DomainState,
        time_s: f64,
    ) -> BoxModelResult<()>;
}

#[derive(Debug)]
struct Column {
    mutator: Mutator,
    values: Vec<f64>,
}

/// A table of values per property over a sorted set of times.
///
/// Values hold from their entry time until the next entry (step
/// interpolation). A NaN value leaves the property as it is at that entry.
#[derive(Debug)]
pub struct ConditionsTable {
    label: String,
    times: Vec<f64>,
    columns: Vec<Column>,
}

impl ConditionsTable {
    pub fn new(label: impl Into<String>, times: Vec<f64>) -> BoxModelResult<Self> {
        let label = label.into();
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(BoxModelError::configuration(
                label,
                "entry times must be sorted in ascending order",
            ));
        }
        Ok(Self {
            label,
            times,
            columns: Vec::new(),
        })
    }

    /// A single entry at `t = 0`.
    pub fn initial(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            times: vec![0.0],
            columns: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn add_column(
        &mut self,
        domain: &Domain,
        name: &str,
        units: &str,
        values: Vec<f64>,
    ) -> BoxModelResult<()> {
        if values.len() != self.times.len() {
            return Err(BoxModelError::configuration(
                format!("{}.{}", self.label, name),
                format!(
                    "expected {} values, found {}",
                    self.times.len(),
                    values.len()
                ),
            ));
        }
        let mutator = domain.mutator(name, units, &self.label)?;
        self.columns.push(Column { mutator, values });
        Ok(())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.mutator.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn latest_index(&self, time_s: f64) -> Option<usize> {
        let count = self
            .times
            .partition_point(|&t| t <= time_s + TIME_TOLERANCE_S);
        count.checked_sub(1)
    }
}

impl InputUpdater for ConditionsTable {
    fn entry_times_s(&self) -> &[f64] {
        &self.times
    }

    fn update_state(
        &self,
        domain: &Domain,
        state: &mut DomainState,
        time_s: f64,
    ) -> BoxModelResult<()> {
        let Some(index) = self.latest_index(time_s) else {
            trace!(input = self.label.as_str(), time_s, "No entry at or before time");
            return Ok(());
        };
        debug!(
            input = self.label.as_str(),
            entry_time_s = self.times[index],
            time_s,
            "Applying input entry"
        );
        for element in domain.iterator() {
            // NaN marks a value left unset at this entry
            for column in self.columns.iter().filter(|c| !c.values[index].is_nan()) {
                state.update(element, &column.mutator, column.values[index])?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct OutputColumn {
    header: String,
    accessor: Accessor,
}

/// One output event for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub time_s: f64,
    pub element: usize,
    pub values: Vec<f64>,
}

/// In-memory output: one row per element per output event.
#[derive(Debug, Default)]
pub struct OutputTable {
    columns: Vec<OutputColumn>,
    rows: Vec<OutputRow>,
    multi_element: bool,
    closed: bool,
}

impl OutputTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column headers, starting with `time.s`.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec!["time.s".to_string()];
        if self.multi_element {
            headers.push("element".to_string());
        }
        headers.extend(self.columns.iter().map(|c| c.header.clone()));
        headers
    }

    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    pub fn times(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.time_s).collect()
    }

    /// All values of one column, looked up by its full header.
    pub fn column(&self, header: &str) -> Option<Vec<f64>> {
        let index = self.columns.iter().position(|c| c.header == header)?;
        Some(self.rows.iter().map(|r| r.values[index]).collect())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Output for OutputTable {
    fn register_output_variable(
        &mut self,
        domain: &Domain,
        internal_name: &str,
        units: &str,
        external_name: &str,
    ) -> BoxModelResult<()> {
        let header = format!("{external_name}.{units}");
        if self.columns.iter().any(|c| c.header == header) {
            return Ok(());
        }
        let accessor = domain.accessor(internal_name, units, "output")?;
        self.multi_element = domain.size() > 1;
        self.columns.push(OutputColumn { header, accessor });
        Ok(())
    }

    fn output(&mut self, time_s: f64, domain: &Domain, state: &DomainState) -> BoxModelResult<()> {
        for element in domain.iterator() {
            let values = self
                .columns
                .iter()
                .map(|c| state.get(element, &c.accessor))
                .collect::<BoxModelResult<Vec<_>>>()?;
            self.rows.push(OutputRow {
                time_s,
                element: element.index(),
                values,
            });
        }
        Ok(())
    }

    fn close(&mut self) -> BoxModelResult<()> {
        self.closed = true;
        Ok(())
    }
}
