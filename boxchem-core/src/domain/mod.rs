//! The property registry and the factory for handles and states.
//!
//! A [`Domain`] is the single source of truth for which properties exist and
//! where their values are stored. Registration is append-only: a slot, once
//! assigned, never moves, so every [`Accessor`] or [`Mutator`] issued stays
//! valid for the life of the domain.
//!
//! The schema freezes when the first [`DomainState`] is created. Registering
//! a new property after that point fails with
//! [`BoxModelError::LateRegistration`] rather than resizing live states.
//!
//! ```
//! use boxchem_core::domain::Domain;
//! use boxchem_core::property::AppliesTo;
//!
//! let mut domain = Domain::box_model();
//! domain
//!     .register_variable("pressure", "Pa", 101325.0, AppliesTo::AllCells)
//!     .unwrap();
//!
//! let p_atm = domain.accessor("pressure", "atm", "example").unwrap();
//! let state = domain.new_state();
//! let element = domain.iterator().next().unwrap();
//! assert!((state.get(element, &p_atm).unwrap() - 1.0).abs() < 1e-12);
//! ```

mod handle;
mod iterator;
mod state;

pub use handle::{Accessor, Binding, Mutator, ReadHandle};
pub use iterator::{DomainIterator, ElementId};
pub use state::DomainState;

use crate::errors::{BoxModelError, BoxModelResult};
use crate::property::{AppliesTo, Property};
use crate::units::{Converter, Unit};
use handle::Slot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_DOMAIN_ID: AtomicU64 = AtomicU64::new(1);

/// Identity tag distinguishing domain instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(u64);

impl DomainId {
    fn next() -> Self {
        Self(NEXT_DOMAIN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Spatial layout of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grid {
    /// A single well-mixed box.
    Box,
    /// Independent cells without transport between them.
    Cells(usize),
}

impl Grid {
    pub fn size(&self) -> usize {
        match self {
            Grid::Box => 1,
            Grid::Cells(n) => *n,
        }
    }
}

impl FromStr for Grid {
    type Err = BoxModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "box" => Ok(Grid::Box),
            other => Err(BoxModelError::configuration(
                "box model options.grid",
                format!("unsupported grid type '{other}', expected 'box'"),
            )),
        }
    }
}

#[derive(Debug, Clone)]
struct RegisteredProperty {
    property: Property,
    units: Unit,
    slot: Slot,
}

/// Registry of properties plus factory for handles, iterators and states.
#[derive(Debug)]
pub struct Domain {
    id: DomainId,
    grid: Grid,
    entries: Vec<RegisteredProperty>,
    by_name: HashMap<String, usize>,
    cell_slots: usize,
    shared_slots: usize,
    frozen: bool,
}

impl Domain {
    pub fn new(grid: Grid) -> Self {
        Self {
            id: DomainId::next(),
            grid,
            entries: Vec::new(),
            by_name: HashMap::new(),
            cell_slots: 0,
            shared_slots: 0,
            frozen: false,
        }
    }

    /// A single-element domain.
    pub fn box_model() -> Self {
        Self::new(Grid::Box)
    }

    pub fn id(&self) -> DomainId {
        self.id
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Number of addressable elements.
    pub fn size(&self) -> usize {
        self.grid.size()
    }

    /// True once a state has been created and the schema can no longer grow.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Registers a property, or confirms an identical existing registration.
    ///
    /// Returns `true` if a new slot was allocated.
    pub fn register(&mut self, property: Property) -> BoxModelResult<bool> {
        if let Some(&index) = self.by_name.get(property.name()) {
            let existing = &self.entries[index].property;
            existing.check_compatible(&property)?;
            if existing.default_value() != property.default_value() {
                debug!(
                    name = property.name(),
                    kept = existing.default_value(),
                    ignored = property.default_value(),
                    "Property re-registered with a different default"
                );
            }
            return Ok(false);
        }

        if self.frozen {
            return Err(BoxModelError::LateRegistration(property.name().to_string()));
        }

        let units = property.parsed_units()?;
        let slot = match property.applies_to() {
            AppliesTo::AllCells => {
                self.cell_slots += 1;
                Slot::Cell(self.cell_slots - 1)
            }
            AppliesTo::SingleCell => {
                self.shared_slots += 1;
                Slot::Shared(self.shared_slots - 1)
            }
        };

        debug!(name = property.name(), units = property.units(), "Registered property");
        self.by_name
            .insert(property.name().to_string(), self.entries.len());
        self.entries.push(RegisteredProperty {
            property,
            units,
            slot,
        });
        Ok(true)
    }

    pub fn register_variable(
        &mut self,
        name: &str,
        units: &str,
        default_value: f64,
        applies_to: AppliesTo,
    ) -> BoxModelResult<bool> {
        self.register(Property::new(name, units, default_value).with_applies_to(applies_to))
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Canonical units of a registered property.
    pub fn variable_units(&self, name: &str) -> BoxModelResult<&str> {
        Ok(self.entry(name)?.property.units())
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.by_name.get(name).map(|&i| &self.entries[i].property)
    }

    /// All registered properties, in registration order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter().map(|e| &e.property)
    }

    /// Names of registered properties starting with `prefix`, in
    /// registration order.
    pub fn variable_names(&self, prefix: &str) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.property.name())
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    pub fn accessor(&self, name: &str, units: &str, requester: &str) -> BoxModelResult<Accessor> {
        let (binding, converter) = self.bind(name, units, requester)?;
        Ok(Accessor::new(binding, converter))
    }

    pub fn mutator(&self, name: &str, units: &str, requester: &str) -> BoxModelResult<Mutator> {
        let (binding, converter) = self.bind(name, units, requester)?;
        Ok(Mutator::new(binding, converter))
    }

    /// One accessor per registered property whose name starts with
    /// `name_prefix` and whose scope is `applies_to`.
    ///
    /// Lets a component bind to a family of properties, such as every
    /// chemical species, that another component registered.
    pub fn accessor_set(
        &self,
        name_prefix: &str,
        units: &str,
        applies_to: AppliesTo,
    ) -> BoxModelResult<Vec<Accessor>> {
        self.matching(name_prefix, applies_to)
            .map(|name| self.accessor(name, units, name_prefix))
            .collect()
    }

    /// Read-write counterpart of [`Domain::accessor_set`].
    pub fn mutator_set(
        &self,
        name_prefix: &str,
        units: &str,
        applies_to: AppliesTo,
    ) -> BoxModelResult<Vec<Mutator>> {
        self.matching(name_prefix, applies_to)
            .map(|name| self.mutator(name, units, name_prefix))
            .collect()
    }

    pub fn iterator(&self) -> DomainIterator {
        DomainIterator::new(self.size())
    }

    /// Creates a state with every slot set to its default value.
    ///
    /// Freezes the schema.
    pub fn new_state(&mut self) -> DomainState {
        if !self.frozen {
            debug!(
                domain = %self.id,
                properties = self.entries.len(),
                "Freezing domain schema"
            );
        }
        self.frozen = true;

        let mut cells = vec![0.0; self.cell_slots * self.size()];
        let mut shared = vec![0.0; self.shared_slots];
        for entry in &self.entries {
            let default = entry.property.default_value();
            match entry.slot {
                Slot::Shared(i) => shared[i] = default,
                Slot::Cell(i) => {
                    for element in 0..self.size() {
                        cells[element * self.cell_slots + i] = default;
                    }
                }
            }
        }

        DomainState::new(self.id, self.cell_slots, self.size(), cells, shared)
    }

    fn entry(&self, name: &str) -> BoxModelResult<&RegisteredProperty> {
        self.by_name
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| BoxModelError::UnknownProperty(name.to_string()))
    }

    fn bind(&self, name: &str, units: &str, requester: &str) -> BoxModelResult<(Binding, Converter)> {
        let entry = self.entry(name)?;
        let requested = Unit::parse(units).map_err(|e| BoxModelError::units(name, e))?;
        let converter =
            Converter::between(&entry.units, &requested).map_err(|e| BoxModelError::units(name, e))?;
        let binding = Binding::new(self.id, entry.slot, name, units, requester);
        Ok((binding, converter))
    }

    fn matching<'a>(
        &'a self,
        name_prefix: &'a str,
        applies_to: AppliesTo,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| {
                e.property.applies_to() == applies_to && e.property.name().starts_with(name_prefix)
            })
            .map(|e| e.property.name())
    }
}
