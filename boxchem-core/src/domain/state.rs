use super::handle::{Mutator, ReadHandle, Slot};
use super::{DomainId, ElementId};
use crate::errors::{BoxModelError, BoxModelResult};

/// Backing store for one instantiation of a domain's schema.
///
/// Values are kept in canonical units in two flat blocks: one row of
/// `cell_slots` values per element, and one row of values shared by all
/// elements. The only way in is through handles issued by the domain that
/// created the state.
#[derive(Debug, Clone)]
pub struct DomainState {
    domain: DomainId,
    cell_slots: usize,
    size: usize,
    cells: Vec<f64>,
    shared: Vec<f64>,
}

impl DomainState {
    pub(crate) fn new(
        domain: DomainId,
        cell_slots: usize,
        size: usize,
        cells: Vec<f64>,
        shared: Vec<f64>,
    ) -> Self {
        Self {
            domain,
            cell_slots,
            size,
            cells,
            shared,
        }
    }

    pub fn domain(&self) -> DomainId {
        self.domain
    }

    /// Number of elements this state holds values for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current value of the handle's property, in the handle's units.
    pub fn get<H: ReadHandle>(&self, element: ElementId, handle: &H) -> BoxModelResult<f64> {
        let index = self.locate(element, handle)?;
        let raw = match handle.binding().slot {
            Slot::Cell(_) => self.cells[index],
            Slot::Shared(_) => self.shared[index],
        };
        Ok(handle.read_converter().convert(raw))
    }

    /// Stores `value`, given in the mutator's units.
    pub fn update(&mut self, element: ElementId, mutator: &Mutator, value: f64) -> BoxModelResult<()> {
        let index = self.locate(element, mutator)?;
        let canonical = mutator.write_converter().convert(value);
        match mutator.binding().slot {
            Slot::Cell(_) => self.cells[index] = canonical,
            Slot::Shared(_) => self.shared[index] = canonical,
        }
        Ok(())
    }

    fn locate<H: ReadHandle>(&self, element: ElementId, handle: &H) -> BoxModelResult<usize> {
        let binding = handle.binding();
        if binding.domain != self.domain {
            return Err(BoxModelError::CrossDomainHandle {
                name: binding.name().to_string(),
                handle_domain: binding.domain.value(),
                state_domain: self.domain.value(),
            });
        }
        if element.index() >= self.size {
            return Err(BoxModelError::InvalidElement {
                element: element.index(),
                size: self.size,
            });
        }
        Ok(match binding.slot {
            Slot::Cell(i) => element.index() * self.cell_slots + i,
            Slot::Shared(i) => i,
        })
    }
}
