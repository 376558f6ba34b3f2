//! Accessor and mutator handles.
//!
//! A handle is a resolved name lookup: it records which domain issued it,
//! the storage slot of the property and the unit converter for the units the
//! requester asked for. Handles never own storage, they are only meaningful
//! together with a [`DomainState`](super::DomainState) created by the same
//! domain.

use super::DomainId;
use crate::units::Converter;
use std::sync::Arc;

/// Storage location of a property within a domain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Slot {
    /// Index into the per-element block.
    Cell(usize),
    /// Index into the block shared by every element.
    Shared(usize),
}

/// What a handle is bound to.
#[derive(Debug, Clone)]
pub struct Binding {
    pub(crate) domain: DomainId,
    pub(crate) slot: Slot,
    name: Arc<str>,
    units: Arc<str>,
    requester: Arc<str>,
}

impl Binding {
    pub(crate) fn new(domain: DomainId, slot: Slot, name: &str, units: &str, requester: &str) -> Self {
        Self {
            domain,
            slot,
            name: Arc::from(name),
            units: Arc::from(units),
            requester: Arc::from(requester),
        }
    }

    pub fn domain(&self) -> DomainId {
        self.domain
    }

    /// Property name the handle was issued for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units values are read and written in.
    pub fn units(&self) -> &str {
        &self.units
    }

    /// Tag of whoever requested the handle, used in diagnostics.
    pub fn requester(&self) -> &str {
        &self.requester
    }
}

/// Any handle that can read a value.
pub trait ReadHandle {
    fn binding(&self) -> &Binding;

    /// Converter from canonical units into the handle's units.
    fn read_converter(&self) -> Converter;
}

/// Read-only capability for one property.
#[derive(Debug, Clone)]
pub struct Accessor {
    binding: Binding,
    from_canonical: Converter,
}

impl Accessor {
    pub(crate) fn new(binding: Binding, from_canonical: Converter) -> Self {
        Self {
            binding,
            from_canonical,
        }
    }

    pub fn name(&self) -> &str {
        self.binding.name()
    }

    pub fn units(&self) -> &str {
        self.binding.units()
    }
}

impl ReadHandle for Accessor {
    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn read_converter(&self) -> Converter {
        self.from_canonical
    }
}

/// Read-write capability for one property.
#[derive(Debug, Clone)]
pub struct Mutator {
    binding: Binding,
    from_canonical: Converter,
    to_canonical: Converter,
}

impl Mutator {
    pub(crate) fn new(binding: Binding, from_canonical: Converter) -> Self {
        Self {
            binding,
            from_canonical,
            to_canonical: from_canonical.inverse(),
        }
    }

    pub fn name(&self) -> &str {
        self.binding.name()
    }

    pub fn units(&self) -> &str {
        self.binding.units()
    }

    pub(crate) fn write_converter(&self) -> Converter {
        self.to_canonical
    }

    /// A read-only view of the same binding.
    pub fn as_accessor(&self) -> Accessor {
        Accessor::new(self.binding.clone(), self.from_canonical)
    }
}

impl ReadHandle for Mutator {
    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn read_converter(&self) -> Converter {
        self.from_canonical
    }
}
