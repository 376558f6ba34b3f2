use serde::{Deserialize, Serialize};
use std::fmt;

/// An addressable element (cell) of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(usize);

impl ElementId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Enumerates the elements of a domain in index order.
///
/// A box domain yields exactly one element.
#[derive(Debug, Clone)]
pub struct DomainIterator {
    next: usize,
    size: usize,
}

impl DomainIterator {
    pub(crate) fn new(size: usize) -> Self {
        Self { next: 0, size }
    }
}

impl Iterator for DomainIterator {
    type Item = ElementId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next < self.size {
            let element = ElementId(self.next);
            self.next += 1;
            Some(element)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.size - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DomainIterator {}
