//! Schema entries describing the named physical quantities of a domain.
//!
//! A [`Property`] carries no value, it only describes one: its hierarchical
//! name (`chemical_species%O3`), canonical units, default value and which
//! domain elements it applies to. Values live in a
//! [`DomainState`](crate::domain::DomainState).

use crate::errors::{BoxModelError, BoxModelResult};
use crate::units::Unit;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between a property's prefix and its base name.
pub const NAME_SEPARATOR: char = '%';

/// Storage type of a property's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DataType {
    #[default]
    Double,
}

/// Which domain elements a property holds a value for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AppliesTo {
    /// One independent value per domain element.
    #[default]
    AllCells,
    /// A single value shared by every domain element.
    SingleCell,
}

impl fmt::Display for AppliesTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppliesTo::AllCells => write!(f, "all cells"),
            AppliesTo::SingleCell => write!(f, "single cell"),
        }
    }
}

/// Description of one named physical quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    name: String,
    units: String,
    #[serde(default)]
    data_type: DataType,
    default_value: f64,
    #[serde(default)]
    applies_to: AppliesTo,
}

impl Property {
    /// Create a double-precision property that applies to all cells.
    pub fn new(name: impl Into<String>, units: impl Into<String>, default_value: f64) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            data_type: DataType::Double,
            default_value,
            applies_to: AppliesTo::AllCells,
        }
    }

    /// Create a property with `prefix%base_name` naming.
    pub fn prefixed(prefix: &str, base_name: &str, units: &str, default_value: f64) -> Self {
        Self::new(join_name(prefix, base_name), units, default_value)
    }

    pub fn with_applies_to(mut self, applies_to: AppliesTo) -> Self {
        self.applies_to = applies_to;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn applies_to(&self) -> AppliesTo {
        self.applies_to
    }

    /// The name with its prefix removed, `O3` for `chemical_species%O3`.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    /// The prefix of a hierarchical name, `chemical_species` for
    /// `chemical_species%O3`.
    pub fn prefix(&self) -> Option<&str> {
        self.name
            .rsplit_once(NAME_SEPARATOR)
            .map(|(prefix, _)| prefix)
    }

    /// Parses the units, failing if they are not a known unit expression.
    pub fn parsed_units(&self) -> BoxModelResult<Unit> {
        Unit::parse(&self.units).map_err(|e| BoxModelError::units(&self.name, e))
    }

    /// Checks that `other` may be merged with this property on re-registration.
    ///
    /// Units are compared after normalization, so `mol m-3` and `mol/m^3`
    /// are the same registration. Differing default values are not an
    /// incompatibility: the first registration wins.
    pub fn check_compatible(&self, other: &Property) -> BoxModelResult<()> {
        let same_units = self.parsed_units()? == other.parsed_units()?;
        if same_units && self.applies_to == other.applies_to && self.data_type == other.data_type
        {
            return Ok(());
        }
        Err(BoxModelError::DuplicateIncompatibleProperty {
            name: self.name.clone(),
            existing: self.signature(),
            requested: other.signature(),
        })
    }

    fn signature(&self) -> String {
        format!(
            "[{}] ({}, {:?})",
            self.units, self.applies_to, self.data_type
        )
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.units)
    }
}

/// Strip everything up to and including the last separator.
pub fn base_name(name: &str) -> &str {
    name.rsplit_once(NAME_SEPARATOR)
        .map_or(name, |(_, base)| base)
}

/// Build a hierarchical `prefix%base_name` property name.
pub fn join_name(prefix: &str, base_name: &str) -> String {
    format!("{prefix}{NAME_SEPARATOR}{base_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_and_prefix() {
        let p = Property::prefixed("chemical_species", "O3", "mol m-3", 0.0);
        assert_eq!(p.name(), "chemical_species%O3");
        assert_eq!(p.base_name(), "O3");
        assert_eq!(p.prefix(), Some("chemical_species"));

        let plain = Property::new("temperature", "K", 298.15);
        assert_eq!(plain.base_name(), "temperature");
        assert_eq!(plain.prefix(), None);
    }

    #[test]
    fn test_compatible_with_equivalent_units() {
        let a = Property::new("chemical_species%O3", "mol m-3", 0.0);
        let b = Property::new("chemical_species%O3", "mol / m^3", 1.0);
        assert!(a.check_compatible(&b).is_ok());
    }

    #[test]
    fn test_incompatible_units() {
        let a = Property::new("chemical_species%O3", "mol m-3", 0.0);
        let b = Property::new("chemical_species%O3", "ppm", 0.0);
        assert!(matches!(
            a.check_compatible(&b),
            Err(BoxModelError::DuplicateIncompatibleProperty { .. })
        ));
    }

    #[test]
    fn test_incompatible_scope() {
        let a = Property::new("temperature", "K", 298.15);
        let b = Property::new("temperature", "K", 298.15).with_applies_to(AppliesTo::SingleCell);
        assert!(a.check_compatible(&b).is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let p: Property = serde_json::from_str(
            r#"{"name": "pressure", "units": "Pa", "default_value": 101325.0}"#,
        )
        .unwrap();
        assert_eq!(p.applies_to(), AppliesTo::AllCells);
        assert_eq!(p.data_type(), DataType::Double);
    }
}
