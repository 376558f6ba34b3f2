//! Unit values and affine converters between them.
//!
//! ```
//! use boxchem_core::units::Converter;
//!
//! let to_atm = Converter::new("Pa", "atm").unwrap();
//! assert!((to_atm.convert(101325.0) - 1.0).abs() < 1e-12);
//!
//! let to_kelvin = Converter::new("degC", "K").unwrap();
//! assert!((to_kelvin.convert(25.0) - 298.15).abs() < 1e-12);
//! ```

use super::dimension::Dimension;
use super::parser::{ParseError, ParsedUnit};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error(
        "cannot convert from '{from_unit}' to '{to_unit}': incompatible dimensions ({from} vs {to})"
    )]
    IncompatibleDimensions {
        from: Dimension,
        to: Dimension,
        from_unit: String,
        to_unit: String,
    },
    #[error("unit parse error: {0}")]
    ParseError(#[from] ParseError),
}

/// A parsed and validated unit.
///
/// Two units are equal if they have the same normalized representation, so
/// `mol m-3` equals `mol / m^3`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    original: String,
    parsed: ParsedUnit,
}

impl Unit {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let parsed = ParsedUnit::parse(input)?;
        // Resolve every symbol up front so unknown units fail at parse time
        parsed.dimension()?;
        Ok(Self {
            original: input.to_string(),
            parsed,
        })
    }

    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    #[must_use]
    pub fn normalized(&self) -> String {
        self.parsed.normalized()
    }

    pub fn dimension(&self) -> Result<Dimension, ParseError> {
        self.parsed.dimension()
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        match (self.dimension(), other.dimension()) {
            (Ok(d1), Ok(d2)) => d1.is_compatible(&d2),
            _ => false,
        }
    }

    /// Multiplicative factor from this unit to `other`.
    ///
    /// Offsets are ignored, which is correct for rates and differences.
    pub fn conversion_factor(&self, other: &Self) -> Result<f64, ConversionError> {
        Ok(Converter::between(self, other)?.scale())
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed
    }
}

impl Eq for Unit {}

impl std::hash::Hash for Unit {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized())
    }
}

/// Affine transform `to = scale * from + offset` between two units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Converter {
    scale: f64,
    offset: f64,
}

impl Default for Converter {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Converter {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset: 0.0,
    };

    /// Builds the converter taking values in `from` to values in `to`.
    pub fn new(from: &str, to: &str) -> Result<Self, ConversionError> {
        Self::between(&Unit::parse(from)?, &Unit::parse(to)?)
    }

    pub fn between(from: &Unit, to: &Unit) -> Result<Self, ConversionError> {
        if from == to {
            return Ok(Self::IDENTITY);
        }

        let dim_from = from.dimension()?;
        let dim_to = to.dimension()?;
        if !dim_from.is_compatible(&dim_to) {
            return Err(ConversionError::IncompatibleDimensions {
                from: dim_from,
                to: dim_to,
                from_unit: from.original.clone(),
                to_unit: to.original.clone(),
            });
        }

        // si = f_from * x + o_from, y = (si - o_to) / f_to
        let f_from = from.parsed.to_si_factor()?;
        let f_to = to.parsed.to_si_factor()?;
        let o_from = from.parsed.to_si_offset()?;
        let o_to = to.parsed.to_si_offset()?;

        Ok(Self {
            scale: f_from / f_to,
            offset: (o_from - o_to) / f_to,
        })
    }

    #[inline]
    pub fn convert(&self, value: f64) -> f64 {
        if self.is_identity() {
            value
        } else {
            self.scale * value + self.offset
        }
    }

    /// The converter for the opposite direction.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            scale: 1.0 / self.scale,
            offset: -self.offset / self.scale,
        }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}

/// Checks if two unit strings are equivalent after normalization.
pub fn units_equal(a: &str, b: &str) -> Result<bool, ParseError> {
    Ok(Unit::parse(a)? == Unit::parse(b)?)
}

/// Converts a single value between two unit strings.
///
/// Used when reading configuration, where each value is converted once.
pub fn convert_value(value: f64, from: &str, to: &str) -> Result<f64, ConversionError> {
    Ok(Converter::new(from, to)?.convert(value))
}
