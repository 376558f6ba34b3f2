//! Unit parsing, normalization and conversion for domain properties.
//!
//! Properties are stored in canonical units (`mol m-3`, `K`, `Pa`, `s`,
//! `s-1`) while callers may read or write them in any compatible unit. The
//! conversion is captured once in a [`Converter`] when a handle is issued, so
//! the per-step cost is a multiply and an add.
//!
//! # Quick Start
//!
//! ```
//! use boxchem_core::units::{Converter, Unit};
//!
//! let u1 = Unit::parse("mol m-3").unwrap();
//! let u2 = Unit::parse("mol / m^3").unwrap();
//! assert_eq!(u1, u2);
//!
//! let c = Converter::new("molec cm-3", "mol m-3").unwrap();
//! assert!(c.convert(6.02214076e17) > 0.99);
//! ```
//!
//! # Supported units
//!
//! | Quantity | Units |
//! |----------|-------|
//! | Pressure | `Pa` (with SI prefixes), `atm`, `bar`, `mbar`, `Torr` |
//! | Temperature | `K`, `degC`/`C`, `degF`/`F` |
//! | Amount | `mol`, `molec` |
//! | Length / volume | `m` (with SI prefixes), `L` |
//! | Time | `s`, `min`, `h`/`hr`/`hour`, `day` |
//! | Mixing ratio | `ppm`, `ppb`, `ppt`, `1` |
//!
//! # Module Structure
//!
//! - [`dimension`]: physical dimension exponents
//! - [`registry`]: known units with conversion factors
//! - [`parser`]: unit string parsing
//! - [`conversion`]: [`Unit`] and [`Converter`]

pub mod conversion;
pub mod dimension;
pub mod parser;
pub mod registry;

pub use conversion::{convert_value, units_equal, ConversionError, Converter, Unit};
pub use dimension::Dimension;
pub use parser::{ParseError, ParsedUnit};
pub use registry::{UnitInfo, UnitRegistry, AVOGADRO, BOLTZMANN, UNIT_REGISTRY};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_api() {
        let u1 = Unit::parse("s-1").unwrap();
        let u2 = Unit::parse("1 / s").unwrap();
        assert_eq!(u1, u2);

        let to_per_hour = Unit::parse("h-1").unwrap();
        let factor = u1.conversion_factor(&to_per_hour).unwrap();
        assert!((factor - 3600.0).abs() < 1e-9, "Conversion factor was {factor}");
    }
}
