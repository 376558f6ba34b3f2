//! Physical dimensions used to validate unit conversions.
//!
//! Dimensions are integer exponents of the SI base quantities that appear in
//! atmospheric chemistry: mass, length, time, temperature and amount of
//! substance. Two units can only be converted into each other when their
//! dimensions are identical.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Mul, Neg, Sub};

/// Physical dimension of a quantity as exponents of base dimensions.
///
/// For example a molar concentration (`mol m-3`) is N·L⁻³ and a pressure
/// (`Pa`) is M·L⁻¹·T⁻².
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Dimension {
    /// Mass exponent (M)
    pub mass: i8,
    /// Length exponent (L)
    pub length: i8,
    /// Time exponent (T)
    pub time: i8,
    /// Temperature exponent (Θ)
    pub temperature: i8,
    /// Amount of substance exponent (N)
    pub amount: i8,
}

impl Dimension {
    #[must_use]
    pub const fn dimensionless() -> Self {
        Self::new(0, 0, 0, 0, 0)
    }

    #[must_use]
    pub const fn new(mass: i8, length: i8, time: i8, temperature: i8, amount: i8) -> Self {
        Self {
            mass,
            length,
            time,
            temperature,
            amount,
        }
    }

    pub const MASS: Self = Self::new(1, 0, 0, 0, 0);
    pub const LENGTH: Self = Self::new(0, 1, 0, 0, 0);
    pub const TIME: Self = Self::new(0, 0, 1, 0, 0);
    pub const TEMPERATURE: Self = Self::new(0, 0, 0, 1, 0);
    pub const AMOUNT: Self = Self::new(0, 0, 0, 0, 1);

    /// Volume (L³).
    pub const VOLUME: Self = Self::new(0, 3, 0, 0, 0);

    /// Pressure (M·L⁻¹·T⁻²), the dimension of `Pa`.
    pub const PRESSURE: Self = Self::new(1, -1, -2, 0, 0);

    /// Molar concentration (N·L⁻³), the dimension of `mol m-3`.
    pub const CONCENTRATION: Self = Self::new(0, -3, 0, 0, 1);

    /// First-order rate (T⁻¹), the dimension of `s-1`.
    pub const RATE: Self = Self::new(0, 0, -1, 0, 0);

    #[must_use]
    pub const fn is_dimensionless(&self) -> bool {
        self.mass == 0
            && self.length == 0
            && self.time == 0
            && self.temperature == 0
            && self.amount == 0
    }

    /// Two dimensions are compatible if they are identical.
    #[must_use]
    pub const fn is_compatible(&self, other: &Self) -> bool {
        self.mass == other.mass
            && self.length == other.length
            && self.time == other.time
            && self.temperature == other.temperature
            && self.amount == other.amount
    }

    #[must_use]
    pub const fn pow(&self, exp: i8) -> Self {
        Self::new(
            self.mass * exp,
            self.length * exp,
            self.time * exp,
            self.temperature * exp,
            self.amount * exp,
        )
    }
}

impl Mul for Dimension {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::new(
            self.mass + rhs.mass,
            self.length + rhs.length,
            self.time + rhs.time,
            self.temperature + rhs.temperature,
            self.amount + rhs.amount,
        )
    }
}

impl Sub for Dimension {
    type Output = Self;

    /// Subtracting dimensions represents division (subtracting exponents).
    fn sub(self, rhs: Self) -> Self::Output {
        self * -rhs
    }
}

impl Neg for Dimension {
    type Output = Self;

    /// Negating a dimension represents taking its reciprocal.
    fn neg(self) -> Self::Output {
        self.pow(-1)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }

        let symbols = [
            (self.mass, "M"),
            (self.length, "L"),
            (self.time, "T"),
            (self.temperature, "Θ"),
            (self.amount, "N"),
        ];

        let parts: Vec<String> = symbols
            .iter()
            .filter(|(exp, _)| *exp != 0)
            .map(|(exp, sym)| match exp {
                1 => sym.to_string(),
                _ => format!("{sym}^{exp}"),
            })
            .collect();

        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensionless() {
        let dim = Dimension::dimensionless();
        assert!(dim.is_dimensionless());
        assert_eq!(format!("{}", dim), "dimensionless");
    }

    #[test]
    fn test_pressure_is_force_per_area() {
        let force = Dimension::MASS * Dimension::LENGTH * Dimension::TIME.pow(-2);
        let pressure = force - Dimension::LENGTH.pow(2);
        assert_eq!(pressure, Dimension::PRESSURE);
    }

    #[test]
    fn test_concentration() {
        let conc = Dimension::AMOUNT - Dimension::VOLUME;
        assert_eq!(conc, Dimension::CONCENTRATION);
        assert!(!conc.is_compatible(&Dimension::PRESSURE));
    }

    #[test]
    fn test_rate_is_reciprocal_time() {
        assert_eq!(-Dimension::TIME, Dimension::RATE);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Dimension::MASS), "M");
        assert_eq!(format!("{}", Dimension::CONCENTRATION), "L^-3 N");
        assert_eq!(format!("{}", Dimension::PRESSURE), "M L^-1 T^-2");
    }
}
