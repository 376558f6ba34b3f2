//! Unit string parser.
//!
//! Accepts the notations found in box-model configuration and CSV headers:
//!
//! - Exponents: `m^3`, `m**3`, `m3`, `m-3`
//! - Multiplication: `mol m-3`, `mol*m^-3`, `mol·m-3`
//! - Division: `mol/m^3`, `molec per cm^3`
//!
//! # Grammar
//!
//! ```text
//! unit_expr  = term (('/' | 'per') term)*
//! term       = factor (('*' | '·' | ' ') factor)*
//! factor     = ( symbol | '(' unit_expr ')' ) (('^' | '**')? exponent)?
//! symbol     = [a-zA-Z_][a-zA-Z0-9_]*
//! exponent   = '-'? [0-9]+
//! ```

use super::dimension::Dimension;
use super::registry::UNIT_REGISTRY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty unit string")]
    EmptyUnit,
    #[error("unknown unit: '{0}'")]
    UnknownUnit(String),
    #[error("invalid exponent: '{0}'")]
    InvalidExponent(String),
    #[error("parse failed: {0}")]
    ParseFailed(String),
}

/// A unit as a product of registered symbols with integer exponents.
///
/// `mol m-3 s-1` is stored as `{m: -3, mol: 1, s: -1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedUnit {
    components: BTreeMap<String, i32>,
}

impl ParsedUnit {
    #[must_use]
    pub fn dimensionless() -> Self {
        Self {
            components: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn from_components(components: BTreeMap<String, i32>) -> Self {
        let components = components
            .into_iter()
            .filter(|(_, exp)| *exp != 0)
            .collect();
        Self { components }
    }

    /// Parses a unit string into a `ParsedUnit`.
    ///
    /// ```
    /// use boxchem_core::units::ParsedUnit;
    ///
    /// let a = ParsedUnit::parse("mol m-3").unwrap();
    /// let b = ParsedUnit::parse("mol / m^3").unwrap();
    /// assert_eq!(a, b);
    /// ```
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseError::EmptyUnit);
        }
        if input == "1" || input.eq_ignore_ascii_case("dimensionless") {
            return Ok(Self::dimensionless());
        }

        let mut parser = UnitParser::new(input);
        let unit = parser.parse_expression()?;
        parser.skip_whitespace();
        match parser.peek() {
            None => Ok(unit),
            Some(c) => Err(ParseError::ParseFailed(format!(
                "unexpected '{c}' in '{input}'"
            ))),
        }
    }

    #[must_use]
    pub fn components(&self) -> &BTreeMap<String, i32> {
        &self.components
    }

    /// Computes the overall dimension of this unit.
    pub fn dimension(&self) -> Result<Dimension, ParseError> {
        let mut result = Dimension::dimensionless();
        for (symbol, &exp) in &self.components {
            let info = UNIT_REGISTRY
                .lookup(symbol)
                .ok_or_else(|| ParseError::UnknownUnit(symbol.clone()))?;
            result = result * info.dimension.pow(exp as i8);
        }
        Ok(result)
    }

    /// Multiplier that takes a value in this unit to SI base units.
    pub fn to_si_factor(&self) -> Result<f64, ParseError> {
        let mut factor = 1.0;
        for (symbol, &exp) in &self.components {
            let info = UNIT_REGISTRY
                .lookup(symbol)
                .ok_or_else(|| ParseError::UnknownUnit(symbol.clone()))?;
            factor *= info.to_si_factor.powi(exp);
        }
        Ok(factor)
    }

    /// Additive shift to SI base units.
    ///
    /// Only a bare offset unit such as `degC` has one; inside a compound
    /// (`degC / s`) or raised to a power the unit describes a difference and
    /// the shift is zero.
    pub fn to_si_offset(&self) -> Result<f64, ParseError> {
        match self.components.iter().next() {
            Some((symbol, 1)) if self.components.len() == 1 => UNIT_REGISTRY
                .lookup(symbol)
                .map(|info| info.to_si_offset)
                .ok_or_else(|| ParseError::UnknownUnit(symbol.clone())),
            _ => Ok(0.0),
        }
    }

    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        let mut components = self.components.clone();
        for (symbol, exp) in &other.components {
            *components.entry(symbol.clone()).or_insert(0) += exp;
        }
        Self::from_components(components)
    }

    #[must_use]
    pub fn divide(&self, other: &Self) -> Self {
        self.multiply(&other.pow(-1))
    }

    #[must_use]
    pub fn pow(&self, exp: i32) -> Self {
        let components = self
            .components
            .iter()
            .map(|(k, v)| (k.clone(), v * exp))
            .collect();
        Self::from_components(components)
    }

    /// Canonical spelling used for comparison and output headers.
    ///
    /// Symbols are written alphabetically with signed exponents, the way
    /// box-model units are conventionally written: `mol m-3`, `m-3 s-1`.
    #[must_use]
    pub fn normalized(&self) -> String {
        if self.components.is_empty() {
            return "1".to_string();
        }

        let mut positive: Vec<String> = Vec::new();
        let mut negative: Vec<String> = Vec::new();
        for (symbol, &exp) in &self.components {
            let part = if exp == 1 {
                symbol.clone()
            } else {
                format!("{symbol}{exp}")
            };
            if exp > 0 {
                positive.push(part);
            } else {
                negative.push(part);
            }
        }
        positive.extend(negative);
        positive.join(" ")
    }
}

impl fmt::Display for ParsedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized())
    }
}

struct UnitParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> UnitParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_expression(&mut self) -> Result<ParsedUnit, ParseError> {
        self.skip_whitespace();
        let mut result = self.parse_term()?;

        loop {
            self.skip_whitespace();
            if self.peek() == Some('/') {
                self.advance();
            } else if self.check_keyword("per") {
                self.pos += "per".len();
            } else {
                break;
            }
            self.skip_whitespace();
            let divisor = self.parse_term()?;
            result = result.divide(&divisor);
        }

        Ok(result)
    }

    fn parse_term(&mut self) -> Result<ParsedUnit, ParseError> {
        let mut result = self.parse_factor()?;

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('*') | Some('\u{00B7}') => {
                    self.advance();
                    let factor = self.parse_factor()?;
                    result = result.multiply(&factor);
                }
                Some(c) if Self::is_unit_start(c) && !self.check_keyword("per") => {
                    let factor = self.parse_factor()?;
                    result = result.multiply(&factor);
                }
                _ => break,
            }
        }

        Ok(result)
    }

    fn parse_factor(&mut self) -> Result<ParsedUnit, ParseError> {
        self.skip_whitespace();

        if self.peek() == Some('(') {
            self.advance();
            let inner = self.parse_expression()?;
            self.skip_whitespace();
            if self.peek() != Some(')') {
                return Err(ParseError::ParseFailed(
                    "missing closing parenthesis".into(),
                ));
            }
            self.advance();
            let exp = self.parse_optional_exponent()?;
            return Ok(inner.pow(exp));
        }

        let symbol = self.parse_symbol()?;
        if symbol == "1" {
            // Numerator placeholder in "1/s"
            return Ok(ParsedUnit::dimensionless());
        }
        let exp = self.parse_optional_exponent()?;

        let mut components = BTreeMap::new();
        components.insert(symbol, exp);
        Ok(ParsedUnit::from_components(components))
    }

    fn parse_symbol(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        if self.pos == start {
            return Err(ParseError::ParseFailed(format!(
                "expected unit symbol at position {start} of '{}'",
                self.input
            )));
        }

        let full_symbol = &self.input[start..self.pos];

        // Trailing digits are an exponent ("m3") unless they are part of a
        // registered symbol
        if let Some(last_letter_idx) = full_symbol.rfind(|c: char| c.is_ascii_alphabetic()) {
            let trailing = &full_symbol[last_letter_idx + 1..];
            if !trailing.is_empty() && UNIT_REGISTRY.lookup(full_symbol).is_none() {
                self.pos = start + last_letter_idx + 1;
                return Ok(full_symbol[..=last_letter_idx].to_string());
            }
        }

        Ok(full_symbol.to_string())
    }

    fn parse_optional_exponent(&mut self) -> Result<i32, ParseError> {
        let has_marker = if self.input[self.pos..].starts_with("**") {
            self.pos += 2;
            true
        } else if self.peek() == Some('^') {
            self.advance();
            true
        } else {
            false
        };

        if has_marker {
            self.skip_whitespace();
            return self.parse_exponent();
        }

        // Implicit exponent directly attached to the symbol: "m-3", "s-1"
        match self.peek() {
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_exponent(),
            _ => Ok(1),
        }
    }

    fn parse_exponent(&mut self) -> Result<i32, ParseError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        let exp_str = &self.input[start..self.pos];
        exp_str
            .parse()
            .map_err(|_| ParseError::InvalidExponent(exp_str.to_string()))
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn is_unit_start(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_' || c == '('
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        let rest = &self.input[self.pos..];
        rest.starts_with(keyword)
            && rest[keyword.len()..]
                .chars()
                .next()
                .is_none_or(|c| !c.is_ascii_alphanumeric())
    }
}
