//! Registry of units used by box-model inputs and outputs.
//!
//! Each unit records its dimension and how to reach the SI base unit:
//! `si = value * to_si_factor + to_si_offset`. The offset is only non-zero for
//! temperature scales with a shifted zero (`degC`, `degF`).

use super::dimension::Dimension;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Avogadro constant (mol-1).
pub const AVOGADRO: f64 = 6.02214076e23;
/// Boltzmann constant (J K-1).
pub const BOLTZMANN: f64 = 1.380649e-23;
/// Standard atmosphere (Pa).
pub const STANDARD_ATMOSPHERE: f64 = 101325.0;

pub const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Offset between the Celsius and Kelvin scales.
pub const CELSIUS_OFFSET: f64 = 273.15;

/// Information about a known unit.
#[derive(Debug, Clone)]
pub struct UnitInfo {
    pub name: String,
    pub dimension: Dimension,
    /// Multiplier to SI base units.
    pub to_si_factor: f64,
    /// Additive shift applied after scaling (affine units only).
    pub to_si_offset: f64,
    /// The unit a prefixed unit was derived from, e.g. `Pa` for `hPa`.
    pub base_unit: Option<String>,
}

impl UnitInfo {
    fn new(name: &str, dimension: Dimension, to_si_factor: f64) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            to_si_factor,
            to_si_offset: 0.0,
            base_unit: None,
        }
    }

    fn affine(name: &str, dimension: Dimension, to_si_factor: f64, to_si_offset: f64) -> Self {
        Self {
            to_si_offset,
            ..Self::new(name, dimension, to_si_factor)
        }
    }

    /// Returns true if converting this unit needs more than a multiplication.
    pub fn is_affine(&self) -> bool {
        self.to_si_offset != 0.0
    }
}

/// SI prefix multipliers.
#[derive(Debug, Clone, Copy)]
pub struct SiPrefix {
    pub symbol: &'static str,
    pub factor: f64,
}

/// SI prefixes from tera to femto, which covers atmospheric usage.
pub static SI_PREFIXES: &[SiPrefix] = &[
    SiPrefix { symbol: "T", factor: 1e12 },
    SiPrefix { symbol: "G", factor: 1e9 },
    SiPrefix { symbol: "M", factor: 1e6 },
    SiPrefix { symbol: "k", factor: 1e3 },
    SiPrefix { symbol: "h", factor: 1e2 },
    SiPrefix { symbol: "da", factor: 1e1 },
    SiPrefix { symbol: "d", factor: 1e-1 },
    SiPrefix { symbol: "c", factor: 1e-2 },
    SiPrefix { symbol: "m", factor: 1e-3 },
    SiPrefix { symbol: "u", factor: 1e-6 },
    SiPrefix { symbol: "n", factor: 1e-9 },
    SiPrefix { symbol: "p", factor: 1e-12 },
    SiPrefix { symbol: "f", factor: 1e-15 },
];

/// The global unit registry.
pub static UNIT_REGISTRY: LazyLock<UnitRegistry> = LazyLock::new(UnitRegistry::new);

/// Registry of known units with their dimensions and conversion factors.
#[derive(Debug)]
pub struct UnitRegistry {
    units: HashMap<String, UnitInfo>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    /// Creates a new unit registry populated with standard units.
    pub fn new() -> Self {
        let mut registry = Self {
            units: HashMap::new(),
            aliases: HashMap::new(),
        };
        registry.register_base_units();
        registry.register_time_units();
        registry.register_amount_units();
        registry.register_pressure_units();
        registry.register_temperature_units();
        registry.register_mixing_ratio_units();
        registry
    }

    /// Looks up a unit by symbol, handling aliases and SI prefixes.
    pub fn lookup(&self, symbol: &str) -> Option<UnitInfo> {
        if let Some(info) = self.exact(symbol) {
            return Some(info.clone());
        }
        self.lookup_prefixed(symbol)
    }

    fn exact(&self, symbol: &str) -> Option<&UnitInfo> {
        self.units.get(symbol).or_else(|| {
            self.aliases
                .get(symbol)
                .and_then(|canonical| self.units.get(*canonical))
        })
    }

    fn lookup_prefixed(&self, symbol: &str) -> Option<UnitInfo> {
        // Longer prefixes first so that "da" wins over "d"
        let mut prefixes: Vec<_> = SI_PREFIXES.iter().collect();
        prefixes.sort_by(|a, b| b.symbol.len().cmp(&a.symbol.len()));

        for prefix in prefixes {
            let Some(base_symbol) = symbol.strip_prefix(prefix.symbol) else {
                continue;
            };
            match self.exact(base_symbol) {
                // Prefixing an offset scale ("mdegC") has no physical meaning
                Some(base_info) if !base_info.is_affine() => {
                    return Some(UnitInfo {
                        name: symbol.to_string(),
                        dimension: base_info.dimension,
                        to_si_factor: base_info.to_si_factor * prefix.factor,
                        to_si_offset: 0.0,
                        base_unit: Some(base_info.name.clone()),
                    });
                }
                _ => continue,
            }
        }
        None
    }

    fn insert(&mut self, info: UnitInfo) {
        self.units.insert(info.name.clone(), info);
    }

    fn register_base_units(&mut self) {
        self.insert(UnitInfo::new("kg", Dimension::MASS, 1.0));
        self.insert(UnitInfo::new("g", Dimension::MASS, 1e-3));
        self.insert(UnitInfo::new("m", Dimension::LENGTH, 1.0));
        self.insert(UnitInfo::new("L", Dimension::VOLUME, 1e-3));
        self.insert(UnitInfo::new("s", Dimension::TIME, 1.0));
        self.insert(UnitInfo::new("K", Dimension::TEMPERATURE, 1.0));
        self.insert(UnitInfo::new("1", Dimension::dimensionless(), 1.0));

        self.aliases.insert("l", "L");
        self.aliases.insert("dimensionless", "1");
    }

    fn register_time_units(&mut self) {
        self.insert(UnitInfo::new("min", Dimension::TIME, SECONDS_PER_MINUTE));
        self.insert(UnitInfo::new("h", Dimension::TIME, SECONDS_PER_HOUR));
        self.insert(UnitInfo::new("day", Dimension::TIME, SECONDS_PER_DAY));

        self.aliases.insert("sec", "s");
        self.aliases.insert("second", "s");
        self.aliases.insert("seconds", "s");
        self.aliases.insert("minute", "min");
        self.aliases.insert("minutes", "min");
        self.aliases.insert("hr", "h");
        self.aliases.insert("hour", "h");
        self.aliases.insert("hours", "h");
        self.aliases.insert("days", "day");
    }

    fn register_amount_units(&mut self) {
        self.insert(UnitInfo::new("mol", Dimension::AMOUNT, 1.0));
        self.insert(UnitInfo::new("molec", Dimension::AMOUNT, 1.0 / AVOGADRO));

        self.aliases.insert("molecule", "molec");
        self.aliases.insert("molecules", "molec");
    }

    fn register_pressure_units(&mut self) {
        self.insert(UnitInfo::new("Pa", Dimension::PRESSURE, 1.0));
        self.insert(UnitInfo::new("atm", Dimension::PRESSURE, STANDARD_ATMOSPHERE));
        self.insert(UnitInfo::new("bar", Dimension::PRESSURE, 1e5));
        self.insert(UnitInfo::new(
            "Torr",
            Dimension::PRESSURE,
            STANDARD_ATMOSPHERE / 760.0,
        ));

        self.aliases.insert("torr", "Torr");
    }

    fn register_temperature_units(&mut self) {
        self.insert(UnitInfo::affine(
            "degC",
            Dimension::TEMPERATURE,
            1.0,
            CELSIUS_OFFSET,
        ));
        self.insert(UnitInfo::affine(
            "degF",
            Dimension::TEMPERATURE,
            5.0 / 9.0,
            CELSIUS_OFFSET - 32.0 * 5.0 / 9.0,
        ));

        self.aliases.insert("C", "degC");
        self.aliases.insert("celsius", "degC");
        self.aliases.insert("F", "degF");
        self.aliases.insert("fahrenheit", "degF");
    }

    fn register_mixing_ratio_units(&mut self) {
        self.insert(UnitInfo::new("ppm", Dimension::dimensionless(), 1e-6));
        self.insert(UnitInfo::new("ppb", Dimension::dimensionless(), 1e-9));
        self.insert(UnitInfo::new("ppt", Dimension::dimensionless(), 1e-12));

        self.aliases.insert("ppmv", "ppm");
        self.aliases.insert("ppbv", "ppb");
    }
}
