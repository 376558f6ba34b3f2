//! Standard property definitions shared by the driver and components.
//!
//! Environment properties are registered by the driver before any component
//! is built, so components can always request them. Process-specific
//! properties follow a `prefix%name` convention and are registered by the
//! component that introduces them.
//!
//! # Naming Conventions
//!
//! - `chemical_species%O3` - gas-phase concentration (mol m-3)
//! - `photolysis_rate_constants%O2_1` - photolysis rate (s-1)
//! - `emission_rates%NO` - emission rate (mol m-3 s-1)
//! - `loss_rate_constants%O3` - first-order loss rate (s-1)
//! - `user_defined_rate_parameters%R1` - free-form rate parameter
//! - `aerosol_mass_concentration%SO4` - particle mass (kg m-3)
//!
//! ```rust
//! use boxchem_core::standard_properties::{species, TEMPERATURE};
//!
//! assert_eq!(TEMPERATURE.name, "temperature");
//! assert_eq!(species("O3").name(), "chemical_species%O3");
//! ```

use crate::property::{AppliesTo, Property};
use crate::units::registry::{AVOGADRO, BOLTZMANN};

/// Molar gas constant (J K-1 mol-1).
pub const GAS_CONSTANT: f64 = BOLTZMANN * AVOGADRO;

pub const DEFAULT_TEMPERATURE: f64 = 298.15;
pub const DEFAULT_PRESSURE: f64 = 101325.0;

pub const CHEMICAL_SPECIES: &str = "chemical_species";
pub const PHOTOLYSIS_RATE_CONSTANTS: &str = "photolysis_rate_constants";
pub const EMISSION_RATES: &str = "emission_rates";
pub const LOSS_RATE_CONSTANTS: &str = "loss_rate_constants";
pub const USER_DEFINED_RATE_PARAMETERS: &str = "user_defined_rate_parameters";
pub const AEROSOL_MASS_CONCENTRATION: &str = "aerosol_mass_concentration";

/// Canonical units for each family of properties.
pub const CONCENTRATION_UNITS: &str = "mol m-3";
pub const FIRST_ORDER_RATE_UNITS: &str = "s-1";
pub const EMISSION_RATE_UNITS: &str = "mol m-3 s-1";
pub const AEROSOL_MASS_UNITS: &str = "kg m-3";
pub const NUMBER_CONCENTRATION_UNITS: &str = "m-3";

/// Property definition usable in `static` items.
#[derive(Debug, Clone, Copy)]
pub struct StaticProperty {
    pub name: &'static str,
    pub units: &'static str,
    pub default_value: f64,
    pub applies_to: AppliesTo,
    pub description: &'static str,
}

impl StaticProperty {
    pub const fn new(
        name: &'static str,
        units: &'static str,
        default_value: f64,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            units,
            default_value,
            applies_to: AppliesTo::AllCells,
            description,
        }
    }

    pub fn to_property(&self) -> Property {
        Property::new(self.name, self.units, self.default_value).with_applies_to(self.applies_to)
    }
}

/// Define a static standard property.
///
/// ```rust
/// use boxchem_core::define_property;
///
/// define_property!(
///     RELATIVE_HUMIDITY,
///     name = "relative_humidity",
///     units = "1",
///     default = 0.5,
///     description = "Relative humidity as a fraction",
/// );
/// assert_eq!(RELATIVE_HUMIDITY.units, "1");
/// ```
#[macro_export]
macro_rules! define_property {
    (
        $var_name:ident,
        name = $name:expr,
        units = $units:expr,
        default = $default:expr,
        description = $desc:expr $(,)?
    ) => {
        #[doc = concat!("Standard property definition for `", $name, "`")]
        pub static $var_name: $crate::standard_properties::StaticProperty =
            $crate::standard_properties::StaticProperty::new($name, $units, $default, $desc);
    };
}

define_property!(
    TEMPERATURE,
    name = "temperature",
    units = "K",
    default = DEFAULT_TEMPERATURE,
    description = "Air temperature",
);

define_property!(
    PRESSURE,
    name = "pressure",
    units = "Pa",
    default = DEFAULT_PRESSURE,
    description = "Air pressure",
);

define_property!(
    NUMBER_DENSITY_AIR,
    name = "number_density_air",
    units = "mol m-3",
    default = DEFAULT_PRESSURE / (GAS_CONSTANT * DEFAULT_TEMPERATURE),
    description = "Molar density of air from the ideal gas law",
);

define_property!(
    AEROSOL_NUMBER_CONCENTRATION,
    name = "aerosol_number_concentration",
    units = "m-3",
    default = 0.0,
    description = "Total particle number concentration",
);

/// Properties the driver registers before building components.
pub fn environment_properties() -> [&'static StaticProperty; 3] {
    [&TEMPERATURE, &PRESSURE, &NUMBER_DENSITY_AIR]
}

/// Molar density of air, `P / (R T)`.
pub fn air_density(temperature_k: f64, pressure_pa: f64) -> f64 {
    pressure_pa / (GAS_CONSTANT * temperature_k)
}

pub fn species(name: &str) -> Property {
    Property::prefixed(CHEMICAL_SPECIES, name, CONCENTRATION_UNITS, 0.0)
}

pub fn photolysis_rate(name: &str) -> Property {
    Property::prefixed(PHOTOLYSIS_RATE_CONSTANTS, name, FIRST_ORDER_RATE_UNITS, 0.0)
}

pub fn emission_rate(name: &str) -> Property {
    Property::prefixed(EMISSION_RATES, name, EMISSION_RATE_UNITS, 0.0)
}

pub fn loss_rate(name: &str) -> Property {
    Property::prefixed(LOSS_RATE_CONSTANTS, name, FIRST_ORDER_RATE_UNITS, 0.0)
}

/// User-defined rate parameters have no fixed units.
pub fn user_defined_rate(name: &str, units: &str) -> Property {
    Property::prefixed(USER_DEFINED_RATE_PARAMETERS, name, units, 0.0)
}

pub fn aerosol_mass(name: &str) -> Property {
    Property::prefixed(AEROSOL_MASS_CONCENTRATION, name, AEROSOL_MASS_UNITS, 0.0)
}
