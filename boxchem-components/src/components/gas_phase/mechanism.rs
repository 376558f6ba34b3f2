//! Chemical mechanism description read from JSON.
//!
//! ```json
//! {
//!   "name": "ozone loss",
//!   "species": [{ "name": "O3" }, { "name": "O2", "constant": true }],
//!   "reactions": [
//!     { "type": "PHOTOLYSIS", "name": "O3_1",
//!       "reactants": { "O3": {} }, "products": { "O2": { "yield": 1.5 } } },
//!     { "type": "ARRHENIUS", "A": 1.0e-3, "C": -500.0,
//!       "reactants": { "O3": { "qty": 2 } }, "products": { "O2": { "yield": 3.0 } } },
//!     { "type": "EMISSION", "name": "O3", "species": "O3" },
//!     { "type": "FIRST_ORDER_LOSS", "name": "O3", "species": "O3" }
//!   ]
//! }
//! ```

use boxchem_core::errors::{BoxModelError, BoxModelResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::{RateParameter, RateParameterKind};
use crate::constants::BOLTZMANN;

fn one() -> f64 {
    1.0
}

fn unit_quantity() -> u32 {
    1
}

fn default_d() -> f64 {
    300.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesDefinition {
    pub name: String,
    /// Held fixed by the solver.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub constant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reactant {
    #[serde(default = "unit_quantity")]
    pub qty: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "yield", default = "one")]
    pub yield_factor: f64,
}

/// A reaction and how its rate constant is obtained.
///
/// Rate constants are in `(m3 mol-1)^(n-1) s-1` for a reaction of order `n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reaction {
    /// $$ k = A \exp(C / T) (T / D)^B (1 + E P) $$
    ///
    /// `Ea` (J) may be given instead of `C`, with `C = -Ea / k_B`.
    Arrhenius {
        reactants: BTreeMap<String, Reactant>,
        #[serde(default)]
        products: BTreeMap<String, Product>,
        #[serde(rename = "A", default = "one")]
        a: f64,
        #[serde(rename = "B", default)]
        b: f64,
        #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
        c: Option<f64>,
        #[serde(rename = "D", default = "default_d")]
        d: f64,
        #[serde(rename = "E", default)]
        e: f64,
        #[serde(rename = "Ea", default, skip_serializing_if = "Option::is_none")]
        ea: Option<f64>,
    },
    Photolysis {
        name: String,
        reactants: BTreeMap<String, Reactant>,
        #[serde(default)]
        products: BTreeMap<String, Product>,
    },
    Emission {
        name: String,
        species: String,
    },
    FirstOrderLoss {
        name: String,
        species: String,
    },
    UserDefined {
        name: String,
        reactants: BTreeMap<String, Reactant>,
        #[serde(default)]
        products: BTreeMap<String, Product>,
    },
}

impl Reaction {
    /// Externally supplied rate parameter, if the reaction takes one.
    pub fn rate_parameter(&self) -> Option<RateParameter> {
        let (name, kind, units) = match self {
            Reaction::Arrhenius { .. } => return None,
            Reaction::Photolysis { name, .. } => (name, RateParameterKind::Photolysis, "s-1".to_string()),
            Reaction::Emission { name, .. } => {
                (name, RateParameterKind::Emission, "mol m-3 s-1".to_string())
            }
            Reaction::FirstOrderLoss { name, .. } => {
                (name, RateParameterKind::FirstOrderLoss, "s-1".to_string())
            }
            Reaction::UserDefined {
                name, reactants, ..
            } => (
                name,
                RateParameterKind::UserDefined,
                rate_constant_units(reaction_order(reactants)),
            ),
        };
        Some(RateParameter {
            name: name.clone(),
            kind,
            units,
        })
    }

    /// Species consumed, with their stoichiometric quantities.
    pub fn reactants(&self) -> Vec<(&str, u32)> {
        match self {
            Reaction::Arrhenius { reactants, .. }
            | Reaction::Photolysis { reactants, .. }
            | Reaction::UserDefined { reactants, .. } => reactants
                .iter()
                .map(|(name, r)| (name.as_str(), r.qty))
                .collect(),
            Reaction::Emission { .. } => Vec::new(),
            Reaction::FirstOrderLoss { species, .. } => vec![(species.as_str(), 1)],
        }
    }

    /// Species produced, with their yields.
    pub fn products(&self) -> Vec<(&str, f64)> {
        match self {
            Reaction::Arrhenius { products, .. }
            | Reaction::Photolysis { products, .. }
            | Reaction::UserDefined { products, .. } => products
                .iter()
                .map(|(name, p)| (name.as_str(), p.yield_factor))
                .collect(),
            Reaction::Emission { species, .. } => vec![(species.as_str(), 1.0)],
            Reaction::FirstOrderLoss { .. } => Vec::new(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Reaction::Arrhenius { .. } => "ARRHENIUS",
            Reaction::Photolysis { .. } => "PHOTOLYSIS",
            Reaction::Emission { .. } => "EMISSION",
            Reaction::FirstOrderLoss { .. } => "FIRST_ORDER_LOSS",
            Reaction::UserDefined { .. } => "USER_DEFINED",
        }
    }
}

fn reaction_order(reactants: &BTreeMap<String, Reactant>) -> u32 {
    reactants.values().map(|r| r.qty).sum()
}

/// Units of a mass-action rate constant for a reaction of the given order.
pub(crate) fn rate_constant_units(order: u32) -> String {
    match order {
        0 => "mol m-3 s-1".to_string(),
        1 => "s-1".to_string(),
        n => format!("m{} mol-{} s-1", 3 * (n - 1), n - 1),
    }
}

/// Arrhenius rate constant at temperature `t` (K) and pressure `p` (Pa).
pub(crate) fn arrhenius(a: f64, b: f64, c: f64, d: f64, e: f64, t: f64, p: f64) -> f64 {
    a * (c / t).exp() * (t / d).powf(b) * (1.0 + e * p)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mechanism {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub species: Vec<SpeciesDefinition>,
    pub reactions: Vec<Reaction>,
}

impl Mechanism {
    /// Parses and validates a mechanism. `source` names the input in errors.
    pub fn from_json(source: &str, contents: &str) -> BoxModelResult<Self> {
        let mechanism: Mechanism = serde_json::from_str(contents)
            .map_err(|e| BoxModelError::configuration(source, e.to_string()))?;
        mechanism.validate(source)?;
        Ok(mechanism)
    }

    pub fn validate(&self, source: &str) -> BoxModelResult<()> {
        let mut names = HashSet::new();
        for (i, species) in self.species.iter().enumerate() {
            if !names.insert(species.name.as_str()) {
                return Err(BoxModelError::configuration(
                    format!("{source}.species[{i}]"),
                    format!("duplicate species '{}'", species.name),
                ));
            }
        }

        let mut parameters = HashSet::new();
        for (i, reaction) in self.reactions.iter().enumerate() {
            let path = format!("{source}.reactions[{i}]");
            let involved = reaction
                .reactants()
                .into_iter()
                .map(|(name, _)| name)
                .chain(reaction.products().into_iter().map(|(name, _)| name));
            for name in involved {
                if !names.contains(name) {
                    return Err(BoxModelError::configuration(
                        path,
                        format!("unknown species '{name}' in {} reaction", reaction.type_name()),
                    ));
                }
            }
            if let Reaction::Arrhenius {
                c: Some(_),
                ea: Some(_),
                ..
            } = reaction
            {
                return Err(BoxModelError::configuration(
                    path,
                    "only one of 'C' and 'Ea' may be given",
                ));
            }
            if let Some(parameter) = reaction.rate_parameter() {
                if !parameters.insert((parameter.kind, parameter.name.clone())) {
                    return Err(BoxModelError::configuration(
                        path,
                        format!("duplicate rate parameter '{}'", parameter.name),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Effective `C` of an Arrhenius reaction.
    pub(crate) fn arrhenius_c(c: Option<f64>, ea: Option<f64>) -> f64 {
        match (c, ea) {
            (Some(c), _) => c,
            (None, Some(ea)) => -ea / BOLTZMANN,
            (None, None) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MECHANISM: &str = r#"{
        "name": "test",
        "species": [{ "name": "A" }, { "name": "B" }, { "name": "M", "constant": true }],
        "reactions": [
            { "type": "ARRHENIUS", "A": 2.0, "reactants": { "A": {}, "M": {} }, "products": { "B": {}, "M": {} } },
            { "type": "PHOTOLYSIS", "name": "B_1", "reactants": { "B": {} }, "products": { "A": { "yield": 2.0 } } },
            { "type": "USER_DEFINED", "name": "k_AA", "reactants": { "A": { "qty": 2 } } },
            { "type": "EMISSION", "name": "A", "species": "A" }
        ]
    }"#;

    #[test]
    fn test_parse() {
        let mechanism = Mechanism::from_json("test.json", MECHANISM).unwrap();
        assert_eq!(mechanism.species.len(), 3);
        assert!(mechanism.species[2].constant);

        match &mechanism.reactions[0] {
            Reaction::Arrhenius { a, b, d, c, .. } => {
                assert_eq!(*a, 2.0);
                assert_eq!(*b, 0.0);
                assert_eq!(*d, 300.0);
                assert!(c.is_none());
            }
            other => panic!("expected an Arrhenius reaction, got {other:?}"),
        }
        assert_eq!(mechanism.reactions[1].products(), vec![("A", 2.0)]);
        assert_eq!(mechanism.reactions[2].reactants(), vec![("A", 2)]);
    }

    #[test]
    fn test_rate_parameters() {
        let mechanism = Mechanism::from_json("test.json", MECHANISM).unwrap();
        let parameters: Vec<_> = mechanism
            .reactions
            .iter()
            .filter_map(|r| r.rate_parameter())
            .collect();
        assert_eq!(parameters.len(), 3);
        assert_eq!(parameters[0].kind, RateParameterKind::Photolysis);
        assert_eq!(parameters[1].units, "m3 mol-1 s-1");
        assert_eq!(parameters[2].units, "mol m-3 s-1");
    }

    #[test]
    fn test_unknown_species_rejected() {
        let json = r#"{
            "species": [{ "name": "A" }],
            "reactions": [{ "type": "FIRST_ORDER_LOSS", "name": "X", "species": "X" }]
        }"#;
        let err = Mechanism::from_json("bad.json", json).unwrap_err();
        assert!(matches!(err, BoxModelError::Configuration { ref path, .. } if path == "bad.json.reactions[0]"));
    }

    #[test]
    fn test_unknown_reaction_type_rejected() {
        let json = r#"{ "species": [], "reactions": [{ "type": "TROE" }] }"#;
        assert!(Mechanism::from_json("bad.json", json).is_err());
    }

    #[test]
    fn test_arrhenius() {
        assert_relative_eq!(arrhenius(1.0, 0.0, 0.0, 300.0, 0.0, 250.0, 1.0e5), 1.0);
        assert_relative_eq!(
            arrhenius(2.0, 1.0, -300.0, 300.0, 0.0, 300.0, 1.0e5),
            2.0 * (-1.0f64).exp(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            Mechanism::arrhenius_c(None, Some(BOLTZMANN * 100.0)),
            -100.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_rate_constant_units() {
        assert_eq!(rate_constant_units(0), "mol m-3 s-1");
        assert_eq!(rate_constant_units(1), "s-1");
        assert_eq!(rate_constant_units(3), "m6 mol-2 s-1");
    }
}
