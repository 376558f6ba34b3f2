use thiserror::Error;

use crate::units::{ConversionError, ParseError};

/// Error type for invalid operations.
///
/// Every variant is fatal to a run except where a caller explicitly treats
/// it otherwise.
#[derive(Error, Debug)]
pub enum BoxModelError {
    #[error("Invalid configuration at '{path}': {message}")]
    Configuration { path: String, message: String },
    #[error("Unknown property '{0}'")]
    UnknownProperty(String),
    #[error("Property '{name}' is already registered as {existing}, cannot re-register as {requested}")]
    DuplicateIncompatibleProperty {
        name: String,
        existing: String,
        requested: String,
    },
    #[error("Handle for '{name}' belongs to domain {handle_domain}, not domain {state_domain}")]
    CrossDomainHandle {
        name: String,
        handle_domain: u64,
        state_domain: u64,
    },
    #[error("Solver for '{component}' failed: {message}")]
    SolverDivergence { component: String, message: String },
    #[error("Cannot register '{0}' after a domain state has been created")]
    LateRegistration(String),
    #[error("Invalid time step {0} s, time steps must not be negative")]
    InvalidTimeStep(f64),
    #[error("Element {element} is outside of the domain ({size} elements)")]
    InvalidElement { element: usize, size: usize },
    #[error("Unit error for '{name}': {message}")]
    Units { name: String, message: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BoxModelError {
    /// Name of the error category, printed before the message on fatal errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "ConfigurationError",
            Self::UnknownProperty(_) => "UnknownProperty",
            Self::DuplicateIncompatibleProperty { .. } => "DuplicateIncompatibleProperty",
            Self::CrossDomainHandle { .. } => "CrossDomainHandleError",
            Self::SolverDivergence { .. } => "SolverDivergence",
            Self::LateRegistration(_) => "LateRegistration",
            Self::InvalidTimeStep(_) => "InvalidTimeStep",
            Self::InvalidElement { .. } => "InvalidElement",
            Self::Units { .. } => "UnitError",
            Self::Io { .. } => "IoError",
        }
    }

    pub fn configuration(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn solver(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SolverDivergence {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn units(name: &str, err: impl std::fmt::Display) -> Self {
        Self::Units {
            name: name.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<ParseError> for BoxModelError {
    fn from(e: ParseError) -> Self {
        Self::Units {
            name: String::new(),
            message: e.to_string(),
        }
    }
}

impl From<ConversionError> for BoxModelError {
    fn from(e: ConversionError) -> Self {
        Self::Units {
            name: String::new(),
            message: e.to_string(),
        }
    }
}

/// Convenience type for `Result<T, BoxModelError>`.
pub type BoxModelResult<T> = Result<T, BoxModelError>;
