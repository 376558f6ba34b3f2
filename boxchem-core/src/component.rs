//! The capability set shared by every physical-process module.
//!
//! A [`Component`] is built once from a [`ComponentConfig`], registering the
//! properties it produces and consumes against the [`Domain`] as it goes and
//! keeping the resulting handles. After the domain is frozen the driver calls
//! [`Component::advance_state`] once per element per time step, in
//! registration order.

use crate::domain::{Domain, DomainState, ElementId};
use crate::errors::{BoxModelError, BoxModelResult};
use crate::io::Output;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// A physical process that mutates the shared domain state.
pub trait Component: Debug {
    /// Short identifier, also used as the requester tag on handles.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Advances `element` of `state` by `dt_s` seconds starting at
    /// `current_time_s`.
    ///
    /// A zero `dt_s` is a no-op and a negative `dt_s` an error; see
    /// [`check_time_step`].
    fn advance_state(
        &mut self,
        state: &mut DomainState,
        element: ElementId,
        current_time_s: f64,
        dt_s: f64,
    ) -> BoxModelResult<()>;

    /// Writes whatever files are needed to rebuild an equivalent component
    /// into `output_path` and returns its configuration entry.
    ///
    /// Has no effect on simulation state.
    fn preprocess_input(&self, output_path: &Path) -> BoxModelResult<serde_json::Value>;
}

/// Validates a step size.
///
/// Returns `Ok(false)` when there is nothing to do.
pub fn check_time_step(dt_s: f64) -> BoxModelResult<bool> {
    if dt_s < 0.0 || !dt_s.is_finite() {
        return Err(BoxModelError::InvalidTimeStep(dt_s));
    }
    Ok(dt_s > 0.0)
}

/// Collaborators a component registers against while it is built.
pub struct BuildContext<'a> {
    pub domain: &'a mut Domain,
    pub output: &'a mut dyn Output,
    /// Directory relative file paths in the configuration resolve against.
    pub base_dir: PathBuf,
}

impl BuildContext<'_> {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Deserializable description of a component.
///
/// Implementations are selected by the `"type"` key of each entry in the
/// `model components` list.
#[typetag::serde(tag = "type")]
pub trait ComponentConfig: Debug {
    fn build(&self, context: &mut BuildContext) -> BoxModelResult<Box<dyn Component>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_time_step() {
        assert!(check_time_step(1.0).unwrap());
        assert!(!check_time_step(0.0).unwrap());
        assert!(matches!(
            check_time_step(-1.0),
            Err(BoxModelError::InvalidTimeStep(_))
        ));
        assert!(check_time_step(f64::NAN).is_err());
    }
}
