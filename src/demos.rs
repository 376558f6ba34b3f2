//! Ready-to-run configurations compiled into the binary.

use boxchem_core::errors::{BoxModelError, BoxModelResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE: &str = "config.json";

/// A bundled configuration and the files it refers to.
#[derive(Debug, Clone, Copy)]
pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    files: &'static [(&'static str, &'static str)],
}

pub const DEMOS: &[Demo] = &[
    Demo {
        name: "chapman",
        description: "The Chapman cycle in the upper stratosphere through sunset",
        files: &[
            (CONFIG_FILE, include_str!("../demos/chapman/config.json")),
            ("mechanism.json", include_str!("../demos/chapman/mechanism.json")),
            (
                "evolving_conditions.csv",
                include_str!("../demos/chapman/evolving_conditions.csv"),
            ),
        ],
    },
    Demo {
        name: "analytical",
        description: "Consecutive first-order reactions A -> B -> C with a closed-form solution",
        files: &[
            (CONFIG_FILE, include_str!("../demos/analytical/config.json")),
            ("mechanism.json", include_str!("../demos/analytical/mechanism.json")),
        ],
    },
    Demo {
        name: "flow_tube",
        description: "A fictitious flow tube with ozonolysis, wall loss and seed particles",
        files: &[
            (CONFIG_FILE, include_str!("../demos/flow_tube/config.json")),
            ("mechanism.json", include_str!("../demos/flow_tube/mechanism.json")),
            (
                "initial_conditions.csv",
                include_str!("../demos/flow_tube/initial_conditions.csv"),
            ),
            (
                "evolving_conditions.csv",
                include_str!("../demos/flow_tube/evolving_conditions.csv"),
            ),
        ],
    },
];

/// Names accepted by [`find`].
pub const NAMES: [&str; 3] = ["chapman", "analytical", "flow_tube"];

pub fn find(name: &str) -> BoxModelResult<&'static Demo> {
    DEMOS
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            BoxModelError::configuration(
                "example",
                format!("unknown example '{name}', expected one of {}", NAMES.join(", ")),
            )
        })
}

impl Demo {
    /// Writes the configuration and its inputs into `dir`.
    ///
    /// Returns the path of the configuration file.
    pub fn write_to(&self, dir: &Path) -> BoxModelResult<PathBuf> {
        fs::create_dir_all(dir)
            .map_err(|e| BoxModelError::io(format!("creating '{}'", dir.display()), e))?;
        for (name, contents) in self.files {
            let path = dir.join(name);
            fs::write(&path, contents)
                .map_err(|e| BoxModelError::io(format!("writing '{}'", path.display()), e))?;
        }
        debug!(example = self.name, dir = %dir.display(), "Wrote example files");
        Ok(dir.join(CONFIG_FILE))
    }
}
