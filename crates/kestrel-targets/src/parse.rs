//! TOML target specs.
//!
//! A target spec names a triple, CPU and feature string plus the options
//! bundle, and is stored as a `.target.toml` file in the `targets/` directory
//! of a project:
//!
//! ```toml
//! triple = "thumbv7em-none-eabihf"
//! cpu = "cortex-m4"
//! features = "-vfp4"
//! pic = false
//!
//! [options]
//! frame-pointer = "all"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};
use crate::machine::TargetMachine;
use crate::options::TargetOptions;
use crate::triple::Triple;

/// Serialized inputs to [`TargetMachine::from_parameters`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetSpec {
    pub triple: Triple,
    /// CPU name; empty selects the host.
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub pic: bool,
    #[serde(default)]
    pub options: TargetOptions,
}

impl TargetSpec {
    pub fn new(triple: Triple) -> Self {
        Self {
            triple,
            cpu: String::new(),
            features: String::new(),
            pic: false,
            options: TargetOptions::default(),
        }
    }

    /// Resolve the spec into a target machine.
    pub fn build(&self) -> Result<TargetMachine> {
        TargetMachine::from_parameters(
            &self.triple,
            &self.cpu,
            &self.features,
            self.options.clone(),
            self.pic,
        )
    }
}

/// Load a target spec from a `.target.toml` file.
pub fn load_target_toml(path: &Path) -> Result<TargetSpec> {
    if !path.exists() {
        return Err(TargetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_target_toml(&content)
}

/// Parse a target spec from a TOML string.
pub fn parse_target_toml(toml_str: &str) -> Result<TargetSpec> {
    let spec: TargetSpec = toml::from_str(toml_str)?;
    Ok(spec)
}

/// Serialize a target spec to pretty TOML.
pub fn target_spec_to_toml(spec: &TargetSpec) -> Result<String> {
    let toml_str = toml::to_string_pretty(spec)?;
    Ok(toml_str)
}

/// Discover all `.target.toml` files in a project's `targets/` directory.
///
/// Returns `(target_name, file_path)` pairs sorted by name.
pub fn discover_targets(project_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let targets_dir = project_dir.join("targets");
    if !targets_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut targets = Vec::new();
    for entry in std::fs::read_dir(&targets_dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".target.toml"))
            .map(str::to_string);
        if let Some(name) = name {
            targets.push((name, path));
        }
    }
    targets.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(targets)
}
