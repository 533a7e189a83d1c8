//! `kestrel.toml` project configuration.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use kestrel_opt::passes::builtin;
use kestrel_opt::{InsertionPoint, PassRegistry};
use kestrel_targets::parse::{discover_targets, load_target_toml};
use kestrel_targets::{TargetOptions, TargetSpec, Triple};
use serde::{Deserialize, Serialize};

pub const MANIFEST_NAME: &str = "kestrel.toml";

/// The top-level `kestrel.toml` structure. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KestrelManifest {
    #[serde(default)]
    pub target: Option<TargetConfig>,
    #[serde(default)]
    pub optimize: OptimizeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

/// Default target: either a named spec from `targets/` or inline parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetConfig {
    /// Name of a `targets/<name>.target.toml` spec.
    #[serde(default)]
    pub spec: Option<String>,
    #[serde(default)]
    pub triple: Option<String>,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub features: Option<String>,
    #[serde(default)]
    pub options: Option<TargetOptions>,
}

/// Default pipeline flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OptimizeConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub jit: bool,
    #[serde(default)]
    pub pic: bool,
    /// Stamp `target-cpu` / `target-features` onto every defined function.
    #[serde(default = "default_true")]
    pub set_function_attributes: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `error`, `warn`, `info`, `debug`, `trace` or `off`.
    #[serde(default)]
    pub level: Option<String>,
}

/// One plugin pass: a built-in pass by name, an LLVM pass name for the
/// native pipeline text, or both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginConfig {
    pub at: InsertionPoint,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default)]
    pub native: Option<String>,
}

impl KestrelManifest {
    /// Search upward from `start_dir` for a `kestrel.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_NAME);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: KestrelManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing kestrel.toml")
    }

    /// Build the plugin registry the `[[plugins]]` entries describe.
    pub fn plugin_registry(&self) -> Result<PassRegistry> {
        let mut registry = PassRegistry::new();
        for (i, plugin) in self.plugins.iter().enumerate() {
            if plugin.pass.is_none() && plugin.native.is_none() {
                bail!("plugins[{i}] at `{}` names neither `pass` nor `native`", plugin.at);
            }
            if let Some(name) = &plugin.pass {
                let pass = builtin(name)
                    .ok_or_else(|| anyhow!("plugins[{i}]: unknown built-in pass `{name}`"))?;
                registry.register_shared(plugin.at, pass);
            }
            if let Some(native) = &plugin.native {
                registry.register_native(plugin.at, native.clone());
            }
        }
        Ok(registry)
    }

    /// Resolve the `[target]` section into a spec, if there is one.
    pub fn target_spec(&self, project_dir: &Path, pic: bool) -> Result<Option<TargetSpec>> {
        let Some(target) = &self.target else {
            return Ok(None);
        };

        let mut spec = match (&target.spec, &target.triple) {
            (Some(_), Some(_)) => bail!("[target] sets both `spec` and `triple`"),
            (Some(name), None) => find_target_spec(project_dir, name)?,
            (None, Some(triple)) => TargetSpec::new(
                Triple::parse(triple).with_context(|| "in [target] triple".to_string())?,
            ),
            (None, None) => return Ok(None),
        };
        if let Some(cpu) = &target.cpu {
            spec.cpu.clone_from(cpu);
        }
        if let Some(features) = &target.features {
            spec.features.clone_from(features);
        }
        if let Some(options) = &target.options {
            spec.options = options.clone();
        }
        spec.pic |= pic;
        Ok(Some(spec))
    }
}

/// Load `targets/<name>.target.toml` from the project.
pub fn find_target_spec(project_dir: &Path, name: &str) -> Result<TargetSpec> {
    let found = discover_targets(project_dir)?
        .into_iter()
        .find(|(n, _)| n == name);
    match found {
        Some((_, path)) => {
            load_target_toml(&path).with_context(|| format!("loading {}", path.display()))
        }
        None => bail!(
            "no target spec `{name}` in {}",
            project_dir.join("targets").display()
        ),
    }
}

/// Generate a starter `kestrel.toml`.
pub fn template(triple: &str) -> String {
    format!(
        r#"[target]
triple = "{triple}"

[optimize]
debug = false
jit = false
pic = false

[logging]
level = "warn"
"#
    )
}
