//! `kestrel init`: write a starter kestrel.toml.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use kestrel_targets::Triple;

use crate::manifest::{template, MANIFEST_NAME};

pub fn run(dir: &Path, triple: Option<&str>) -> Result<()> {
    let path = dir.join(MANIFEST_NAME);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let triple = match triple {
        Some(t) => Triple::parse(t)?,
        None => Triple::host(),
    };
    fs::write(&path, template(&triple.to_string()))
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}
