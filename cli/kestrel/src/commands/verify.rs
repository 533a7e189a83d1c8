//! `kestrel verify`: structural verification of a unit on disk.

use std::path::Path;

use anyhow::{bail, Context, Result};
use kestrel_ir::Module;

pub fn run(input: &Path) -> Result<()> {
    let unit = Module::load(input).with_context(|| format!("loading {}", input.display()))?;
    match unit.verify() {
        Ok(()) => {
            println!(
                "{}: {} function(s), verification PASSED",
                unit.name,
                unit.functions.len()
            );
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                eprintln!("  {error}");
            }
            bail!("{}: {} verification error(s)", input.display(), errors.len())
        }
    }
}
