//! `kestrel opt`: resolve the unit's target and run the optimization pipeline.

use std::path::Path;

use anyhow::{Context, Result};
use kestrel_ir::Module;
use kestrel_opt::{try_optimize, OptimizationReport, OptimizeOptions};
use kestrel_targets::TargetMachine;
use tracing::info;

use crate::manifest::{find_target_spec, KestrelManifest};

/// Build the unit's target machine.
///
/// Order of precedence: `--target`, then `[target]` in kestrel.toml, then
/// the triple the unit itself declares.
pub fn resolve_target(
    project_dir: &Path,
    manifest: Option<&KestrelManifest>,
    unit: &mut Module,
    target: Option<&str>,
    options: &OptimizeOptions<'_>,
) -> Result<TargetMachine> {
    let set_attributes = manifest.map_or(true, |m| m.optimize.set_function_attributes);

    let spec = match target {
        Some(name) => {
            let mut spec = find_target_spec(project_dir, name)?;
            spec.pic |= options.pic;
            Some(spec)
        }
        None => match manifest {
            Some(m) => m.target_spec(project_dir, options.pic)?,
            None => None,
        },
    };

    let machine = match spec {
        Some(spec) => {
            let machine = spec.build()?;
            unit.triple = Some(machine.triple().to_string());
            unit.data_layout = Some(machine.data_layout().to_string());
            unit.target_cpu = Some(machine.cpu().to_string());
            unit.target_features = Some(machine.features().render());
            if set_attributes {
                machine.apply_function_attributes(unit);
            }
            machine
        }
        None => TargetMachine::from_unit(unit, set_attributes, options.pic)
            .with_context(|| format!("resolving target of unit `{}`", unit.name))?,
    };
    Ok(machine)
}

pub fn optimize_unit(
    project_dir: &Path,
    manifest: Option<&KestrelManifest>,
    unit: &mut Module,
    target: Option<&str>,
    options: &OptimizeOptions<'_>,
) -> Result<OptimizationReport> {
    let machine = resolve_target(project_dir, manifest, unit, target, options)?;
    info!(unit = %unit.name, triple = %machine.triple(), cpu = %machine.cpu(), "optimizing");
    let report = try_optimize(unit, options)?;
    Ok(report)
}

pub fn run(
    project_dir: &Path,
    manifest: Option<&KestrelManifest>,
    input: &Path,
    output: Option<&Path>,
    target: Option<&str>,
    options: &OptimizeOptions<'_>,
    show_report: bool,
) -> Result<()> {
    let mut unit = Module::load(input).with_context(|| format!("loading {}", input.display()))?;
    let report = optimize_unit(project_dir, manifest, &mut unit, target, options)?;
    if show_report {
        eprint!("{report}");
    }

    match output {
        Some(path) => unit
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", unit.to_json()?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use kestrel_ir::{BinOp, FunctionBuilder, Operand, Type};
    use kestrel_targets::machine::{TARGET_CPU_ATTR, TARGET_FEATURES_ATTR};
    use kestrel_targets::RelocModel;

    fn unit(triple: Option<&str>) -> Module {
        let mut b = FunctionBuilder::new("seven", vec![], Type::I32);
        let v = b.binary(BinOp::Add, Operand::Const(3), Operand::Const(4), Type::I32);
        b.ret(Some(v.into()));
        let mut unit = Module::new("demo");
        if let Some(triple) = triple {
            unit = unit.with_triple(triple).with_target_cpu("x86-64-v2", "+avx2");
        }
        unit.add_function(b.finish());
        unit
    }

    #[test]
    fn unit_metadata_drives_target_and_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.json");
        unit(Some("x86_64-unknown-linux-gnu")).save(&input).unwrap();

        run(dir.path(), None, &input, Some(&output), None, &OptimizeOptions::release(), false)
            .unwrap();

        let optimized = Module::load(&output).unwrap();
        let f = &optimized.functions[0];
        assert_eq!(f.instruction_count(), 1);
        assert_eq!(f.attribute(TARGET_CPU_ATTR), Some("x86-64-v2"));
        assert!(f.attribute(TARGET_FEATURES_ATTR).unwrap().contains("+avx2"));
    }

    #[test]
    fn unit_without_triple_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = unit(None);
        let err = optimize_unit(dir.path(), None, &mut m, None, &OptimizeOptions::debug())
            .unwrap_err();
        assert!(format!("{err:#}").contains("demo"));
        assert_eq!(m.functions[0].instruction_count(), 2, "unit must be untouched");
    }

    #[test]
    fn manifest_target_overrides_unit_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = KestrelManifest::from_str(
            "[target]\ntriple = \"riscv64-unknown-linux-gnu\"\ncpu = \"generic-rv64\"\n\n[optimize]\nset-function-attributes = false",
        )
        .unwrap();

        let mut m = unit(None);
        let options = OptimizeOptions::release().with_pic(true);
        let machine = resolve_target(dir.path(), Some(&manifest), &mut m, None, &options).unwrap();
        assert_eq!(machine.reloc(), RelocModel::Pic);
        assert_eq!(m.triple.as_deref(), Some("riscv64-unknown-linux-gnu"));
        assert!(m.functions[0].attribute(TARGET_CPU_ATTR).is_none());
    }

    #[test]
    fn named_target_comes_from_targets_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("targets")).unwrap();
        fs::write(
            dir.path().join("targets/m7.target.toml"),
            "triple = \"thumbv7em-none-eabihf\"\ncpu = \"cortex-m7\"\n",
        )
        .unwrap();

        let mut m = unit(Some("x86_64-unknown-linux-gnu"));
        let options = OptimizeOptions::release();
        let machine = resolve_target(dir.path(), None, &mut m, Some("m7"), &options).unwrap();
        assert_eq!(machine.cpu(), "cortex-m7");
        assert_eq!(m.functions[0].attribute(TARGET_CPU_ATTR), Some("cortex-m7"));
        assert_eq!(m.target_cpu.as_deref(), Some("cortex-m7"));

        assert!(resolve_target(dir.path(), None, &mut m, Some("m9"), &options).is_err());
    }
}
