//! `kestrel target`: architecture listing and target-machine description.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use kestrel_targets::parse::{discover_targets, target_spec_to_toml};
use kestrel_targets::{ArchInfo, FeatureSet, TargetMachine, TargetSpec, Triple};

use crate::manifest::find_target_spec;

/// List supported architectures and any project target specs.
pub fn list(project_dir: &Path) -> Result<()> {
    println!("Supported architectures:");
    println!();
    for arch in ArchInfo::all() {
        let cpus: Vec<&str> = arch.cpus.iter().map(|c| c.name).collect();
        println!(
            "  {:<12} {:>2}-bit  default {:<14} {}",
            arch.name,
            arch.pointer_width,
            arch.default_cpu,
            cpus.join(", ")
        );
    }

    let specs = discover_targets(project_dir)?;
    if !specs.is_empty() {
        println!();
        println!("Project targets:");
        for (name, path) in specs {
            println!("  {name:<25} {}", path.display());
        }
    }
    println!();
    println!("Use 'kestrel target describe <name|triple>' for details.");
    Ok(())
}

/// Resolve `name` (a project spec or a triple) with CLI overrides applied.
pub fn resolve(
    project_dir: &Path,
    name: &str,
    cpu: Option<&str>,
    features: Option<&str>,
    pic: bool,
) -> Result<(TargetSpec, TargetMachine)> {
    let is_spec = discover_targets(project_dir)?.iter().any(|(n, _)| n == name);
    let mut spec = if is_spec {
        find_target_spec(project_dir, name)?
    } else {
        TargetSpec::new(Triple::parse(name).with_context(|| {
            format!("`{name}` is neither a project target nor a valid triple")
        })?)
    };
    if let Some(cpu) = cpu {
        spec.cpu = cpu.to_string();
    }
    if let Some(features) = features {
        spec.features = features.to_string();
    }
    spec.pic |= pic;

    let machine = spec
        .build()
        .with_context(|| format!("building target `{name}`"))?;
    Ok((spec, machine))
}

/// Render a resolved machine in `format` (`human`, `toml` or `json`).
pub fn render(spec: &TargetSpec, machine: &TargetMachine, format: Option<&str>) -> Result<String> {
    match format.unwrap_or("human") {
        "human" => Ok(render_human(machine)),
        "toml" => Ok(target_spec_to_toml(&resolved_spec(spec, machine))?),
        "json" => Ok(serde_json::to_string_pretty(machine)?),
        other => bail!("unknown format `{other}` (expected human, toml or json)"),
    }
}

/// The spec with the host sentinel and feature toggles replaced by what they
/// resolved to, so it rebuilds the same machine anywhere.
fn resolved_spec(spec: &TargetSpec, machine: &TargetMachine) -> TargetSpec {
    let defaults = ArchInfo::for_arch(machine.triple().arch())
        .and_then(|arch| Some(FeatureSet::from_cpu(arch, arch.cpu(machine.cpu())?)))
        .unwrap_or_default();
    let disabled = defaults
        .iter()
        .filter(|f| !machine.features().contains(f))
        .map(|f| format!("-{f}"));
    let enabled = machine.features().iter().map(|f| format!("+{f}"));

    TargetSpec {
        triple: machine.triple().clone(),
        cpu: machine.cpu().to_string(),
        features: disabled.chain(enabled).collect::<Vec<_>>().join(","),
        pic: spec.pic,
        options: spec.options.clone(),
    }
}

fn render_human(machine: &TargetMachine) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Target: {} ===", machine.triple());
    let _ = writeln!(out, "CPU: {}", machine.cpu());
    let _ = writeln!(out);
    let _ = writeln!(out, "--- Machine ---");
    let _ = writeln!(out, "  Pointer width: {} bits", machine.pointer_width());
    let _ = writeln!(out, "  Endianness:    {:?}", machine.endianness());
    let _ = writeln!(out, "  Relocation:    {}", machine.reloc());
    let _ = writeln!(out, "  Code model:    {}", machine.code_model());
    let _ = writeln!(out, "  Data layout:   {}", machine.data_layout());
    let _ = writeln!(out);
    let _ = writeln!(out, "--- Features ({}) ---", machine.features().len());
    for feature in machine.features().iter() {
        let _ = writeln!(out, "  +{feature}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "--- Options ---");
    let options = machine.options();
    let _ = writeln!(out, "  FP contraction: {:?}", options.fp_contract);
    let _ = writeln!(out, "  Frame pointer:  {}", options.frame_pointer.as_attribute());
    let _ = writeln!(out, "  Float ABI:      {:?}", options.float_abi);
    out
}

pub fn describe(
    project_dir: &Path,
    name: &str,
    cpu: Option<&str>,
    features: Option<&str>,
    pic: bool,
    format: Option<&str>,
) -> Result<()> {
    let (spec, machine) = resolve(project_dir, name, cpu, features, pic)?;
    print!("{}", render(&spec, &machine, format)?);
    Ok(())
}
