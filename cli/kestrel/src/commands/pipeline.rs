//! `kestrel pipeline`: show the pass sequence a set of flags selects.

use std::fmt::Write as _;

use anyhow::Result;
use kestrel_opt::{build_pipeline, OptimizeOptions, Pipeline};

pub fn render(pipeline: &Pipeline, native: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Pipeline ({}) ===", pipeline.mode());
    for stage in pipeline.stages() {
        if stage.passes.is_empty() {
            continue;
        }
        let names: Vec<&str> = stage.passes.iter().map(|p| p.name()).collect();
        let _ = writeln!(out, "  {:<14} {}", stage.name, names.join(", "));
    }
    if native {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- LLVM ---");
        let _ = writeln!(out, "  {}", pipeline.native_pipeline_text());
    }
    out
}

pub fn run(options: &OptimizeOptions<'_>, native: bool) -> Result<()> {
    print!("{}", render(&build_pipeline(options), native));
    Ok(())
}
