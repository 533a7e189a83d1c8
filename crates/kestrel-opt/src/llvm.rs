//! Runs the equivalent pipeline on an LLVM module.

use inkwell::module::Module;
use inkwell::passes::PassBuilderOptions;
use inkwell::OptimizationLevel;
use thiserror::Error;
use tracing::debug;

use crate::pipeline::{build_pipeline, OptimizeOptions};

#[derive(Debug, Error)]
pub enum NativeError {
    #[error(transparent)]
    Target(#[from] kestrel_targets::TargetError),

    #[error("LLVM pass pipeline `{pipeline}` failed: {message}")]
    Passes { pipeline: String, message: String },

    #[error("module failed LLVM verification after `{pipeline}`: {message}")]
    Verify { pipeline: String, message: String },
}

fn pass_options(options: &OptimizeOptions<'_>) -> PassBuilderOptions {
    let release = !options.debug;
    let pbo = PassBuilderOptions::create();
    pbo.set_loop_vectorization(release);
    pbo.set_loop_slp_vectorization(release);
    pbo.set_loop_unrolling(release);
    pbo.set_loop_interleaving(release);
    pbo.set_merge_functions(release && !options.jit);
    pbo
}

/// Optimize `module` for `machine` with the pipeline `options` selects.
pub fn optimize_native(
    module: &Module<'_>,
    machine: &kestrel_targets::TargetMachine,
    options: &OptimizeOptions<'_>,
) -> Result<(), NativeError> {
    let level = if options.debug {
        OptimizationLevel::None
    } else {
        OptimizationLevel::Aggressive
    };
    let tm = machine.to_llvm(level)?;
    let pipeline = build_pipeline(options).native_pipeline_text();
    debug!(%pipeline, triple = %machine.triple(), "running LLVM pipeline");

    machine.apply_llvm_function_attributes(module);
    module.set_triple(&tm.get_triple());
    module.set_data_layout(&tm.get_target_data().get_data_layout());
    module
        .run_passes(&pipeline, &tm, pass_options(options))
        .map_err(|e| NativeError::Passes {
            pipeline: pipeline.clone(),
            message: e.to_string(),
        })?;
    module.verify().map_err(|e| NativeError::Verify {
        pipeline,
        message: e.to_string(),
    })
}
