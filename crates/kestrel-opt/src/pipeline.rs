//! Pipeline construction and execution.
//!
//! Pipeline shape is a pure function of [`OptimizeOptions`]:
//!
//! | stage | passes | modes |
//! |---|---|---|
//! | `before-all` | plugins | all |
//! | `lowering` | lower-expect, lower-constant-intrinsics | all |
//! | `debug-codegen` | annotate-frame-pointers, always-inline | debug |
//! | `scalar` | early-cse, instcombine, simplify-cfg, dce | release |
//! | `scalar-late` | plugins | all |
//! | `inline` | inline, instcombine, simplify-cfg, dce | release |
//! | `whole-program` | merge-functions, global-dce, strip-dead-prototypes | release, not JIT |
//! | `cleanup` | drop-debug-values | release |
//! | `after-all` | plugins | all |

use std::sync::Arc;
use std::time::Instant;

use kestrel_ir::Module;
use tracing::{debug, trace};

use crate::error::InvariantViolation;
use crate::pass::{FunctionPassAdaptor, Mode, Pass};
use crate::passes::{
    AlwaysInline, AnnotateFramePointers, Dce, DropDebugValues, EarlyCse, GlobalDce, Inline,
    InstCombine, LowerConstantIntrinsics, LowerExpect, MergeFunctions, SimplifyCfg,
    StripDeadPrototypes,
};
use crate::plugin::{InsertionPoint, PluginRegistry};
use crate::report::{OptimizationReport, PassRecord};

/// Inputs to a pipeline run.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeOptions<'a> {
    /// Keep debug fidelity and skip aggressive transforms.
    pub debug: bool,
    /// The unit will be loaded into a running process rather than emitted.
    pub jit: bool,
    /// Code must be position-independent.
    pub pic: bool,
    pub plugins: Option<&'a dyn PluginRegistry>,
}

impl<'a> OptimizeOptions<'a> {
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }

    pub fn release() -> Self {
        Self::default()
    }

    pub fn with_jit(mut self, jit: bool) -> Self {
        self.jit = jit;
        self
    }

    pub fn with_pic(mut self, pic: bool) -> Self {
        self.pic = pic;
        self
    }

    pub fn with_plugins(mut self, plugins: &'a dyn PluginRegistry) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn mode(&self) -> Mode {
        Mode {
            debug: self.debug,
            jit: self.jit,
            pic: self.pic,
        }
    }
}

/// A named group of passes followed by a verification point.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: &'static str,
    pub passes: Vec<Arc<dyn Pass>>,
}

impl Stage {
    fn new(name: &'static str, passes: Vec<Arc<dyn Pass>>) -> Self {
        Self { name, passes }
    }
}

/// An ordered, immutable list of stages for one mode.
#[derive(Debug, Clone)]
pub struct Pipeline {
    mode: Mode,
    stages: Vec<Stage>,
    native_plugins: Vec<(InsertionPoint, Vec<String>)>,
}

fn scalar_passes() -> Vec<Arc<dyn Pass>> {
    vec![
        Arc::new(FunctionPassAdaptor(InstCombine)),
        Arc::new(FunctionPassAdaptor(SimplifyCfg)),
        Arc::new(FunctionPassAdaptor(Dce)),
    ]
}

/// Build the pipeline for `options`, querying the plugin registry once per
/// insertion point.
pub fn build_pipeline(options: &OptimizeOptions<'_>) -> Pipeline {
    let mode = options.mode();
    let plugin_stage = |point: InsertionPoint| {
        let passes = options
            .plugins
            .map(|registry| registry.passes_at(point))
            .unwrap_or_default();
        Stage::new(point.as_str(), passes)
    };

    let mut stages = vec![
        plugin_stage(InsertionPoint::BeforeAll),
        Stage::new(
            "lowering",
            vec![
                Arc::new(FunctionPassAdaptor(LowerExpect)),
                Arc::new(FunctionPassAdaptor(LowerConstantIntrinsics)),
            ],
        ),
    ];

    if mode.debug {
        stages.push(Stage::new(
            "debug-codegen",
            vec![
                Arc::new(FunctionPassAdaptor(AnnotateFramePointers)),
                Arc::new(AlwaysInline),
            ],
        ));
        stages.push(plugin_stage(InsertionPoint::ScalarLate));
    } else {
        let mut scalar: Vec<Arc<dyn Pass>> = vec![Arc::new(FunctionPassAdaptor(EarlyCse))];
        scalar.extend(scalar_passes());
        stages.push(Stage::new("scalar", scalar));
        stages.push(plugin_stage(InsertionPoint::ScalarLate));

        let mut inline: Vec<Arc<dyn Pass>> = vec![Arc::new(Inline::default())];
        inline.extend(scalar_passes());
        stages.push(Stage::new("inline", inline));

        if !mode.jit {
            stages.push(Stage::new(
                "whole-program",
                vec![
                    Arc::new(MergeFunctions),
                    Arc::new(GlobalDce),
                    Arc::new(StripDeadPrototypes),
                ],
            ));
        }
        stages.push(Stage::new(
            "cleanup",
            vec![Arc::new(FunctionPassAdaptor(DropDebugValues))],
        ));
    }
    stages.push(plugin_stage(InsertionPoint::AfterAll));

    let native_plugins = InsertionPoint::ALL
        .into_iter()
        .map(|point| {
            let names = options
                .plugins
                .map(|registry| registry.native_passes_at(point))
                .unwrap_or_default();
            (point, names)
        })
        .collect();

    let pipeline = Pipeline {
        mode,
        stages,
        native_plugins,
    };
    debug!(%mode, passes = ?pipeline.pass_names(), "built optimization pipeline");
    pipeline
}

impl Pipeline {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Every pass name in execution order.
    pub fn pass_names(&self) -> Vec<String> {
        self.stages
            .iter()
            .flat_map(|s| s.passes.iter().map(|p| p.name().to_string()))
            .collect()
    }

    /// The equivalent LLVM new-pass-manager pipeline string.
    ///
    /// Debug maps to `default<O0>` and release to `default<O3>`. JIT uses the
    /// same text; whole-program merging is switched off through the pass
    /// builder options instead, so vectorization and unrolling still run.
    /// Plugin pass names wrap the core.
    pub fn native_pipeline_text(&self) -> String {
        let core = if self.mode.debug {
            "default<O0>"
        } else {
            "default<O3>"
        };
        let native = |point: InsertionPoint| {
            self.native_plugins
                .iter()
                .filter(move |(p, _)| *p == point)
                .flat_map(|(_, names)| names.iter().map(String::as_str))
        };

        native(InsertionPoint::BeforeAll)
            .chain(std::iter::once(core))
            .chain(native(InsertionPoint::ScalarLate))
            .chain(native(InsertionPoint::AfterAll))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Run every stage over `unit`, verifying after each non-empty stage.
    pub fn run(&self, unit: &mut Module) -> Result<Vec<PassRecord>, InvariantViolation> {
        let mut records = Vec::new();
        for stage in &self.stages {
            if stage.passes.is_empty() {
                continue;
            }
            for pass in &stage.passes {
                let start = Instant::now();
                let stats = pass.run(unit, self.mode);
                let elapsed = start.elapsed();
                trace!(stage = stage.name, pass = pass.name(), ?stats, "ran pass");
                records.push(PassRecord {
                    stage: stage.name.to_string(),
                    name: pass.name().to_string(),
                    stats,
                    duration_us: elapsed.as_micros() as u64,
                });
            }
            self.check(unit, stage.name, false)?;
        }
        self.check(unit, "final", true)?;
        Ok(records)
    }

    fn check(&self, unit: &Module, stage: &str, last: bool) -> Result<(), InvariantViolation> {
        let errors = unit.verify().err().unwrap_or_default();
        let leftover_intrinsics = if last {
            unit.lowerable_intrinsic_count()
        } else {
            0
        };
        if errors.is_empty() && leftover_intrinsics == 0 {
            return Ok(());
        }
        Err(InvariantViolation {
            unit: unit.name.clone(),
            stage: stage.to_string(),
            mode: self.mode,
            errors,
            leftover_intrinsics,
        })
    }
}

/// Optimize `unit` in place.
///
/// # Panics
///
/// If the pipeline leaves the unit malformed. That is a defect in the passes
/// (built-in or plugin), not a recoverable condition; use [`try_optimize`]
/// to observe it instead.
pub fn optimize(unit: &mut Module, options: &OptimizeOptions<'_>) -> OptimizationReport {
    match try_optimize(unit, options) {
        Ok(report) => report,
        Err(violation) => panic!("optimization pipeline invariant violated: {violation}"),
    }
}

/// Optimize `unit` in place, returning pipeline invariant violations as errors.
pub fn try_optimize(
    unit: &mut Module,
    options: &OptimizeOptions<'_>,
) -> Result<OptimizationReport, InvariantViolation> {
    let start = Instant::now();
    let functions_before = unit.functions.len();
    let insts_before = total_insts(unit);

    let pipeline = build_pipeline(options);
    let passes = pipeline.run(unit)?;

    let report = OptimizationReport {
        unit: unit.name.clone(),
        mode: pipeline.mode(),
        passes,
        duration_ms: start.elapsed().as_millis() as u64,
        functions_before,
        functions_after: unit.functions.len(),
        insts_before,
        insts_after: total_insts(unit),
    };
    debug!(
        unit = %report.unit,
        insts_before,
        insts_after = report.insts_after,
        "optimized unit"
    );
    Ok(report)
}

fn total_insts(unit: &Module) -> usize {
    unit.functions.iter().map(|f| f.instruction_count()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::PassStats;
    use crate::plugin::PassRegistry;
    use kestrel_ir::{FunctionBuilder, Operand, Type};

    #[derive(Debug)]
    struct Noop(&'static str);

    impl Pass for Noop {
        fn name(&self) -> &str {
            self.0
        }

        fn run(&self, _unit: &mut Module, _mode: Mode) -> PassStats {
            PassStats::default()
        }
    }

    #[test]
    fn debug_pipeline_shape() {
        let names = build_pipeline(&OptimizeOptions::debug()).pass_names();
        assert_eq!(
            names,
            [
                "lower-expect",
                "lower-constant-intrinsics",
                "annotate-frame-pointers",
                "always-inline"
            ]
        );
    }

    #[test]
    fn jit_drops_whole_program_stage() {
        let stat = build_pipeline(&OptimizeOptions::release());
        let jit = build_pipeline(&OptimizeOptions::release().with_jit(true));
        let stage_names = |p: &Pipeline| p.stages().iter().map(|s| s.name).collect::<Vec<_>>();
        assert!(stage_names(&stat).contains(&"whole-program"));
        assert!(!stage_names(&jit).contains(&"whole-program"));
        assert!(!jit.pass_names().iter().any(|n| n == "global-dce"));
    }

    #[test]
    fn plugins_wrap_builtin_passes() {
        let mut registry = PassRegistry::new();
        registry.register(InsertionPoint::AfterAll, Noop("last"));
        registry.register(InsertionPoint::BeforeAll, Noop("first"));
        registry.register(InsertionPoint::ScalarLate, Noop("middle"));
        let options = OptimizeOptions::release().with_plugins(&registry);
        let names = build_pipeline(&options).pass_names();

        assert_eq!(names.first().map(String::as_str), Some("first"));
        assert_eq!(names.last().map(String::as_str), Some("last"));
        let middle = names.iter().position(|n| n == "middle").unwrap();
        let inline = names.iter().position(|n| n == "inline").unwrap();
        let cse = names.iter().position(|n| n == "early-cse").unwrap();
        assert!(cse < middle && middle < inline);
    }

    #[test]
    fn native_text_per_mode() {
        let mut registry = PassRegistry::new();
        registry.register_native(InsertionPoint::BeforeAll, "my-pre");
        registry.register_native(InsertionPoint::AfterAll, "my-post");

        let debug = build_pipeline(&OptimizeOptions::debug());
        assert_eq!(debug.native_pipeline_text(), "default<O0>");
        let jit = build_pipeline(&OptimizeOptions::release().with_jit(true));
        assert_eq!(jit.native_pipeline_text(), "default<O3>");
        let jit_debug = build_pipeline(&OptimizeOptions::debug().with_jit(true));
        assert_eq!(jit_debug.native_pipeline_text(), "default<O0>");
        let release = build_pipeline(&OptimizeOptions::release().with_plugins(&registry));
        assert_eq!(release.native_pipeline_text(), "my-pre,default<O3>,my-post");
    }

    #[test]
    fn report_counts_instructions() {
        let mut b = FunctionBuilder::new("f", vec![], Type::I32);
        let e = b.expect(Operand::Const(1), Operand::Const(1), Type::I32);
        b.ret(Some(e.into()));
        let mut unit = Module::new("m");
        unit.add_function(b.finish());

        let report = optimize(&mut unit, &OptimizeOptions::debug());
        assert_eq!(report.insts_before, 2);
        assert_eq!(report.insts_after, 1);
        assert_eq!(report.functions_after, 1);
        assert!(report.mode.debug);
    }

    #[test]
    fn malformed_input_is_reported_not_healed() {
        let mut b = FunctionBuilder::new("f", vec![], Type::I32);
        b.ret(None);
        let mut unit = Module::new("bad");
        unit.add_function(b.finish());

        let err = try_optimize(&mut unit, &OptimizeOptions::release()).unwrap_err();
        assert_eq!(err.stage, "lowering");
        assert!(!err.errors.is_empty());
    }

    #[test]
    #[should_panic(expected = "invariant violated")]
    fn optimize_panics_on_violation() {
        let mut unit = Module::new("bad");
        unit.add_function(kestrel_ir::Function {
            blocks: vec![kestrel_ir::Block::new("entry")],
            ..kestrel_ir::Function::declare("f", vec![], Type::Void)
        });
        optimize(&mut unit, &OptimizeOptions::debug());
    }
}
