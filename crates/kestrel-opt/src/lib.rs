//! Optimization pipeline driver for the Kestrel backend.
//!
//! [`optimize`] builds an ordered pipeline from a small set of mode flags
//! (debug, JIT, PIC) and an optional [`PluginRegistry`], runs it over a
//! compilation unit in place and verifies the result after every stage.
//!
//! ```rust
//! use kestrel_ir::{BinOp, FunctionBuilder, Module, Operand, Type};
//! use kestrel_opt::{optimize, OptimizeOptions};
//!
//! let mut b = FunctionBuilder::new("seven", vec![], Type::I32);
//! let v = b.binary(BinOp::Add, Operand::Const(3), Operand::Const(4), Type::I32);
//! b.ret(Some(v.into()));
//! let mut unit = Module::new("demo");
//! unit.add_function(b.finish());
//!
//! let report = optimize(&mut unit, &OptimizeOptions::release());
//! assert!(report.passes.iter().any(|p| p.name == "instcombine"));
//! assert_eq!(unit.functions[0].instruction_count(), 1);
//! ```

pub mod error;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod plugin;
pub mod report;

#[cfg(feature = "llvm")]
pub mod llvm;

pub use error::InvariantViolation;
pub use pass::{FunctionPass, FunctionPassAdaptor, Mode, Pass, PassStats};
pub use pipeline::{build_pipeline, optimize, try_optimize, OptimizeOptions, Pipeline, Stage};
pub use plugin::{InsertionPoint, PassRegistry, PluginRegistry};
pub use report::{OptimizationReport, PassRecord};
