//! Built-in passes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kestrel_ir::{Function, Operand, ValueId};

use crate::pass::{FunctionPassAdaptor, Pass};

pub mod cfg;
pub mod debug;
pub mod inline;
pub mod ipo;
pub mod lower;
pub mod scalar;

pub use cfg::SimplifyCfg;
pub use debug::{AnnotateFramePointers, DropDebugValues};
pub use inline::{AlwaysInline, Inline, INLINE_THRESHOLD};
pub use ipo::{GlobalDce, MergeFunctions, StripDeadPrototypes};
pub use lower::{LowerConstantIntrinsics, LowerExpect};
pub use scalar::{Dce, EarlyCse, InstCombine};

/// Names accepted by [`builtin`].
pub const BUILTIN_NAMES: &[&str] = &[
    "lower-expect",
    "lower-constant-intrinsics",
    "annotate-frame-pointers",
    "always-inline",
    "early-cse",
    "instcombine",
    "simplify-cfg",
    "dce",
    "inline",
    "merge-functions",
    "global-dce",
    "strip-dead-prototypes",
    "drop-debug-values",
];

/// Look up a built-in pass by name.
pub fn builtin(name: &str) -> Option<Arc<dyn Pass>> {
    let pass: Arc<dyn Pass> = match name {
        "lower-expect" => Arc::new(FunctionPassAdaptor(LowerExpect)),
        "lower-constant-intrinsics" => Arc::new(FunctionPassAdaptor(LowerConstantIntrinsics)),
        "annotate-frame-pointers" => Arc::new(FunctionPassAdaptor(AnnotateFramePointers)),
        "always-inline" => Arc::new(AlwaysInline),
        "early-cse" => Arc::new(FunctionPassAdaptor(EarlyCse)),
        "instcombine" => Arc::new(FunctionPassAdaptor(InstCombine)),
        "simplify-cfg" => Arc::new(FunctionPassAdaptor(SimplifyCfg)),
        "dce" => Arc::new(FunctionPassAdaptor(Dce)),
        "inline" => Arc::new(Inline::default()),
        "merge-functions" => Arc::new(MergeFunctions),
        "global-dce" => Arc::new(GlobalDce),
        "strip-dead-prototypes" => Arc::new(StripDeadPrototypes),
        "drop-debug-values" => Arc::new(FunctionPassAdaptor(DropDebugValues)),
        _ => return None,
    };
    Some(pass)
}

/// Follow `operand` through `replacements` (`%3 -> %2 -> 7`). A chain that
/// revisits a value stops at the last value before the repeat.
pub(crate) fn resolve(replacements: &HashMap<ValueId, Operand>, mut operand: Operand) -> Operand {
    let mut visited = HashSet::new();
    while let Operand::Value(v) = operand {
        if !visited.insert(v) {
            break;
        }
        match replacements.get(&v) {
            Some(next) => operand = *next,
            None => break,
        }
    }
    operand
}

/// Rewrite operands through `replacements`, following chains.
/// Returns the number of rewritten operands.
pub(crate) fn substitute(function: &mut Function, replacements: &HashMap<ValueId, Operand>) -> usize {
    if replacements.is_empty() {
        return 0;
    }

    let mut rewritten = 0;
    for inst in function.instructions_mut() {
        for operand in inst.op.operands_mut() {
            let resolved = resolve(replacements, *operand);
            if resolved != *operand {
                *operand = resolved;
                rewritten += 1;
            }
        }
    }
    rewritten
}
