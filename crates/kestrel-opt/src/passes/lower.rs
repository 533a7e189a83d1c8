//! Intrinsic lowering.
//!
//! `expect` and `is.constant` carry no meaning for code generation and must
//! be gone before the unit leaves the pipeline; both passes run in every mode.

use std::collections::HashMap;

use kestrel_ir::{Function, Op, Operand};

use super::substitute;
use crate::pass::{FunctionPass, Mode, PassStats};

/// Replaces `expect(v, hint)` with `v`.
#[derive(Debug)]
pub struct LowerExpect;

impl FunctionPass for LowerExpect {
    fn name(&self) -> &str {
        "lower-expect"
    }

    fn run_on_function(&self, function: &mut Function, _mode: Mode) -> PassStats {
        lower(function, |op| match op {
            Op::Expect { value, .. } => Some(*value),
            _ => None,
        })
    }
}

/// Folds `is.constant(v)` to `1` when `v` is a literal and `0` otherwise.
#[derive(Debug)]
pub struct LowerConstantIntrinsics;

impl FunctionPass for LowerConstantIntrinsics {
    fn name(&self) -> &str {
        "lower-constant-intrinsics"
    }

    fn run_on_function(&self, function: &mut Function, _mode: Mode) -> PassStats {
        lower(function, |op| match op {
            Op::IsConstant { value } => Some(Operand::Const(i64::from(value.as_const().is_some()))),
            _ => None,
        })
    }
}

fn lower(function: &mut Function, replacement: impl Fn(&Op) -> Option<Operand>) -> PassStats {
    let mut replacements = HashMap::new();
    for block in &mut function.blocks {
        block.insts.retain(|inst| match (inst.result, replacement(&inst.op)) {
            (Some(result), Some(with)) => {
                replacements.insert(result, with);
                false
            }
            _ => true,
        });
    }
    substitute(function, &replacements);
    PassStats {
        insts_removed: replacements.len(),
        ..PassStats::default()
    }
}
