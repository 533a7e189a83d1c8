//! Debug-information passes.

use kestrel_ir::{Function, Op};

use crate::pass::{FunctionPass, Mode, PassStats};

pub const FRAME_POINTER_ATTR: &str = "frame-pointer";

/// Forces `frame-pointer=all` so debuggers and profilers can unwind.
#[derive(Debug)]
pub struct AnnotateFramePointers;

impl FunctionPass for AnnotateFramePointers {
    fn name(&self) -> &str {
        "annotate-frame-pointers"
    }

    fn run_on_function(&self, function: &mut Function, _mode: Mode) -> PassStats {
        PassStats {
            attributes_changed: usize::from(function.set_attribute(FRAME_POINTER_ATTR, "all")),
            ..PassStats::default()
        }
    }
}

/// Deletes `dbg.value` records. Debug locations on instructions are kept.
#[derive(Debug)]
pub struct DropDebugValues;

impl FunctionPass for DropDebugValues {
    fn name(&self) -> &str {
        "drop-debug-values"
    }

    fn run_on_function(&self, function: &mut Function, _mode: Mode) -> PassStats {
        let before = function.instruction_count();
        for block in &mut function.blocks {
            block
                .insts
                .retain(|inst| !matches!(inst.op, Op::DbgValue { .. }));
        }
        PassStats {
            insts_removed: before - function.instruction_count(),
            ..PassStats::default()
        }
    }
}
