//! Function inlining.
//!
//! Only single-block callees ending in `ret` are inlined, which keeps the
//! splice local to the call's block. Self-recursive and `noinline` callees
//! are never inlined. Under PIC, an external callee without `dso_local` may
//! be interposed at load time and is left alone.

use std::collections::HashMap;

use kestrel_ir::{Function, Inst, Linkage, Module, Op, Operand, ValueId};
use tracing::trace;

use super::substitute;
use crate::pass::{Mode, Pass, PassStats};

/// Size bound, in instructions, for callees the release inliner accepts.
pub const INLINE_THRESHOLD: usize = 24;

pub const NOINLINE_ATTR: &str = "noinline";
pub const ALWAYSINLINE_ATTR: &str = "alwaysinline";
pub const DSO_LOCAL_ATTR: &str = "dso_local";

/// Size-bounded inliner used by release pipelines.
#[derive(Debug, Clone)]
pub struct Inline {
    pub threshold: usize,
}

impl Default for Inline {
    fn default() -> Self {
        Self {
            threshold: INLINE_THRESHOLD,
        }
    }
}

impl Pass for Inline {
    fn name(&self) -> &str {
        "inline"
    }

    fn run(&self, unit: &mut Module, mode: Mode) -> PassStats {
        inline_calls(unit, mode, |callee| {
            callee.instruction_count() <= self.threshold || callee.has_attribute(ALWAYSINLINE_ATTR)
        })
    }
}

/// Inlines only `alwaysinline` callees; the debug pipeline's inliner.
#[derive(Debug)]
pub struct AlwaysInline;

impl Pass for AlwaysInline {
    fn name(&self) -> &str {
        "always-inline"
    }

    fn run(&self, unit: &mut Module, mode: Mode) -> PassStats {
        inline_calls(unit, mode, |callee| callee.has_attribute(ALWAYSINLINE_ATTR))
    }
}

fn inlinable(callee: &Function, mode: Mode) -> bool {
    let [body] = callee.blocks.as_slice() else {
        return false;
    };
    let ends_in_ret = matches!(body.terminator().map(|t| &t.op), Some(Op::Ret { .. }));
    let interposable =
        mode.pic && callee.linkage == Linkage::External && !callee.has_attribute(DSO_LOCAL_ATTR);
    ends_in_ret
        && !interposable
        && !callee.has_attribute(NOINLINE_ATTR)
        && !callee.callees().contains(&callee.name.as_str())
}

fn inline_calls(unit: &mut Module, mode: Mode, accept: impl Fn(&Function) -> bool) -> PassStats {
    let candidates: HashMap<String, Function> = unit
        .defined_functions()
        .filter(|f| inlinable(f, mode) && accept(f))
        .map(|f| (f.name.clone(), f.clone()))
        .collect();
    let mut stats = PassStats::default();
    if candidates.is_empty() {
        return stats;
    }

    for caller in unit.defined_functions_mut() {
        let mut next = caller.next_value_id().0;
        let mut replacements = HashMap::new();
        for b in 0..caller.blocks.len() {
            let mut i = 0;
            while i < caller.blocks[b].insts.len() {
                let callee = match &caller.blocks[b].insts[i].op {
                    Op::Call { callee, .. } if *callee != caller.name => candidates.get(callee),
                    _ => None,
                };
                let Some(callee) = callee else {
                    i += 1;
                    continue;
                };

                let call = caller.blocks[b].insts.remove(i);
                let args: &[Operand] = match &call.op {
                    Op::Call { args, .. } => args,
                    _ => &[],
                };
                let (body, ret) = instantiate(callee, args, &mut next);
                if let (Some(result), Some(ret)) = (call.result, ret) {
                    replacements.insert(result, ret);
                }
                trace!(caller = %caller.name, callee = %callee.name, insts = body.len(), "inlined call");

                let added = body.len();
                caller.blocks[b].insts.splice(i..i, body);
                i += added;
                stats.insts_added += added;
                stats.insts_removed += 1;
            }
        }
        substitute(caller, &replacements);
    }
    stats
}

/// Copy a single-block callee's body with fresh value ids and parameters
/// bound to `args`. Returns the body (without `ret`) and the returned operand.
fn instantiate(callee: &Function, args: &[Operand], next: &mut u32) -> (Vec<Inst>, Option<Operand>) {
    let mut ids: HashMap<ValueId, ValueId> = HashMap::new();
    let remap = |operand: Operand, ids: &HashMap<ValueId, ValueId>| match operand {
        Operand::Param(p) => args.get(p as usize).copied().unwrap_or(operand),
        Operand::Value(v) => ids.get(&v).map_or(operand, |n| Operand::Value(*n)),
        Operand::Const(_) => operand,
    };

    let mut body = Vec::new();
    let mut ret = None;
    for inst in &callee.blocks[0].insts {
        if let Op::Ret { value } = &inst.op {
            ret = value.map(|v| remap(v, &ids));
            break;
        }
        let mut copy = inst.clone();
        for operand in copy.op.operands_mut() {
            *operand = remap(*operand, &ids);
        }
        if let Some(old) = copy.result {
            let fresh = ValueId(*next);
            *next += 1;
            ids.insert(old, fresh);
            copy.result = Some(fresh);
        }
        body.push(copy);
    }
    (body, ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_ir::{BinOp, FunctionBuilder, Type};

    fn square(linkage: Linkage) -> Function {
        let mut b = FunctionBuilder::new("square", vec![Type::I32], Type::I32);
        b.linkage(linkage);
        let v = b.binary(BinOp::Mul, Operand::Param(0), Operand::Param(0), Type::I32);
        b.ret(Some(v.into()));
        b.finish()
    }

    fn caller() -> Function {
        let mut b = FunctionBuilder::new("main", vec![Type::I32], Type::I32);
        let a = b.binary(BinOp::Add, Operand::Param(0), Operand::Const(1), Type::I32);
        let s = b.call("square", vec![a.into()], Type::I32).unwrap();
        let t = b.call("square", vec![s.into()], Type::I32).unwrap();
        b.ret(Some(t.into()));
        b.finish()
    }

    fn unit(callee: Function) -> Module {
        let mut m = Module::new("m");
        m.add_function(callee);
        m.add_function(caller());
        m
    }

    #[test]
    fn small_callee_is_inlined_everywhere() {
        let mut m = unit(square(Linkage::Internal));
        let stats = Inline::default().run(&mut m, Mode::default());
        assert_eq!(stats.insts_removed, 2);
        assert_eq!(stats.insts_added, 2);

        let main = m.function("main").unwrap();
        assert!(main.callees().is_empty());
        assert!(m.verify().is_ok(), "{:?}", m.verify());
    }

    #[test]
    fn threshold_is_respected() {
        let mut m = unit(square(Linkage::Internal));
        let stats = Inline { threshold: 1 }.run(&mut m, Mode::default());
        assert!(!stats.changed());
    }

    #[test]
    fn noinline_and_recursion_block_inlining() {
        let mut callee = square(Linkage::Internal);
        callee.set_attribute(NOINLINE_ATTR, "");
        let mut m = unit(callee);
        assert!(!Inline::default().run(&mut m, Mode::default()).changed());

        let mut b = FunctionBuilder::new("square", vec![Type::I32], Type::I32);
        let r = b.call("square", vec![Operand::Param(0)], Type::I32).unwrap();
        b.ret(Some(r.into()));
        let mut m = unit(b.finish());
        assert!(!Inline::default().run(&mut m, Mode::default()).changed());
    }

    #[test]
    fn pic_skips_interposable_callees() {
        let pic = Mode {
            pic: true,
            ..Mode::default()
        };
        let mut m = unit(square(Linkage::External));
        assert!(!Inline::default().run(&mut m, pic).changed());

        let mut local = square(Linkage::External);
        local.set_attribute(DSO_LOCAL_ATTR, "");
        let mut m = unit(local);
        assert!(Inline::default().run(&mut m, pic).changed());

        let mut m = unit(square(Linkage::Internal));
        assert!(Inline::default().run(&mut m, pic).changed());
    }

    #[test]
    fn always_inline_only_takes_marked_callees() {
        let mut m = unit(square(Linkage::Internal));
        assert!(!AlwaysInline.run(&mut m, Mode::default()).changed());

        m.function_mut("square")
            .unwrap()
            .set_attribute(ALWAYSINLINE_ATTR, "");
        let stats = AlwaysInline.run(&mut m, Mode::default());
        assert_eq!(stats.insts_removed, 2);
        assert!(m.verify().is_ok());
    }
}
