//! Scalar simplification: common-subexpression elimination, peephole
//! folding and dead-code elimination.

use std::collections::HashMap;

use kestrel_ir::{BinOp, CmpPred, Function, Inst, Op, Operand, Type, ValueId};

use super::{resolve, substitute};
use crate::pass::{FunctionPass, Mode, PassStats};

/// Block-local common-subexpression elimination over pure operations.
#[derive(Debug)]
pub struct EarlyCse;

impl FunctionPass for EarlyCse {
    fn name(&self) -> &str {
        "early-cse"
    }

    fn run_on_function(&self, function: &mut Function, _mode: Mode) -> PassStats {
        let mut replacements: HashMap<ValueId, Operand> = HashMap::new();
        for block in &mut function.blocks {
            let mut available: HashMap<(Op, Type), ValueId> = HashMap::new();
            block.insts.retain_mut(|inst| {
                for operand in inst.op.operands_mut() {
                    if let Some(with) = operand.as_value().and_then(|v| replacements.get(&v)) {
                        *operand = *with;
                    }
                }
                let (Some(result), Some(key)) = (inst.result, cse_key(inst)) else {
                    return true;
                };
                match available.get(&key) {
                    Some(&existing) => {
                        replacements.insert(result, Operand::Value(existing));
                        false
                    }
                    None => {
                        available.insert(key, result);
                        true
                    }
                }
            });
        }
        substitute(function, &replacements);
        PassStats {
            insts_removed: replacements.len(),
            ..PassStats::default()
        }
    }
}

fn operand_rank(operand: &Operand) -> (u8, i64) {
    match operand {
        Operand::Value(v) => (0, i64::from(v.0)),
        Operand::Param(p) => (1, i64::from(*p)),
        Operand::Const(c) => (2, *c),
    }
}

fn cse_key(inst: &Inst) -> Option<(Op, Type)> {
    let op = match &inst.op {
        Op::Binary { kind, lhs, rhs }
            if kind.is_commutative() && operand_rank(rhs) < operand_rank(lhs) =>
        {
            Op::Binary {
                kind: *kind,
                lhs: *rhs,
                rhs: *lhs,
            }
        }
        op @ (Op::Binary { .. } | Op::Cmp { .. } | Op::Select { .. }) => op.clone(),
        _ => return None,
    };
    Some((op, inst.ty))
}

/// Constant folding and algebraic identities, iterated to a fixed point.
#[derive(Debug)]
pub struct InstCombine;

impl FunctionPass for InstCombine {
    fn name(&self) -> &str {
        "instcombine"
    }

    fn run_on_function(&self, function: &mut Function, _mode: Mode) -> PassStats {
        let mut removed = 0;
        loop {
            let mut replacements = HashMap::new();
            for block in &mut function.blocks {
                block.insts.retain(|inst| {
                    let (Some(result), Some(with)) = (inst.result, simplify(inst)) else {
                        return true;
                    };
                    // Phis in unreachable cycles can resolve back to themselves.
                    let with = resolve(&replacements, with);
                    if with == Operand::Value(result) {
                        return true;
                    }
                    replacements.insert(result, with);
                    false
                });
            }
            if replacements.is_empty() {
                break;
            }
            removed += replacements.len();
            substitute(function, &replacements);
        }
        PassStats {
            insts_removed: removed,
            ..PassStats::default()
        }
    }
}

/// The operand an instruction's result is equal to, if it can be proven.
fn simplify(inst: &Inst) -> Option<Operand> {
    let ty = inst.ty;
    match &inst.op {
        Op::Binary { kind, lhs, rhs } => simplify_binary(*kind, *lhs, *rhs, ty),
        Op::Cmp { pred, lhs, rhs } => simplify_cmp(*pred, *lhs, *rhs),
        Op::Select {
            cond,
            then_value,
            else_value,
        } => match cond.as_const() {
            Some(c) if c & 1 != 0 => Some(*then_value),
            Some(_) => Some(*else_value),
            None if then_value == else_value => Some(*then_value),
            None => None,
        },
        Op::Phi { incoming } => {
            let this = inst.result.map(Operand::Value);
            let mut values = incoming
                .iter()
                .map(|(v, _)| *v)
                .filter(|v| Some(*v) != this);
            let first = values.next()?;
            values.all(|v| v == first).then_some(first)
        }
        _ => None,
    }
}

fn simplify_binary(kind: BinOp, lhs: Operand, rhs: Operand, ty: Type) -> Option<Operand> {
    let l = lhs.as_const().map(|c| ty.wrap(c));
    let r = rhs.as_const().map(|c| ty.wrap(c));
    if let (Some(l), Some(r)) = (l, r) {
        return kind.fold(l, r, ty).map(Operand::Const);
    }

    let zero = Operand::Const(0);
    let all_ones = ty.wrap(-1);
    let same = lhs == rhs;
    match kind {
        BinOp::Add | BinOp::Or | BinOp::Xor if l == Some(0) => Some(rhs),
        BinOp::Add | BinOp::Sub | BinOp::Or | BinOp::Xor | BinOp::Shl | BinOp::AShr
            if r == Some(0) =>
        {
            Some(lhs)
        }
        BinOp::Sub | BinOp::Xor if same => Some(zero),
        BinOp::Mul if l == Some(0) || r == Some(0) => Some(zero),
        BinOp::Mul if l == Some(1) => Some(rhs),
        BinOp::Mul | BinOp::SDiv if r == Some(1) => Some(lhs),
        BinOp::SRem if r == Some(1) => Some(zero),
        BinOp::And if l == Some(0) || r == Some(0) => Some(zero),
        BinOp::And if l == Some(all_ones) => Some(rhs),
        BinOp::And if r == Some(all_ones) => Some(lhs),
        BinOp::And | BinOp::Or if same => Some(lhs),
        _ => None,
    }
}

fn simplify_cmp(pred: CmpPred, lhs: Operand, rhs: Operand) -> Option<Operand> {
    if let (Some(l), Some(r)) = (lhs.as_const(), rhs.as_const()) {
        return Some(Operand::Const(i64::from(pred.fold(l, r))));
    }
    if lhs == rhs {
        let reflexive = matches!(pred, CmpPred::Eq | CmpPred::Sle | CmpPred::Sge);
        return Some(Operand::Const(i64::from(reflexive)));
    }
    None
}

/// Removes side-effect-free instructions whose results are unused.
#[derive(Debug)]
pub struct Dce;

impl FunctionPass for Dce {
    fn name(&self) -> &str {
        "dce"
    }

    fn run_on_function(&self, function: &mut Function, _mode: Mode) -> PassStats {
        let mut removed = 0;
        loop {
            let uses = function.use_counts();
            let before = function.instruction_count();
            for block in &mut function.blocks {
                block.insts.retain(|inst| {
                    let unused = inst.result.is_some_and(|r| !uses.contains_key(&r));
                    !(unused && !inst.op.has_side_effects())
                });
            }
            let round = before - function.instruction_count();
            if round == 0 {
                break;
            }
            removed += round;
        }
        PassStats {
            insts_removed: removed,
            ..PassStats::default()
        }
    }
}
