//! Control-flow graph simplification.

use std::collections::{HashMap, HashSet};

use kestrel_ir::{Function, Op};

use super::substitute;
use crate::pass::{FunctionPass, Mode, PassStats};

/// Folds constant branches, deletes unreachable blocks and merges blocks
/// into their sole predecessor.
#[derive(Debug)]
pub struct SimplifyCfg;

impl FunctionPass for SimplifyCfg {
    fn name(&self) -> &str {
        "simplify-cfg"
    }

    fn run_on_function(&self, function: &mut Function, _mode: Mode) -> PassStats {
        let blocks_before = function.blocks.len();
        let insts_before = function.instruction_count();

        loop {
            let folded = fold_branches(function);
            let pruned = remove_unreachable(function);
            let merged = merge_single_predecessor(function);
            if !(folded || pruned || merged) {
                break;
            }
        }

        PassStats {
            blocks_removed: blocks_before - function.blocks.len(),
            insts_removed: insts_before.saturating_sub(function.instruction_count()),
            ..PassStats::default()
        }
    }
}

/// Drop phi entries in `block` that name `pred`.
fn forget_edge(function: &mut Function, block: &str, pred: &str) {
    let Some(idx) = function.block_index(block) else {
        return;
    };
    for inst in &mut function.blocks[idx].insts {
        if let Op::Phi { incoming } = &mut inst.op {
            incoming.retain(|(_, label)| label != pred);
        }
    }
}

/// `condbr` on a constant, or with identical targets, becomes `br`.
fn fold_branches(function: &mut Function) -> bool {
    let mut dropped_edges = Vec::new();
    for block in &mut function.blocks {
        let label = block.label.clone();
        let Some(term) = block.terminator_mut() else {
            continue;
        };
        let Op::CondBr {
            cond,
            then_target,
            else_target,
        } = &term.op
        else {
            continue;
        };
        let (kept, dropped) = match cond.as_const() {
            _ if then_target == else_target => (then_target.clone(), None),
            Some(c) if c & 1 != 0 => (then_target.clone(), Some(else_target.clone())),
            Some(_) => (else_target.clone(), Some(then_target.clone())),
            None => continue,
        };
        term.op = Op::Br { target: kept };
        if let Some(dropped) = dropped {
            dropped_edges.push((dropped, label));
        }
    }

    let changed = !dropped_edges.is_empty();
    for (block, pred) in dropped_edges {
        forget_edge(function, &block, &pred);
    }
    changed
}

fn remove_unreachable(function: &mut Function) -> bool {
    let Some(entry) = function.blocks.first() else {
        return false;
    };
    let mut reachable = HashSet::from([entry.label.clone()]);
    let mut worklist = vec![entry.label.clone()];
    while let Some(label) = worklist.pop() {
        if let Some(block) = function.block(&label) {
            for succ in block.successors() {
                if reachable.insert(succ.clone()) {
                    worklist.push(succ);
                }
            }
        }
    }

    let dead: Vec<String> = function
        .blocks
        .iter()
        .filter(|b| !reachable.contains(&b.label))
        .map(|b| b.label.clone())
        .collect();
    if dead.is_empty() {
        return false;
    }

    function.blocks.retain(|b| reachable.contains(&b.label));
    for inst in function.instructions_mut() {
        if let Op::Phi { incoming } = &mut inst.op {
            incoming.retain(|(_, label)| !dead.contains(label));
        }
    }
    true
}

/// Merge one block into its sole predecessor when that predecessor
/// branches to it unconditionally.
fn merge_single_predecessor(function: &mut Function) -> bool {
    let preds = function.predecessors();
    let candidate = function.blocks.iter().skip(1).find_map(|block| {
        let [pred] = preds.get(&block.label)?.as_slice() else {
            return None;
        };
        let pred_block = function.block(pred)?;
        match pred_block.terminator().map(|t| &t.op) {
            Some(Op::Br { target }) if *target == block.label && *pred != block.label => {
                Some((pred.clone(), block.label.clone()))
            }
            _ => None,
        }
    });
    let Some((pred, succ)) = candidate else {
        return false;
    };
    let (Some(pred_idx), Some(succ_idx)) = (function.block_index(&pred), function.block_index(&succ))
    else {
        return false;
    };

    let merged = function.blocks.remove(succ_idx);
    let pred_idx = if succ_idx < pred_idx { pred_idx - 1 } else { pred_idx };

    let mut replacements = HashMap::new();
    let mut body = Vec::with_capacity(merged.insts.len());
    for inst in merged.insts {
        match (&inst.op, inst.result) {
            (Op::Phi { incoming }, Some(result)) => {
                if let Some((value, _)) = incoming.first() {
                    replacements.insert(result, *value);
                }
            }
            _ => body.push(inst),
        }
    }

    let target = &mut function.blocks[pred_idx];
    target.insts.pop();
    target.insts.extend(body);

    for inst in function.instructions_mut() {
        if let Op::Phi { incoming } = &mut inst.op {
            for (_, label) in incoming.iter_mut() {
                if *label == succ {
                    label.clone_from(&pred);
                }
            }
        }
    }
    substitute(function, &replacements);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_ir::{BinOp, FunctionBuilder, Module, Operand, Type};

    fn verified(f: Function) -> Function {
        let mut unit = Module::new("m");
        unit.add_function(f);
        if let Err(errors) = unit.verify() {
            panic!("malformed: {errors:?}");
        }
        unit.functions.remove(0)
    }

    #[test]
    fn constant_branch_folds_and_collapses() {
        let mut b = FunctionBuilder::new("f", vec![Type::I32], Type::I32);
        b.block("entry");
        b.cond_br(Operand::Const(1), "hot", "cold");
        b.block("hot");
        let h = b.binary(BinOp::Add, Operand::Param(0), Operand::Const(1), Type::I32);
        b.br("join");
        b.block("cold");
        b.br("join");
        b.block("join");
        let p = b.phi(vec![(h.into(), "hot"), (Operand::Const(0), "cold")], Type::I32);
        b.ret(Some(p.into()));
        let mut f = verified(b.finish());

        let stats = SimplifyCfg.run_on_function(&mut f, Mode::default());
        assert_eq!(stats.blocks_removed, 3);
        assert_eq!(f.blocks.len(), 1);
        let f = verified(f);
        assert!(matches!(
            f.blocks[0].insts.last().unwrap().op,
            Op::Ret { value: Some(Operand::Value(v)) } if v == h
        ));
    }

    #[test]
    fn identical_targets_become_unconditional() {
        let mut b = FunctionBuilder::new("f", vec![Type::I1], Type::Void);
        b.block("entry");
        b.cond_br(Operand::Param(0), "exit", "exit");
        b.block("exit");
        b.ret(None);
        let mut f = verified(b.finish());

        SimplifyCfg.run_on_function(&mut f, Mode::default());
        assert_eq!(f.blocks.len(), 1);
        verified(f);
    }

    #[test]
    fn diamond_on_unknown_condition_is_kept() {
        let mut b = FunctionBuilder::new("f", vec![Type::I1], Type::I32);
        b.block("entry");
        b.cond_br(Operand::Param(0), "a", "b");
        b.block("a");
        b.br("join");
        b.block("b");
        b.br("join");
        b.block("join");
        let p = b.phi(vec![(Operand::Const(1), "a"), (Operand::Const(2), "b")], Type::I32);
        b.ret(Some(p.into()));
        let mut f = verified(b.finish());

        let stats = SimplifyCfg.run_on_function(&mut f, Mode::default());
        assert!(!stats.changed());
        assert_eq!(f.blocks.len(), 4);
    }

    #[test]
    fn merged_block_successor_phis_are_relabelled() {
        let mut b = FunctionBuilder::new("f", vec![Type::I1], Type::I32);
        b.block("entry");
        b.br("mid");
        b.block("mid");
        b.cond_br(Operand::Param(0), "join", "other");
        b.block("other");
        b.br("join");
        b.block("join");
        let p = b.phi(vec![(Operand::Const(1), "mid"), (Operand::Const(2), "other")], Type::I32);
        b.ret(Some(p.into()));
        let mut f = verified(b.finish());

        SimplifyCfg.run_on_function(&mut f, Mode::default());
        assert!(f.block("mid").is_none());
        let f = verified(f);
        let join = f.block("join").unwrap();
        assert!(matches!(
            &join.insts[0].op,
            Op::Phi { incoming } if incoming.iter().any(|(_, l)| l == "entry")
        ));
    }

    #[test]
    fn unreachable_loop_is_removed() {
        let mut b = FunctionBuilder::new("f", vec![], Type::Void);
        b.block("entry");
        b.ret(None);
        b.block("spin");
        b.br("spin");
        let mut f = verified(b.finish());

        let stats = SimplifyCfg.run_on_function(&mut f, Mode::default());
        assert_eq!(stats.blocks_removed, 1);
        verified(f);
    }
}
