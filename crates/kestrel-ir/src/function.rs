//! Functions and basic blocks.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::inst::{Inst, Op, Operand, ValueId};
use crate::types::Type;

/// Symbol visibility of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Linkage {
    /// Visible outside the unit.
    #[default]
    External,
    /// Private to the unit.
    Internal,
}

/// A labelled straight-line sequence of instructions ending in a terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub label: String,
    pub insts: Vec<Inst>,
}

impl Block {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            insts: Vec::new(),
        }
    }

    /// The block's final instruction, if it is a terminator.
    pub fn terminator(&self) -> Option<&Inst> {
        self.insts.last().filter(|i| i.op.is_terminator())
    }

    pub fn terminator_mut(&mut self) -> Option<&mut Inst> {
        self.insts.last_mut().filter(|i| i.op.is_terminator())
    }

    /// Distinct successor labels in first-seen order.
    pub fn successors(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        if let Some(term) = self.terminator() {
            for s in term.op.successors() {
                if !out.iter().any(|o| o == s) {
                    out.push(s.to_string());
                }
            }
        }
        out
    }
}

/// A function definition or declaration (no blocks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub linkage: Linkage,
    pub params: Vec<Type>,
    pub ret: Type,
    /// String attributes (`target-cpu`, `frame-pointer`, `alwaysinline`, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Function {
    /// Create a declaration with no body.
    pub fn declare(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            name: name.into(),
            linkage: Linkage::External,
            params,
            ret,
            attributes: BTreeMap::new(),
            blocks: Vec::new(),
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Set an attribute, returning whether the stored value changed.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.attributes.get(key) == Some(&value) {
            return false;
        }
        self.attributes.insert(key.to_string(), value);
        true
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn block(&self, label: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn block_index(&self, label: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.label == label)
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Inst> {
        self.blocks.iter().flat_map(|b| b.insts.iter())
    }

    pub fn instructions_mut(&mut self) -> impl Iterator<Item = &mut Inst> {
        self.blocks.iter_mut().flat_map(|b| b.insts.iter_mut())
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.insts.len()).sum()
    }

    /// A value id not used by any instruction of this function.
    pub fn next_value_id(&self) -> ValueId {
        let max = self
            .instructions()
            .filter_map(|i| i.result)
            .map(|v| v.0)
            .max();
        ValueId(max.map_or(0, |m| m + 1))
    }

    /// Types of every value defined in the function.
    pub fn value_types(&self) -> HashMap<ValueId, Type> {
        self.instructions()
            .filter_map(|i| i.result.map(|r| (r, i.ty)))
            .collect()
    }

    /// Number of uses of each value across all operands.
    pub fn use_counts(&self) -> HashMap<ValueId, usize> {
        let mut counts = HashMap::new();
        for inst in self.instructions() {
            for operand in inst.op.operands() {
                if let Operand::Value(v) = operand {
                    *counts.entry(*v).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Rewrite every use of `from` to `to`. Returns the number of rewritten uses.
    pub fn replace_all_uses(&mut self, from: ValueId, to: Operand) -> usize {
        let mut replaced = 0;
        for inst in self.instructions_mut() {
            for operand in inst.op.operands_mut() {
                if *operand == Operand::Value(from) {
                    *operand = to;
                    replaced += 1;
                }
            }
        }
        replaced
    }

    /// Distinct predecessor labels of each block, in block order.
    pub fn predecessors(&self) -> BTreeMap<String, Vec<String>> {
        let mut preds: BTreeMap<String, Vec<String>> = self
            .blocks
            .iter()
            .map(|b| (b.label.clone(), Vec::new()))
            .collect();
        for block in &self.blocks {
            for succ in block.successors() {
                if let Some(list) = preds.get_mut(&succ) {
                    list.push(block.label.clone());
                }
            }
        }
        preds
    }

    /// Names of all functions called from this one, in order of appearance.
    pub fn callees(&self) -> Vec<&str> {
        self.instructions()
            .filter_map(|i| match &i.op {
                Op::Call { callee, .. } => Some(callee.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Debug locations plus `dbg.value` records.
    pub fn debug_metadata_count(&self) -> usize {
        self.instructions()
            .map(|i| {
                usize::from(i.debug_loc.is_some())
                    + usize::from(matches!(i.op, Op::DbgValue { .. }))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::BinOp;

    fn two_block_fn() -> Function {
        let mut f = Function::declare("f", vec![Type::I32], Type::I32);
        f.blocks.push(Block {
            label: "entry".into(),
            insts: vec![
                Inst::new(
                    Op::Binary {
                        kind: BinOp::Add,
                        lhs: Operand::Param(0),
                        rhs: Operand::Const(1),
                    },
                    Type::I32,
                )
                .with_result(ValueId(0)),
                Inst::new(
                    Op::Br {
                        target: "exit".into(),
                    },
                    Type::Void,
                ),
            ],
        });
        f.blocks.push(Block {
            label: "exit".into(),
            insts: vec![Inst::new(
                Op::Ret {
                    value: Some(Operand::Value(ValueId(0))),
                },
                Type::Void,
            )],
        });
        f
    }

    #[test]
    fn attribute_set_reports_change() {
        let mut f = Function::declare("f", vec![], Type::Void);
        assert!(f.set_attribute("target-cpu", "generic"));
        assert!(!f.set_attribute("target-cpu", "generic"));
        assert!(f.set_attribute("target-cpu", "x86-64-v3"));
        assert_eq!(f.attribute("target-cpu"), Some("x86-64-v3"));
    }

    #[test]
    fn value_bookkeeping() {
        let mut f = two_block_fn();
        assert_eq!(f.next_value_id(), ValueId(1));
        assert_eq!(f.use_counts().get(&ValueId(0)), Some(&1));
        assert_eq!(f.replace_all_uses(ValueId(0), Operand::Const(5)), 1);
        assert!(f.use_counts().is_empty());
    }

    #[test]
    fn predecessor_map() {
        let f = two_block_fn();
        let preds = f.predecessors();
        assert!(preds["entry"].is_empty());
        assert_eq!(preds["exit"], vec!["entry".to_string()]);
    }

    #[test]
    fn declaration_has_no_blocks() {
        let f = Function::declare("ext", vec![Type::Ptr], Type::Void);
        assert!(f.is_declaration());
        assert_eq!(f.next_value_id(), ValueId(0));
    }
}
