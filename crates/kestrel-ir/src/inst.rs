//! Instructions, operands, and operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Type;

/// Identifier of an SSA value, unique within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// An instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operand {
    /// Result of another instruction in the same function.
    Value(ValueId),
    /// Function parameter by index.
    Param(u32),
    /// Integer constant; takes the type its use requires.
    Const(i64),
}

impl Operand {
    pub fn as_const(&self) -> Option<i64> {
        match self {
            Operand::Const(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<ValueId> for Operand {
    fn from(id: ValueId) -> Self {
        Operand::Value(id)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{v}"),
            Operand::Param(i) => write!(f, "%arg{i}"),
            Operand::Const(c) => write!(f, "{c}"),
        }
    }
}

/// Binary integer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    AShr,
}

impl BinOp {
    /// Evaluate on constants at the given width. `None` when the result is
    /// undefined (division by zero, oversized shift).
    pub fn fold(self, lhs: i64, rhs: i64, ty: Type) -> Option<i64> {
        let width = i64::from(ty.bit_width()?);
        let value = match self {
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Sub => lhs.wrapping_sub(rhs),
            BinOp::Mul => lhs.wrapping_mul(rhs),
            BinOp::SDiv => {
                if rhs == 0 {
                    return None;
                }
                lhs.wrapping_div(rhs)
            }
            BinOp::SRem => {
                if rhs == 0 {
                    return None;
                }
                lhs.wrapping_rem(rhs)
            }
            BinOp::And => lhs & rhs,
            BinOp::Or => lhs | rhs,
            BinOp::Xor => lhs ^ rhs,
            BinOp::Shl => {
                if !(0..width).contains(&rhs) {
                    return None;
                }
                lhs.wrapping_shl(rhs as u32)
            }
            BinOp::AShr => {
                if !(0..width).contains(&rhs) {
                    return None;
                }
                lhs.wrapping_shr(rhs as u32)
            }
        };
        Some(ty.wrap(value))
    }

    /// Whether `a op b == b op a`.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Mul | BinOp::And | BinOp::Or | BinOp::Xor
        )
    }
}

/// Signed integer comparison predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CmpPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CmpPred {
    pub fn fold(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpPred::Eq => lhs == rhs,
            CmpPred::Ne => lhs != rhs,
            CmpPred::Slt => lhs < rhs,
            CmpPred::Sle => lhs <= rhs,
            CmpPred::Sgt => lhs > rhs,
            CmpPred::Sge => lhs >= rhs,
        }
    }
}

/// Source position attached to an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DebugLoc {
    pub line: u32,
    pub column: u32,
}

impl DebugLoc {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// The operation an instruction performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "op")]
pub enum Op {
    Binary {
        kind: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    Cmp {
        pred: CmpPred,
        lhs: Operand,
        rhs: Operand,
    },
    Select {
        cond: Operand,
        then_value: Operand,
        else_value: Operand,
    },
    Call {
        callee: String,
        args: Vec<Operand>,
    },
    /// One incoming value per predecessor block label.
    Phi { incoming: Vec<(Operand, String)> },
    /// Branch-weight hint; lowered to its first operand.
    Expect { value: Operand, expected: Operand },
    /// Constant-ness query; lowered to `1` or `0`.
    IsConstant { value: Operand },
    /// Records the current value of a source variable.
    DbgValue { variable: String, value: Operand },
    /// Opaque side-effecting annotation.
    Marker { name: String },
    Ret { value: Option<Operand> },
    Br { target: String },
    CondBr {
        cond: Operand,
        then_target: String,
        else_target: String,
    },
    Unreachable,
}

impl Op {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Ret { .. } | Op::Br { .. } | Op::CondBr { .. } | Op::Unreachable
        )
    }

    /// Intrinsics that must not survive the optimization pipeline.
    pub fn is_lowerable_intrinsic(&self) -> bool {
        matches!(self, Op::Expect { .. } | Op::IsConstant { .. })
    }

    /// Instructions dead-code elimination may never remove.
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Op::Call { .. } | Op::DbgValue { .. } | Op::Marker { .. }
        ) || self.is_terminator()
    }

    /// Whether the operation yields an SSA value.
    pub fn produces_value(&self) -> bool {
        matches!(
            self,
            Op::Binary { .. }
                | Op::Cmp { .. }
                | Op::Select { .. }
                | Op::Phi { .. }
                | Op::Expect { .. }
                | Op::IsConstant { .. }
        )
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Op::Binary { lhs, rhs, .. } | Op::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            Op::Select {
                cond,
                then_value,
                else_value,
            } => vec![cond, then_value, else_value],
            Op::Call { args, .. } => args.iter().collect(),
            Op::Phi { incoming } => incoming.iter().map(|(v, _)| v).collect(),
            Op::Expect { value, expected } => vec![value, expected],
            Op::IsConstant { value } | Op::DbgValue { value, .. } => vec![value],
            Op::Ret { value } => value.iter().collect(),
            Op::CondBr { cond, .. } => vec![cond],
            Op::Marker { .. } | Op::Br { .. } | Op::Unreachable => Vec::new(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Op::Binary { lhs, rhs, .. } | Op::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            Op::Select {
                cond,
                then_value,
                else_value,
            } => vec![cond, then_value, else_value],
            Op::Call { args, .. } => args.iter_mut().collect(),
            Op::Phi { incoming } => incoming.iter_mut().map(|(v, _)| v).collect(),
            Op::Expect { value, expected } => vec![value, expected],
            Op::IsConstant { value } | Op::DbgValue { value, .. } => vec![value],
            Op::Ret { value } => value.iter_mut().collect(),
            Op::CondBr { cond, .. } => vec![cond],
            Op::Marker { .. } | Op::Br { .. } | Op::Unreachable => Vec::new(),
        }
    }

    /// Successor block labels of a terminator (empty for other operations).
    pub fn successors(&self) -> Vec<&str> {
        match self {
            Op::Br { target } => vec![target.as_str()],
            Op::CondBr {
                then_target,
                else_target,
                ..
            } => vec![then_target.as_str(), else_target.as_str()],
            _ => Vec::new(),
        }
    }
}

/// A single instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Inst {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ValueId>,
    #[serde(flatten)]
    pub op: Op,
    /// Result type (`void` for instructions without a result).
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_loc: Option<DebugLoc>,
}

impl Inst {
    pub fn new(op: Op, ty: Type) -> Self {
        Self {
            result: None,
            op,
            ty,
            debug_loc: None,
        }
    }

    pub fn with_result(mut self, id: ValueId) -> Self {
        self.result = Some(id);
        self
    }

    pub fn with_debug_loc(mut self, loc: Option<DebugLoc>) -> Self {
        self.debug_loc = loc;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_wraps_to_type() {
        assert_eq!(
            BinOp::Add.fold(i64::from(i32::MAX), 1, Type::I32),
            Some(i64::from(i32::MIN))
        );
        assert_eq!(BinOp::Mul.fold(6, 7, Type::I64), Some(42));
    }

    #[test]
    fn fold_rejects_undefined() {
        assert_eq!(BinOp::SDiv.fold(1, 0, Type::I32), None);
        assert_eq!(BinOp::SRem.fold(1, 0, Type::I32), None);
        assert_eq!(BinOp::Shl.fold(1, 32, Type::I32), None);
        assert_eq!(BinOp::Shl.fold(1, 31, Type::I64), Some(1 << 31));
    }

    #[test]
    fn compare_fold() {
        assert!(CmpPred::Slt.fold(-1, 0));
        assert!(!CmpPred::Eq.fold(1, 2));
        assert!(CmpPred::Sge.fold(2, 2));
    }

    #[test]
    fn operand_listing() {
        let op = Op::Select {
            cond: Operand::Param(0),
            then_value: Operand::Const(1),
            else_value: Operand::Value(ValueId(3)),
        };
        assert_eq!(op.operands().len(), 3);
        assert!(!op.is_terminator());
        assert!(op.produces_value());

        let br = Op::CondBr {
            cond: Operand::Const(1),
            then_target: "a".into(),
            else_target: "b".into(),
        };
        assert_eq!(br.successors(), vec!["a", "b"]);
        assert!(br.has_side_effects());
    }

    #[test]
    fn intrinsics_are_lowerable() {
        assert!(Op::IsConstant {
            value: Operand::Const(0)
        }
        .is_lowerable_intrinsic());
        assert!(!Op::Marker { name: "x".into() }.is_lowerable_intrinsic());
    }
}
