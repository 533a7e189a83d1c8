//! Programmatic construction of functions.
//!
//! # Example
//!
//! ```rust
//! use kestrel_ir::{BinOp, FunctionBuilder, Module, Operand, Type};
//!
//! let mut b = FunctionBuilder::new("add", vec![Type::I32, Type::I32], Type::I32);
//! b.block("entry");
//! let sum = b.binary(BinOp::Add, Operand::Param(0), Operand::Param(1), Type::I32);
//! b.ret(Some(sum.into()));
//!
//! let mut module = Module::new("demo");
//! module.add_function(b.finish());
//! assert!(module.verify().is_ok());
//! ```

use crate::function::{Block, Function, Linkage};
use crate::inst::{BinOp, CmpPred, DebugLoc, Inst, Op, Operand, ValueId};
use crate::types::Type;

/// Builds one function block by block, numbering values sequentially.
///
/// Instructions are appended to the most recently opened block. The builder
/// does not validate; call [`crate::Module::verify`] on the finished unit.
pub struct FunctionBuilder {
    function: Function,
    current: Option<usize>,
    next_value: u32,
    debug_loc: Option<DebugLoc>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            function: Function::declare(name, params, ret),
            current: None,
            next_value: 0,
            debug_loc: None,
        }
    }

    pub fn linkage(&mut self, linkage: Linkage) -> &mut Self {
        self.function.linkage = linkage;
        self
    }

    pub fn attribute(&mut self, key: &str, value: &str) -> &mut Self {
        self.function.set_attribute(key, value);
        self
    }

    /// Open a new block and make it the insertion point.
    pub fn block(&mut self, label: &str) {
        self.function.blocks.push(Block::new(label));
        self.current = Some(self.function.blocks.len() - 1);
    }

    /// Move the insertion point to an existing block.
    pub fn position_at(&mut self, label: &str) -> bool {
        match self.function.block_index(label) {
            Some(idx) => {
                self.current = Some(idx);
                true
            }
            None => false,
        }
    }

    /// Debug location attached to subsequently built instructions.
    pub fn set_debug_loc(&mut self, loc: Option<DebugLoc>) {
        self.debug_loc = loc;
    }

    fn push(&mut self, inst: Inst) {
        let inst = inst.with_debug_loc(self.debug_loc);
        let idx = match self.current {
            Some(idx) => idx,
            None => {
                self.block("entry");
                self.function.blocks.len() - 1
            }
        };
        self.function.blocks[idx].insts.push(inst);
    }

    fn push_value(&mut self, op: Op, ty: Type) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        self.push(Inst::new(op, ty).with_result(id));
        id
    }

    pub fn binary(&mut self, kind: BinOp, lhs: Operand, rhs: Operand, ty: Type) -> ValueId {
        self.push_value(Op::Binary { kind, lhs, rhs }, ty)
    }

    pub fn cmp(&mut self, pred: CmpPred, lhs: Operand, rhs: Operand) -> ValueId {
        self.push_value(Op::Cmp { pred, lhs, rhs }, Type::I1)
    }

    pub fn select(
        &mut self,
        cond: Operand,
        then_value: Operand,
        else_value: Operand,
        ty: Type,
    ) -> ValueId {
        self.push_value(
            Op::Select {
                cond,
                then_value,
                else_value,
            },
            ty,
        )
    }

    /// Emit a call. Returns the result id unless `ret` is `void`.
    pub fn call(&mut self, callee: &str, args: Vec<Operand>, ret: Type) -> Option<ValueId> {
        let op = Op::Call {
            callee: callee.to_string(),
            args,
        };
        if ret == Type::Void {
            self.push(Inst::new(op, Type::Void));
            None
        } else {
            Some(self.push_value(op, ret))
        }
    }

    pub fn phi(&mut self, incoming: Vec<(Operand, &str)>, ty: Type) -> ValueId {
        let incoming = incoming
            .into_iter()
            .map(|(v, l)| (v, l.to_string()))
            .collect();
        self.push_value(Op::Phi { incoming }, ty)
    }

    pub fn expect(&mut self, value: Operand, expected: Operand, ty: Type) -> ValueId {
        self.push_value(Op::Expect { value, expected }, ty)
    }

    pub fn is_constant(&mut self, value: Operand) -> ValueId {
        self.push_value(Op::IsConstant { value }, Type::I1)
    }

    pub fn dbg_value(&mut self, variable: &str, value: Operand) {
        self.push(Inst::new(
            Op::DbgValue {
                variable: variable.to_string(),
                value,
            },
            Type::Void,
        ));
    }

    pub fn marker(&mut self, name: &str) {
        self.push(Inst::new(
            Op::Marker {
                name: name.to_string(),
            },
            Type::Void,
        ));
    }

    pub fn ret(&mut self, value: Option<Operand>) {
        self.push(Inst::new(Op::Ret { value }, Type::Void));
    }

    pub fn br(&mut self, target: &str) {
        self.push(Inst::new(
            Op::Br {
                target: target.to_string(),
            },
            Type::Void,
        ));
    }

    pub fn cond_br(&mut self, cond: Operand, then_target: &str, else_target: &str) {
        self.push(Inst::new(
            Op::CondBr {
                cond,
                then_target: then_target.to_string(),
                else_target: else_target.to_string(),
            },
            Type::Void,
        ));
    }

    pub fn unreachable(&mut self) {
        self.push(Inst::new(Op::Unreachable, Type::Void));
    }

    pub fn finish(self) -> Function {
        self.function
    }
}
