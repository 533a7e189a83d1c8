//! Structural verification of compilation units.

use std::collections::{HashMap, HashSet};

use crate::error::VerifyError;
use crate::function::Function;
use crate::inst::{Inst, Op, Operand, ValueId};
use crate::module::Module;
use crate::types::Type;

/// Check every well-formedness rule, collecting all violations.
pub fn verify_module(module: &Module) -> Result<(), Vec<VerifyError>> {
    let mut errors = Vec::new();

    let mut names = HashSet::new();
    for f in &module.functions {
        if !names.insert(f.name.as_str()) {
            errors.push(VerifyError::DuplicateFunction {
                name: f.name.clone(),
            });
        }
    }

    let signatures: HashMap<&str, &Function> = module
        .functions
        .iter()
        .map(|f| (f.name.as_str(), f))
        .collect();

    for f in module.defined_functions() {
        FunctionVerifier::new(f, &signatures).run(&mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

struct FunctionVerifier<'a> {
    function: &'a Function,
    signatures: &'a HashMap<&'a str, &'a Function>,
    defs: HashMap<ValueId, Type>,
    labels: HashSet<&'a str>,
}

impl<'a> FunctionVerifier<'a> {
    fn new(function: &'a Function, signatures: &'a HashMap<&'a str, &'a Function>) -> Self {
        Self {
            function,
            signatures,
            defs: HashMap::new(),
            labels: HashSet::new(),
        }
    }

    fn name(&self) -> String {
        self.function.name.clone()
    }

    fn run(mut self, errors: &mut Vec<VerifyError>) {
        let function = self.function;
        for b in &function.blocks {
            if !self.labels.insert(b.label.as_str()) {
                errors.push(VerifyError::DuplicateBlock {
                    function: self.name(),
                    label: b.label.clone(),
                });
            }
        }

        for inst in function.instructions() {
            if let Some(r) = inst.result {
                if self.defs.insert(r, inst.ty).is_some() {
                    errors.push(VerifyError::DuplicateValue {
                        function: self.name(),
                        value: r,
                    });
                }
            }
        }

        let preds = function.predecessors();

        for block in &function.blocks {
            let Some(last) = block.insts.len().checked_sub(1) else {
                errors.push(VerifyError::EmptyBlock {
                    function: self.name(),
                    block: block.label.clone(),
                });
                continue;
            };
            if !block.insts[last].op.is_terminator() {
                errors.push(VerifyError::MissingTerminator {
                    function: self.name(),
                    block: block.label.clone(),
                });
            }
            if block.insts[..last].iter().any(|i| i.op.is_terminator()) {
                errors.push(VerifyError::MisplacedTerminator {
                    function: self.name(),
                    block: block.label.clone(),
                });
            }

            let mut seen_non_phi = false;
            for inst in &block.insts {
                if let Op::Phi { incoming } = &inst.op {
                    if seen_non_phi {
                        errors.push(VerifyError::MisplacedPhi {
                            function: self.name(),
                            block: block.label.clone(),
                        });
                    }
                    let expected = preds.get(&block.label).map(Vec::as_slice).unwrap_or(&[]);
                    let matches = incoming.len() == expected.len()
                        && expected
                            .iter()
                            .all(|p| incoming.iter().filter(|(_, l)| l == p).count() == 1);
                    if !matches {
                        errors.push(VerifyError::PhiIncomingMismatch {
                            function: self.name(),
                            block: block.label.clone(),
                        });
                    }
                } else {
                    seen_non_phi = true;
                }
                self.check_inst(inst, errors);
            }
        }
    }

    fn operand_type(&self, operand: &Operand) -> Option<Type> {
        match operand {
            Operand::Value(v) => self.defs.get(v).copied(),
            Operand::Param(i) => self.function.params.get(*i as usize).copied(),
            Operand::Const(_) => None,
        }
    }

    fn expect_type(
        &self,
        errors: &mut Vec<VerifyError>,
        context: &str,
        operand: &Operand,
        expected: Type,
    ) {
        if let Some(found) = self.operand_type(operand) {
            if found != expected {
                errors.push(VerifyError::TypeMismatch {
                    function: self.name(),
                    context: context.to_string(),
                    expected,
                    found,
                });
            }
        }
    }

    fn mismatch(&self, errors: &mut Vec<VerifyError>, detail: String) {
        errors.push(VerifyError::ResultMismatch {
            function: self.name(),
            detail,
        });
    }

    fn check_inst(&self, inst: &Inst, errors: &mut Vec<VerifyError>) {
        for operand in inst.op.operands() {
            match operand {
                Operand::Value(v) if !self.defs.contains_key(v) => {
                    errors.push(VerifyError::UndefinedValue {
                        function: self.name(),
                        value: *v,
                    });
                }
                Operand::Param(i) if *i as usize >= self.function.params.len() => {
                    errors.push(VerifyError::ParamOutOfRange {
                        function: self.name(),
                        index: *i,
                    });
                }
                _ => {}
            }
        }

        for succ in inst.op.successors() {
            if !self.labels.contains(succ) {
                errors.push(VerifyError::UnknownBlock {
                    function: self.name(),
                    label: succ.to_string(),
                });
            }
        }

        let is_call = matches!(inst.op, Op::Call { .. });
        if inst.op.produces_value() && inst.result.is_none() {
            self.mismatch(errors, "value-producing instruction without a result id".into());
        }
        if !inst.op.produces_value() && !is_call && inst.result.is_some() {
            self.mismatch(errors, "instruction cannot define a value".into());
        }

        match &inst.op {
            Op::Binary { lhs, rhs, .. } => {
                if !inst.ty.is_integer() {
                    self.mismatch(errors, format!("binary operation on non-integer type {}", inst.ty));
                }
                self.expect_type(errors, "binary operand", lhs, inst.ty);
                self.expect_type(errors, "binary operand", rhs, inst.ty);
            }
            Op::Cmp { lhs, rhs, .. } => {
                if inst.ty != Type::I1 {
                    errors.push(VerifyError::TypeMismatch {
                        function: self.name(),
                        context: "compare result".into(),
                        expected: Type::I1,
                        found: inst.ty,
                    });
                }
                if let (Some(l), Some(r)) = (self.operand_type(lhs), self.operand_type(rhs)) {
                    if l != r {
                        errors.push(VerifyError::TypeMismatch {
                            function: self.name(),
                            context: "compare operand".into(),
                            expected: l,
                            found: r,
                        });
                    }
                }
            }
            Op::Select {
                cond,
                then_value,
                else_value,
            } => {
                self.expect_type(errors, "select condition", cond, Type::I1);
                self.expect_type(errors, "select value", then_value, inst.ty);
                self.expect_type(errors, "select value", else_value, inst.ty);
            }
            Op::Phi { incoming } => {
                for (value, _) in incoming {
                    self.expect_type(errors, "phi incoming value", value, inst.ty);
                }
            }
            Op::Expect { value, expected } => {
                self.expect_type(errors, "expect value", value, inst.ty);
                self.expect_type(errors, "expect hint", expected, inst.ty);
            }
            Op::IsConstant { .. } => {
                if inst.ty != Type::I1 {
                    errors.push(VerifyError::TypeMismatch {
                        function: self.name(),
                        context: "is.constant result".into(),
                        expected: Type::I1,
                        found: inst.ty,
                    });
                }
            }
            Op::Call { callee, args } => self.check_call(inst, callee, args, errors),
            Op::Ret { value } => match (self.function.ret, value) {
                (Type::Void, Some(_)) => {
                    self.mismatch(errors, "void function returns a value".into());
                }
                (Type::Void, None) => {}
                (_, None) => self.mismatch(errors, "missing return value".into()),
                (ret, Some(v)) => self.expect_type(errors, "return value", v, ret),
            },
            Op::CondBr { cond, .. } => {
                self.expect_type(errors, "branch condition", cond, Type::I1);
            }
            Op::DbgValue { .. } | Op::Marker { .. } | Op::Br { .. } | Op::Unreachable => {}
        }
    }

    fn check_call(
        &self,
        inst: &Inst,
        callee: &str,
        args: &[Operand],
        errors: &mut Vec<VerifyError>,
    ) {
        let Some(target) = self.signatures.get(callee) else {
            errors.push(VerifyError::UnknownCallee {
                function: self.name(),
                callee: callee.to_string(),
            });
            return;
        };
        if target.params.len() != args.len() {
            errors.push(VerifyError::ArityMismatch {
                function: self.name(),
                callee: callee.to_string(),
                expected: target.params.len(),
                found: args.len(),
            });
        } else {
            for (arg, ty) in args.iter().zip(&target.params) {
                self.expect_type(errors, "call argument", arg, *ty);
            }
        }
        match inst.result {
            Some(_) if target.ret == Type::Void => {
                self.mismatch(errors, format!("call to void `{callee}` defines a value"));
            }
            Some(_) if inst.ty != target.ret => {
                errors.push(VerifyError::TypeMismatch {
                    function: self.name(),
                    context: format!("result of call to `{callee}`"),
                    expected: target.ret,
                    found: inst.ty,
                });
            }
            _ => {}
        }
    }
}
