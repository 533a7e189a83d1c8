//! End-to-end properties of the optimization pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use kestrel_ir::{
    BinOp, CmpPred, DebugLoc, Function, FunctionBuilder, Inst, Linkage, Module, Op, Operand, Type,
    ValueId,
};
use kestrel_opt::{
    build_pipeline, optimize, try_optimize, InsertionPoint, Mode, OptimizeOptions, Pass,
    PassRegistry, PassStats,
};
use proptest::prelude::*;

const CANARY: &str = "canary";

#[derive(Debug)]
struct Canary;

impl Pass for Canary {
    fn name(&self) -> &str {
        "insert-canary"
    }

    fn run(&self, unit: &mut Module, _mode: Mode) -> PassStats {
        let mut stats = PassStats::default();
        for f in unit.defined_functions_mut() {
            let marker = Inst::new(
                Op::Marker {
                    name: CANARY.into(),
                },
                Type::Void,
            );
            f.blocks[0].insts.insert(0, marker);
            stats.insts_added += 1;
        }
        stats
    }
}

fn has_canary(f: &Function) -> bool {
    f.instructions()
        .any(|i| matches!(&i.op, Op::Marker { name } if name == CANARY))
}

fn increment(name: &str) -> Function {
    let mut b = FunctionBuilder::new(name, vec![Type::I32], Type::I32);
    b.linkage(Linkage::Internal);
    let v = b.binary(BinOp::Add, Operand::Param(0), Operand::Const(1), Type::I32);
    b.ret(Some(v.into()));
    b.finish()
}

/// A small unit touching every built-in pass.
fn sample_unit() -> Module {
    let mut unit = Module::new("sample").with_triple("x86_64-unknown-linux-gnu");
    unit.add_function(Function::declare("log", vec![Type::I32], Type::Void));
    unit.add_function(Function::declare("puts", vec![Type::Ptr], Type::I32));
    unit.add_function(increment("inc"));
    unit.add_function(increment("inc_copy"));
    unit.add_function(increment("dead"));

    let mut b = FunctionBuilder::new("main", vec![Type::I32, Type::I1], Type::I32);
    b.set_debug_loc(Some(DebugLoc::new(1, 1)));
    b.block("entry");
    let hinted = b.expect(Operand::Param(1), Operand::Const(1), Type::I1);
    let known = b.is_constant(Operand::Const(5));
    b.dbg_value("x", Operand::Param(0));
    let a = b.call("inc", vec![Operand::Param(0)], Type::I32).unwrap();
    let c = b.call("inc_copy", vec![a.into()], Type::I32).unwrap();
    b.call("log", vec![c.into()], Type::Void);
    b.cond_br(hinted.into(), "then", "else");
    b.block("then");
    b.set_debug_loc(Some(DebugLoc::new(2, 5)));
    let t = b.binary(BinOp::Mul, c.into(), Operand::Const(2), Type::I32);
    b.dbg_value("t", t.into());
    b.br("join");
    b.block("else");
    let e = b.select(known.into(), c.into(), Operand::Const(0), Type::I32);
    b.br("join");
    b.block("join");
    let p = b.phi(vec![(t.into(), "then"), (e.into(), "else")], Type::I32);
    b.ret(Some(p.into()));
    unit.add_function(b.finish());

    assert!(unit.verify().is_ok(), "{:?}", unit.verify());
    unit
}

fn all_flag_combinations() -> Vec<OptimizeOptions<'static>> {
    let mut out = Vec::new();
    for debug in [false, true] {
        for jit in [false, true] {
            for pic in [false, true] {
                out.push(OptimizeOptions {
                    debug,
                    jit,
                    pic,
                    plugins: None,
                });
            }
        }
    }
    out
}

fn names(unit: &Module) -> Vec<&str> {
    unit.functions.iter().map(|f| f.name.as_str()).collect()
}

#[test]
fn every_flag_combination_verifies() {
    for options in all_flag_combinations() {
        let mut unit = sample_unit();
        let report = try_optimize(&mut unit, &options)
            .unwrap_or_else(|e| panic!("{:?}: {e}", options.mode()));
        assert!(unit.verify().is_ok());
        assert_eq!(unit.lowerable_intrinsic_count(), 0);
        assert_eq!(report.mode, options.mode());
    }
}

#[test]
fn minimal_unit_survives_every_combination() {
    for options in all_flag_combinations() {
        let mut b = FunctionBuilder::new("main", vec![], Type::Void);
        b.ret(None);
        let mut unit = Module::new("minimal");
        unit.add_function(b.finish());

        optimize(&mut unit, &options);
        assert!(unit.verify().is_ok());
        assert_eq!(names(&unit), ["main"]);
    }
}

/// Distinct source locations and variables a debugger could still show.
fn debug_info(unit: &Module) -> HashSet<(String, String)> {
    let mut out = HashSet::new();
    for f in unit.defined_functions() {
        for inst in f.instructions() {
            if let Some(loc) = inst.debug_loc {
                out.insert((f.name.clone(), format!("{}:{}", loc.line, loc.column)));
            }
            if let Op::DbgValue { variable, .. } = &inst.op {
                out.insert((f.name.clone(), variable.clone()));
            }
        }
    }
    out
}

#[test]
fn debug_keeps_more_debug_metadata_than_release() {
    let original = debug_info(&sample_unit());
    for jit in [false, true] {
        let mut debug = sample_unit();
        let mut release = sample_unit();
        optimize(&mut debug, &OptimizeOptions::debug().with_jit(jit));
        optimize(&mut release, &OptimizeOptions::release().with_jit(jit));

        let kept = debug_info(&debug);
        assert_eq!(kept, original, "debug mode keeps every location and variable");
        let release = debug_info(&release);
        assert!(release.is_subset(&kept));
        assert!(release.len() < kept.len());
    }
}

/// `l1` and `l2` only reach each other, and each holds a phi of the other's.
fn unreachable_phi_cycle() -> Module {
    let mut b = FunctionBuilder::new("cycle", vec![Type::I32], Type::I32);
    b.block("entry");
    b.ret(Some(Operand::Param(0)));
    b.block("l1");
    let first = b.phi(vec![(Operand::Value(ValueId(1)), "l2")], Type::I32);
    b.br("l2");
    b.block("l2");
    let second = b.phi(vec![(Operand::Value(first), "l1")], Type::I32);
    b.br("l1");
    assert_eq!(second, ValueId(1));

    let mut unit = Module::new("cycle").with_triple("x86_64-unknown-linux-gnu");
    unit.add_function(b.finish());
    assert!(unit.verify().is_ok(), "{:?}", unit.verify());
    unit
}

#[test]
fn unreachable_phi_cycles_terminate() {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let results: Vec<_> = all_flag_combinations()
            .into_iter()
            .map(|options| {
                let mut unit = unreachable_phi_cycle();
                try_optimize(&mut unit, &options).map(|_| unit)
            })
            .collect();
        let _ = tx.send(results);
    });

    let results = rx
        .recv_timeout(Duration::from_secs(30))
        .expect("optimization did not finish");
    for result in results {
        let unit = result.unwrap();
        assert!(unit.verify().is_ok());
    }

    let mut unit = unreachable_phi_cycle();
    optimize(&mut unit, &OptimizeOptions::release());
    let f = unit.function("cycle").unwrap();
    assert_eq!(f.blocks.len(), 1, "unreachable blocks are removed");
}

#[test]
fn canary_plugin_reaches_every_function() {
    let mut registry = PassRegistry::new();
    registry.register(InsertionPoint::BeforeAll, Canary);

    for options in all_flag_combinations() {
        let mut with = sample_unit();
        optimize(&mut with, &options.with_plugins(&registry));
        assert!(with.defined_functions().all(has_canary), "{:?}", options.mode());
        if options.debug {
            assert_eq!(names(&with), names(&sample_unit()));
        }

        let mut without = sample_unit();
        optimize(&mut without, &options);
        assert!(!without.defined_functions().any(has_canary));
    }
}

#[test]
fn release_static_removes_unreachable_internals() {
    let mut unit = sample_unit();
    optimize(&mut unit, &OptimizeOptions::release());
    assert_eq!(names(&unit), ["log", "main"]);

    let main = unit.function("main").unwrap();
    assert_eq!(main.callees(), ["log"]);
    assert!(main.attribute("frame-pointer").is_none());
}

#[test]
fn jit_keeps_symbols_a_later_module_may_need() {
    let mut unit = sample_unit();
    optimize(&mut unit, &OptimizeOptions::release().with_jit(true));
    assert_eq!(names(&unit), ["log", "puts", "inc", "inc_copy", "dead", "main"]);
    assert_eq!(unit.function("main").unwrap().callees(), ["log"]);
}

#[test]
fn debug_preserves_frame_pointers_and_calls() {
    let mut unit = sample_unit();
    optimize(&mut unit, &OptimizeOptions::debug());
    for f in unit.defined_functions() {
        assert_eq!(f.attribute("frame-pointer"), Some("all"), "{}", f.name);
    }
    assert_eq!(
        unit.function("main").unwrap().callees(),
        ["inc", "inc_copy", "log"]
    );
}

#[test]
fn pic_leaves_interposable_callees_alone() {
    let mut unit = sample_unit();
    unit.function_mut("inc").unwrap().linkage = Linkage::External;
    optimize(&mut unit, &OptimizeOptions::release().with_pic(true));
    let main = unit.function("main").unwrap();
    assert_eq!(main.callees(), ["inc", "log"]);
    assert!(unit.function("inc").is_some());
}

#[test]
fn pipeline_is_a_pure_function_of_options() {
    let mut registry = PassRegistry::new();
    registry.register(InsertionPoint::ScalarLate, Canary);
    for options in all_flag_combinations() {
        let options = options.with_plugins(&registry);
        let first = build_pipeline(&options).pass_names();
        let second = build_pipeline(&options).pass_names();
        assert_eq!(first, second);
        assert!(first.iter().any(|n| n == "insert-canary"));
        assert_eq!(
            first.iter().any(|n| n == "global-dce"),
            !options.debug && !options.jit
        );
        assert_eq!(first.iter().any(|n| n == "early-cse"), !options.debug);
    }
}

#[test]
fn declaration_order_is_preserved() {
    let original: Vec<String> = names(&sample_unit())
        .into_iter()
        .map(str::to_string)
        .collect();
    for options in all_flag_combinations() {
        let mut unit = sample_unit();
        optimize(&mut unit, &options);
        let mut remaining = original.iter();
        for name in names(&unit) {
            assert!(remaining.any(|o| o == name), "{name} moved");
        }
    }
}

#[test]
fn units_optimize_concurrently_with_a_shared_registry() {
    let mut registry = PassRegistry::new();
    registry.register(InsertionPoint::AfterAll, Canary);
    let options = OptimizeOptions::release().with_plugins(&registry);

    let mut expected = sample_unit();
    optimize(&mut expected, &options);

    let units: Vec<Module> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    let mut unit = sample_unit();
                    optimize(&mut unit, &options);
                    unit
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for unit in units {
        assert_eq!(unit, expected);
    }
}

// Straight-line evaluation used to compare a function before and after
// optimization.
fn eval(f: &Function, args: &[i64]) -> i64 {
    let mut values: HashMap<ValueId, i64> = HashMap::new();
    let read = |operand: &Operand, values: &HashMap<ValueId, i64>| match operand {
        Operand::Value(v) => values[v],
        Operand::Param(i) => args[*i as usize],
        Operand::Const(c) => *c,
    };
    for inst in &f.blocks[0].insts {
        let value = match &inst.op {
            Op::Binary { kind, lhs, rhs } => kind
                .fold(read(lhs, &values), read(rhs, &values), inst.ty)
                .unwrap(),
            Op::Cmp { pred, lhs, rhs } => {
                i64::from(pred.fold(read(lhs, &values), read(rhs, &values)))
            }
            Op::Select {
                cond,
                then_value,
                else_value,
            } => {
                if read(cond, &values) & 1 != 0 {
                    read(then_value, &values)
                } else {
                    read(else_value, &values)
                }
            }
            Op::Expect { value, .. } => read(value, &values),
            Op::Ret { value: Some(v) } => return read(v, &values),
            other => panic!("unexpected {other:?}"),
        };
        if let Some(result) = inst.result {
            values.insert(result, inst.ty.wrap(value));
        }
    }
    panic!("no return")
}

const OPS: [BinOp; 6] = [
    BinOp::Add,
    BinOp::Sub,
    BinOp::Mul,
    BinOp::And,
    BinOp::Or,
    BinOp::Xor,
];

fn straight_line(steps: &[(u8, u8, u8, i8)]) -> Module {
    let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::I32], Type::I32);
    let mut pool: Vec<Operand> = vec![Operand::Param(0), Operand::Param(1)];
    for &(kind, lhs, rhs, constant) in steps {
        let pick = |sel: u8, pool: &[Operand]| {
            let idx = sel as usize % (pool.len() + 1);
            pool.get(idx).copied().unwrap_or(Operand::Const(i64::from(constant)))
        };
        let (l, r) = (pick(lhs, &pool), pick(rhs, &pool));
        let value = match kind % 8 {
            6 => {
                let lt = b.cmp(CmpPred::Slt, l, r);
                b.select(lt.into(), l, r, Type::I32)
            }
            7 => b.expect(l, r, Type::I32),
            k => b.binary(OPS[k as usize], l, r, Type::I32),
        };
        pool.push(value.into());
    }
    let last = pool.last().copied().unwrap_or(Operand::Param(0));
    b.ret(Some(last));

    let mut unit = Module::new("prop");
    unit.add_function(b.finish());
    unit
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn optimization_preserves_straight_line_results(
        steps in prop::collection::vec((any::<u8>(), any::<u8>(), any::<u8>(), any::<i8>()), 1..24),
        x in any::<i32>(),
        y in any::<i32>(),
        debug in any::<bool>(),
    ) {
        let original = straight_line(&steps);
        prop_assert!(original.verify().is_ok());

        let mut optimized = original.clone();
        let options = OptimizeOptions { debug, ..OptimizeOptions::default() };
        optimize(&mut optimized, &options);

        let args = [i64::from(x), i64::from(y)];
        prop_assert_eq!(
            eval(&original.functions[0], &args),
            eval(&optimized.functions[0], &args)
        );
    }
}
