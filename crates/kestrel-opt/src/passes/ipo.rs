//! Whole-program passes.
//!
//! These assume the unit is the final word on its internal symbols, which
//! holds for static emission but not for a JIT that may link more code into
//! the same process later.

use std::collections::{HashMap, HashSet};

use kestrel_ir::{Function, Linkage, Module, Op};

use crate::pass::{Mode, Pass, PassStats};

/// Folds structurally identical internal functions into the first one.
#[derive(Debug)]
pub struct MergeFunctions;

fn mergeable(f: &Function) -> bool {
    f.linkage == Linkage::Internal && !f.is_declaration()
}

fn same_body(a: &Function, b: &Function) -> bool {
    a.params == b.params && a.ret == b.ret && a.attributes == b.attributes && a.blocks == b.blocks
}

impl Pass for MergeFunctions {
    fn name(&self) -> &str {
        "merge-functions"
    }

    fn run(&self, unit: &mut Module, _mode: Mode) -> PassStats {
        let mut redirects: HashMap<String, String> = HashMap::new();
        for (i, f) in unit.functions.iter().enumerate() {
            if !mergeable(f) {
                continue;
            }
            let original = unit.functions[..i]
                .iter()
                .find(|g| mergeable(g) && !redirects.contains_key(&g.name) && same_body(g, f));
            if let Some(original) = original {
                redirects.insert(f.name.clone(), original.name.clone());
            }
        }
        if redirects.is_empty() {
            return PassStats::default();
        }

        unit.functions.retain(|f| !redirects.contains_key(&f.name));
        for f in &mut unit.functions {
            for inst in f.instructions_mut() {
                if let Op::Call { callee, .. } = &mut inst.op {
                    if let Some(target) = redirects.get(callee.as_str()) {
                        callee.clone_from(target);
                    }
                }
            }
        }
        PassStats {
            functions_removed: redirects.len(),
            ..PassStats::default()
        }
    }
}

/// Deletes internal functions unreachable from any external definition.
#[derive(Debug)]
pub struct GlobalDce;

impl Pass for GlobalDce {
    fn name(&self) -> &str {
        "global-dce"
    }

    fn run(&self, unit: &mut Module, _mode: Mode) -> PassStats {
        let by_name: HashMap<&str, &Function> =
            unit.functions.iter().map(|f| (f.name.as_str(), f)).collect();
        let mut live: HashSet<&str> = unit
            .functions
            .iter()
            .filter(|f| f.linkage == Linkage::External || f.is_declaration())
            .map(|f| f.name.as_str())
            .collect();
        let mut worklist: Vec<&str> = live.iter().copied().collect();
        while let Some(name) = worklist.pop() {
            let Some(f) = by_name.get(name) else {
                continue;
            };
            for callee in f.callees() {
                if live.insert(callee) {
                    worklist.push(callee);
                }
            }
        }

        let live: HashSet<String> = live.into_iter().map(str::to_string).collect();
        let before = unit.functions.len();
        unit.functions.retain(|f| live.contains(&f.name));
        PassStats {
            functions_removed: before - unit.functions.len(),
            ..PassStats::default()
        }
    }
}

/// Deletes declarations nothing calls.
#[derive(Debug)]
pub struct StripDeadPrototypes;

impl Pass for StripDeadPrototypes {
    fn name(&self) -> &str {
        "strip-dead-prototypes"
    }

    fn run(&self, unit: &mut Module, _mode: Mode) -> PassStats {
        let called: HashSet<String> = unit
            .functions
            .iter()
            .flat_map(|f| f.callees())
            .map(str::to_string)
            .collect();
        let before = unit.functions.len();
        unit.functions
            .retain(|f| !f.is_declaration() || called.contains(&f.name));
        PassStats {
            functions_removed: before - unit.functions.len(),
            ..PassStats::default()
        }
    }
}
