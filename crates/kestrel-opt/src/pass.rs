//! Pass traits.

use std::fmt;
use std::ops::AddAssign;

use kestrel_ir::{Function, Module};
use serde::Serialize;

/// Mode flags a pass may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Mode {
    pub debug: bool,
    pub jit: bool,
    pub pic: bool,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "debug={}, jit={}, pic={}", self.debug, self.jit, self.pic)
    }
}

/// Statistics from running one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub insts_added: usize,
    pub insts_removed: usize,
    pub blocks_removed: usize,
    pub functions_removed: usize,
    pub attributes_changed: usize,
}

impl PassStats {
    pub fn changed(&self) -> bool {
        *self != Self::default()
    }
}

impl AddAssign for PassStats {
    fn add_assign(&mut self, rhs: Self) {
        self.insts_added += rhs.insts_added;
        self.insts_removed += rhs.insts_removed;
        self.blocks_removed += rhs.blocks_removed;
        self.functions_removed += rhs.functions_removed;
        self.attributes_changed += rhs.attributes_changed;
    }
}

/// A whole-unit transformation.
///
/// Object-safe so passes can be shared as `Arc<dyn Pass>` between the
/// built-in pipeline and plugin registries. Passes are immutable; all state
/// lives in the unit.
pub trait Pass: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, unit: &mut Module, mode: Mode) -> PassStats;
}

/// A transformation that looks at one function at a time.
pub trait FunctionPass: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn run_on_function(&self, function: &mut Function, mode: Mode) -> PassStats;
}

/// Runs a [`FunctionPass`] over every defined function in declaration order.
#[derive(Debug)]
pub struct FunctionPassAdaptor<P>(pub P);

impl<P: FunctionPass> Pass for FunctionPassAdaptor<P> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn run(&self, unit: &mut Module, mode: Mode) -> PassStats {
        let mut stats = PassStats::default();
        for function in unit.defined_functions_mut() {
            stats += self.0.run_on_function(function, mode);
        }
        stats
    }
}
