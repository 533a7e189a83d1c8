//! Plugin insertion points and registries.
//!
//! The driver only ever asks a registry one question: which passes run at a
//! given insertion point. How plugins are discovered or loaded is the
//! registry owner's business.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pass::Pass;

/// Named pipeline positions where plugin passes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertionPoint {
    /// Before any built-in transformation.
    BeforeAll,
    /// After scalar simplification, before inlining.
    ScalarLate,
    /// After every built-in transformation.
    AfterAll,
}

impl InsertionPoint {
    pub const ALL: [InsertionPoint; 3] = [
        InsertionPoint::BeforeAll,
        InsertionPoint::ScalarLate,
        InsertionPoint::AfterAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsertionPoint::BeforeAll => "before-all",
            InsertionPoint::ScalarLate => "scalar-late",
            InsertionPoint::AfterAll => "after-all",
        }
    }
}

impl fmt::Display for InsertionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsertionPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown insertion point `{s}`"))
    }
}

/// Source of externally supplied passes.
///
/// Queried once per insertion point when a pipeline is built and never
/// mutated by the driver. Implementations shared between threads must be
/// safe to query concurrently.
pub trait PluginRegistry: fmt::Debug + Send + Sync {
    /// Passes to run at `point`, in the order they should run.
    fn passes_at(&self, point: InsertionPoint) -> Vec<Arc<dyn Pass>>;

    /// LLVM pass-pipeline names to splice in at `point` when the pipeline is
    /// rendered for the native backend.
    fn native_passes_at(&self, _point: InsertionPoint) -> Vec<String> {
        Vec::new()
    }
}

/// An ordered, in-memory [`PluginRegistry`].
#[derive(Debug, Default, Clone)]
pub struct PassRegistry {
    passes: Vec<(InsertionPoint, Arc<dyn Pass>)>,
    native: Vec<(InsertionPoint, String)>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pass at `point`, after any already registered there.
    pub fn register(&mut self, point: InsertionPoint, pass: impl Pass + 'static) {
        self.passes.push((point, Arc::new(pass)));
    }

    pub fn register_shared(&mut self, point: InsertionPoint, pass: Arc<dyn Pass>) {
        self.passes.push((point, pass));
    }

    /// Register an LLVM pass name for the native pipeline text.
    pub fn register_native(&mut self, point: InsertionPoint, pass_name: impl Into<String>) {
        self.native.push((point, pass_name.into()));
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl PluginRegistry for PassRegistry {
    fn passes_at(&self, point: InsertionPoint) -> Vec<Arc<dyn Pass>> {
        self.passes
            .iter()
            .filter(|(p, _)| *p == point)
            .map(|(_, pass)| Arc::clone(pass))
            .collect()
    }

    fn native_passes_at(&self, point: InsertionPoint) -> Vec<String> {
        self.native
            .iter()
            .filter(|(p, _)| *p == point)
            .map(|(_, name)| name.clone())
            .collect()
    }
}
