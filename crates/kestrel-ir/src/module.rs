//! Compilation units.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IrError, VerifyError};
use crate::function::Function;

/// A compilation unit: target metadata plus functions in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Declared target triple, e.g. `x86_64-unknown-linux-gnu`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triple: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_layout: Option<String>,
    /// CPU the unit was generated for; host CPU when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_features: Option<String>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triple: None,
            data_layout: None,
            target_cpu: None,
            target_features: None,
            functions: Vec::new(),
        }
    }

    pub fn with_triple(mut self, triple: impl Into<String>) -> Self {
        self.triple = Some(triple.into());
        self
    }

    pub fn with_target_cpu(mut self, cpu: impl Into<String>, features: impl Into<String>) -> Self {
        self.target_cpu = Some(cpu.into());
        self.target_features = Some(features.into());
        self
    }

    /// Append a function, keeping declaration order.
    pub fn add_function(&mut self, function: Function) -> &mut Function {
        self.functions.push(function);
        let last = self.functions.len() - 1;
        &mut self.functions[last]
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// Functions with bodies, in declaration order.
    pub fn defined_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_declaration())
    }

    pub fn defined_functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.iter_mut().filter(|f| !f.is_declaration())
    }

    /// Check structural well-formedness.
    pub fn verify(&self) -> Result<(), Vec<VerifyError>> {
        crate::verify::verify_module(self)
    }

    /// Number of intrinsic calls the optimization pipeline is required to lower.
    pub fn lowerable_intrinsic_count(&self) -> usize {
        self.functions
            .iter()
            .flat_map(|f| f.instructions())
            .filter(|i| i.op.is_lowerable_intrinsic())
            .count()
    }

    /// Total source-correspondence metadata (debug locations and `dbg.value` records).
    pub fn debug_metadata_count(&self) -> usize {
        self.functions.iter().map(Function::debug_metadata_count).sum()
    }

    pub fn from_json(json: &str) -> Result<Self, IrError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, IrError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a unit from a JSON file.
    pub fn load(path: &Path) -> Result<Self, IrError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the unit as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), IrError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
