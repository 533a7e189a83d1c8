//! Target-machine descriptions.
//!
//! A [`TargetMachine`] is the resolved answer to "what exactly are we
//! generating code for": triple, CPU, feature set, data layout, relocation
//! and code model. It is immutable once built and can be shared read-only
//! across concurrent compilations.

use serde::Serialize;
use tracing::{debug, warn};

use kestrel_ir::Module;

use crate::arch::{ArchInfo, Endianness};
use crate::error::{Result, TargetError};
use crate::features::FeatureSet;
use crate::host;
use crate::options::{CodeModel, FramePointer, RelocModel, TargetOptions};
use crate::triple::Triple;

/// Function attribute carrying the resolved CPU name.
pub const TARGET_CPU_ATTR: &str = "target-cpu";
/// Function attribute carrying the rendered feature string.
pub const TARGET_FEATURES_ATTR: &str = "target-features";
/// Function attribute carrying a non-default frame-pointer policy.
pub const FRAME_POINTER_ATTR: &str = "frame-pointer";

/// A fully resolved target-machine description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetMachine {
    triple: Triple,
    cpu: String,
    features: FeatureSet,
    data_layout: String,
    reloc: RelocModel,
    code_model: CodeModel,
    pointer_width: u32,
    endianness: Endianness,
    options: TargetOptions,
}

impl TargetMachine {
    /// Build a machine from explicit parameters.
    ///
    /// An empty, `native` or `host` CPU selects the host CPU when the triple
    /// targets the host architecture, and the architecture's generic CPU
    /// otherwise. `features` toggles are applied on top of the CPU defaults.
    pub fn from_parameters(
        triple: &Triple,
        cpu: &str,
        features: &str,
        options: TargetOptions,
        pic: bool,
    ) -> Result<Self> {
        let arch = ArchInfo::for_arch(triple.arch()).ok_or_else(|| TargetError::UnsupportedArch {
            arch: triple.arch().to_string(),
            triple: triple.to_string(),
        })?;

        let cpu = cpu.trim();
        let (model, base) = if host::is_host_sentinel(cpu) {
            host::detect_cpu(arch)
        } else {
            let model = arch.cpu(cpu).ok_or_else(|| TargetError::UnknownCpu {
                cpu: cpu.to_string(),
                arch: arch.name.to_string(),
            })?;
            (model, FeatureSet::from_cpu(arch, model))
        };
        let features = base.with_toggles(arch, model.name, features)?;

        let code_model = match options.code_model {
            Some(model) if !arch.supports_code_model(model) => {
                return Err(TargetError::UnsupportedCodeModel {
                    model: model.to_string(),
                    arch: arch.name.to_string(),
                });
            }
            Some(model) => model,
            None => arch.default_code_model,
        };

        let machine = Self {
            triple: triple.clone(),
            cpu: model.name.to_string(),
            features,
            data_layout: arch.data_layout(triple.os()).to_string(),
            reloc: if pic { RelocModel::Pic } else { RelocModel::Static },
            code_model,
            pointer_width: arch.pointer_width,
            endianness: arch.endianness,
            options,
        };
        debug!(
            triple = %machine.triple,
            cpu = %machine.cpu,
            features = %machine.features,
            reloc = %machine.reloc,
            code_model = %machine.code_model,
            "resolved target machine"
        );
        Ok(machine)
    }

    /// Build a machine for the target a compilation unit declares.
    ///
    /// The unit must carry a triple. Its CPU and feature metadata are used
    /// when present, otherwise the host is detected. With
    /// `set_function_attributes`, every defined function is stamped with the
    /// resolved `target-cpu` / `target-features`.
    pub fn from_unit(unit: &mut Module, set_function_attributes: bool, pic: bool) -> Result<Self> {
        let triple = unit
            .triple
            .as_deref()
            .ok_or_else(|| TargetError::MissingTriple {
                unit: unit.name.clone(),
            })
            .and_then(Triple::parse)?;

        let cpu = unit.target_cpu.as_deref().unwrap_or("");
        let features = unit.target_features.as_deref().unwrap_or("");
        let machine = Self::from_parameters(&triple, cpu, features, TargetOptions::default(), pic)?;

        if let Some(declared) = unit.data_layout.as_deref() {
            if declared != machine.data_layout {
                warn!(
                    unit = %unit.name,
                    declared,
                    resolved = %machine.data_layout,
                    "unit data layout differs from target machine"
                );
            }
        }

        if set_function_attributes {
            machine.apply_function_attributes(unit);
        }
        Ok(machine)
    }

    /// Stamp `target-cpu` and `target-features` on every defined function,
    /// plus `frame-pointer` when the options ask for more than the default.
    ///
    /// Returns the number of attributes whose value changed; reapplying the
    /// same machine returns 0.
    pub fn apply_function_attributes(&self, unit: &mut Module) -> usize {
        let features = self.features.render();
        let frame_pointer = match self.options.frame_pointer {
            FramePointer::None => None,
            policy => Some(policy.as_attribute()),
        };
        let mut changed = 0;
        for function in unit.defined_functions_mut() {
            changed += usize::from(function.set_attribute(TARGET_CPU_ATTR, self.cpu.as_str()));
            changed += usize::from(function.set_attribute(TARGET_FEATURES_ATTR, features.as_str()));
            if let Some(policy) = frame_pointer {
                changed += usize::from(function.set_attribute(FRAME_POINTER_ATTR, policy));
            }
        }
        debug!(unit = %unit.name, changed, "applied target function attributes");
        changed
    }

    pub fn triple(&self) -> &Triple {
        &self.triple
    }

    pub fn cpu(&self) -> &str {
        &self.cpu
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn data_layout(&self) -> &str {
        &self.data_layout
    }

    pub fn reloc(&self) -> RelocModel {
        self.reloc
    }

    pub fn code_model(&self) -> CodeModel {
        self.code_model
    }

    /// Pointer width in bits.
    pub fn pointer_width(&self) -> u32 {
        self.pointer_width
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn options(&self) -> &TargetOptions {
        &self.options
    }
}
