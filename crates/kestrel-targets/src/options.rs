//! Target options and codegen model enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether generated code assumes a fixed load address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelocModel {
    Static,
    /// Position-independent: loadable at any address.
    Pic,
}

impl fmt::Display for RelocModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelocModel::Static => "static",
            RelocModel::Pic => "pic",
        })
    }
}

/// Addressable range assumption for code and data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeModel {
    Tiny,
    Small,
    Kernel,
    Medium,
    Large,
}

impl fmt::Display for CodeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CodeModel::Tiny => "tiny",
            CodeModel::Small => "small",
            CodeModel::Kernel => "kernel",
            CodeModel::Medium => "medium",
            CodeModel::Large => "large",
        })
    }
}

/// Floating-point contraction (fused multiply-add formation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FpContract {
    Off,
    /// Contract within a single expression.
    #[default]
    On,
    Fast,
}

/// Frame-pointer retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramePointer {
    #[default]
    None,
    NonLeaf,
    All,
}

impl FramePointer {
    /// Value of the `frame-pointer` function attribute.
    pub fn as_attribute(&self) -> &'static str {
        match self {
            FramePointer::None => "none",
            FramePointer::NonLeaf => "non-leaf",
            FramePointer::All => "all",
        }
    }
}

/// Floating-point calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FloatAbi {
    #[default]
    Default,
    Soft,
    Hard,
}

/// Options threaded opaquely into target-machine construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TargetOptions {
    pub fp_contract: FpContract,
    pub frame_pointer: FramePointer,
    /// Overrides the architecture's default code model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_model: Option<CodeModel>,
    pub float_abi: FloatAbi,
    /// Place each function in its own section.
    pub function_sections: bool,
    /// Place each data object in its own section.
    pub data_sections: bool,
}
