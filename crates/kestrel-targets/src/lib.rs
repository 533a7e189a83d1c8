//! Target descriptor builder for the Kestrel backend.
//!
//! Resolves a target triple, CPU name and feature string into a concrete
//! [`TargetMachine`] description:
//! - **Triple:** architecture, vendor, OS, environment
//! - **Architecture catalog:** data layout, pointer width, code models, known features
//! - **CPU catalog:** per-CPU default feature sets, with host detection
//! - **Options:** floating-point contraction, frame pointers, code model override
//!
//! Machines are built either from explicit parameters or from the target
//! metadata a compilation unit declares.

pub mod arch;
pub mod cpu;
pub mod error;
pub mod features;
pub mod host;
pub mod machine;
pub mod options;
pub mod parse;
pub mod triple;

#[cfg(feature = "llvm")]
pub mod llvm;

pub use arch::{ArchInfo, Endianness};
pub use cpu::CpuModel;
pub use error::{Result, TargetError};
pub use features::FeatureSet;
pub use machine::TargetMachine;
pub use options::{CodeModel, FloatAbi, FpContract, FramePointer, RelocModel, TargetOptions};
pub use parse::TargetSpec;
pub use triple::{Arch, Os, Triple};
