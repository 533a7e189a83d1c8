//! Error types for target resolution.
//!
//! Every variant is a configuration error: the caller supplied a target the
//! backend cannot build, and may retry with a different combination.

use std::path::PathBuf;

/// Errors that can occur while building a target-machine description.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// The triple string could not be split into components.
    #[error("malformed target triple `{input}`")]
    MalformedTriple {
        /// The offending input.
        input: String,
    },

    /// The triple names an architecture with no backend.
    #[error("unsupported architecture `{arch}` in triple `{triple}`")]
    UnsupportedArch {
        /// Architecture component.
        arch: String,
        /// Full triple.
        triple: String,
    },

    /// The CPU name is not in the architecture's catalog.
    #[error("unknown CPU `{cpu}` for architecture `{arch}`")]
    UnknownCpu {
        /// Requested CPU name.
        cpu: String,
        /// Resolved architecture.
        arch: String,
    },

    /// A feature toggle names a feature the architecture does not have.
    #[error("unrecognized feature `{feature}` for CPU `{cpu}` on `{arch}`")]
    UnknownFeature {
        /// The feature name without its `+`/`-` prefix.
        feature: String,
        /// Resolved CPU.
        cpu: String,
        /// Resolved architecture.
        arch: String,
    },

    /// A feature token is syntactically invalid (empty, bare prefix, bad characters).
    #[error("malformed feature token `{token}`")]
    MalformedFeature {
        /// The offending token.
        token: String,
    },

    /// The requested code model is not available on the architecture.
    #[error("code model `{model}` is not supported on `{arch}`")]
    UnsupportedCodeModel {
        /// Requested code model.
        model: String,
        /// Resolved architecture.
        arch: String,
    },

    /// The compilation unit declares no target triple.
    #[error("compilation unit `{unit}` declares no target triple")]
    MissingTriple {
        /// Name of the unit.
        unit: String,
    },

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading/writing target files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Target file not found.
    #[error("target file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// LLVM could not instantiate a native target machine.
    #[error("LLVM target machine creation failed for `{triple}`: {message}")]
    LlvmTargetFailed {
        /// Triple passed to LLVM.
        triple: String,
        /// LLVM's diagnostic.
        message: String,
    },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
