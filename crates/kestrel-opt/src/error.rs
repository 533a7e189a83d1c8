//! Pipeline errors.

use kestrel_ir::VerifyError;
use thiserror::Error;

use crate::pass::Mode;

/// The pipeline left a unit malformed.
///
/// This is a defect in pass composition (or in a plugin pass), never a
/// caller error, and is not retried.
#[derive(Debug, Clone, Error)]
#[error(
    "unit `{unit}` failed verification after stage `{stage}` ({mode}): {}",
    summarize(.errors, .leftover_intrinsics)
)]
pub struct InvariantViolation {
    pub unit: String,
    /// Stage after which verification failed.
    pub stage: String,
    pub mode: Mode,
    pub errors: Vec<VerifyError>,
    /// `expect` / `is.constant` intrinsics still present at the end.
    pub leftover_intrinsics: usize,
}

fn summarize(errors: &[VerifyError], leftover_intrinsics: &usize) -> String {
    let mut parts: Vec<String> = errors.iter().map(ToString::to_string).collect();
    if *leftover_intrinsics > 0 {
        parts.push(format!("{leftover_intrinsics} unlowered intrinsic(s) remain"));
    }
    parts.join("; ")
}
