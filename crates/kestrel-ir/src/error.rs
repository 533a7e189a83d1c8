//! IR error types.

use thiserror::Error;

use crate::inst::ValueId;
use crate::types::Type;

/// A structural well-formedness violation found by [`crate::Module::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("duplicate function `{name}`")]
    DuplicateFunction { name: String },

    #[error("function `{function}`: duplicate block label `{label}`")]
    DuplicateBlock { function: String, label: String },

    #[error("function `{function}`: block `{block}` is empty")]
    EmptyBlock { function: String, block: String },

    #[error("function `{function}`: block `{block}` does not end in a terminator")]
    MissingTerminator { function: String, block: String },

    #[error("function `{function}`: block `{block}` has a terminator before its end")]
    MisplacedTerminator { function: String, block: String },

    #[error("function `{function}`: block `{block}` has a phi after a non-phi instruction")]
    MisplacedPhi { function: String, block: String },

    #[error("function `{function}`: phi in `{block}` does not match its predecessors")]
    PhiIncomingMismatch { function: String, block: String },

    #[error("function `{function}`: branch to unknown block `{label}`")]
    UnknownBlock { function: String, label: String },

    #[error("function `{function}`: value {value} defined more than once")]
    DuplicateValue { function: String, value: ValueId },

    #[error("function `{function}`: use of undefined value {value}")]
    UndefinedValue { function: String, value: ValueId },

    #[error("function `{function}`: parameter index {index} out of range")]
    ParamOutOfRange { function: String, index: u32 },

    #[error("function `{function}`: call to unknown function `{callee}`")]
    UnknownCallee { function: String, callee: String },

    #[error("function `{function}`: call to `{callee}` passes {found} argument(s), expected {expected}")]
    ArityMismatch {
        function: String,
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("function `{function}`: {context} has type {found}, expected {expected}")]
    TypeMismatch {
        function: String,
        context: String,
        expected: Type,
        found: Type,
    },

    #[error("function `{function}`: {detail}")]
    ResultMismatch { function: String, detail: String },
}

/// Errors from loading or saving compilation units.
#[derive(Debug, Error)]
pub enum IrError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
