//! Intermediate representation for the Kestrel backend.
//!
//! A [`Module`] is the compilation unit the optimizer works on: an ordered list
//! of functions in SSA form, plus the target metadata (triple, data layout, CPU)
//! the front end declared for it. The representation is deliberately small and
//! serializable so that units can be produced by any front end and round-tripped
//! through JSON.

pub mod builder;
pub mod error;
pub mod function;
pub mod inst;
pub mod module;
pub mod types;
pub mod verify;

pub use builder::FunctionBuilder;
pub use error::{IrError, VerifyError};
pub use function::{Block, Function, Linkage};
pub use inst::{BinOp, CmpPred, DebugLoc, Inst, Op, Operand, ValueId};
pub use module::Module;
pub use types::Type;
