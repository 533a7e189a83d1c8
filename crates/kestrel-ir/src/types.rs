//! First-class value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of an SSA value, parameter, or function return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Type {
    Void,
    I1,
    I8,
    I32,
    I64,
    F64,
    Ptr,
}

impl Type {
    /// Whether this is one of the integer types.
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::I1 | Type::I8 | Type::I32 | Type::I64)
    }

    /// Bit width of integer types, `None` otherwise.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            Type::I1 => Some(1),
            Type::I8 => Some(8),
            Type::I32 => Some(32),
            Type::I64 => Some(64),
            _ => None,
        }
    }

    /// Wrap a constant to this integer type's width (sign-extended back to i64).
    pub fn wrap(&self, value: i64) -> i64 {
        match self.bit_width() {
            Some(1) => value & 1,
            Some(8) => value as i8 as i64,
            Some(32) => value as i32 as i64,
            _ => value,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I8 => "i8",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F64 => "f64",
            Type::Ptr => "ptr",
        };
        f.write_str(name)
    }
}
