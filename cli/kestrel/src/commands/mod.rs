//! CLI command implementations.

pub mod init;
pub mod opt;
pub mod pipeline;
pub mod target;
pub mod verify;
