//! Core module
//!
//! Process and package plumbing used by the CLI wrappers:
//! - Standard stream swapping at the file descriptor level
//! - Panic capture with location and backtrace
//! - Installed package lookup from cargo's install records

pub mod install;
pub mod metadata;
pub mod panic;
pub mod sitepackage;
pub mod stdio;
