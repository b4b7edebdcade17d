//! Error handling module
//!
//! Defines the provisioning error kinds and their exit codes

pub mod types;

pub use types::*;
