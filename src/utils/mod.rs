//! Utility helpers shared across modules

pub mod fs;
pub mod path;
