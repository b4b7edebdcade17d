//! File system utilities

use crate::error::ProvisionError;
use crate::system::System;
use anyhow::{Context as _, Result};
use std::path::Path;

/// Create parent directories for a file path if they don't exist
pub fn create_parent_directories(system: &dyn System, file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent()
        && !parent.as_os_str().is_empty()
        && !system.exists(parent)
    {
        system.create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create parent directories for: {}",
                file_path.display()
            )
        })?;
    }
    Ok(())
}

/// Leave `dir_path` existing and empty
///
/// Whatever was there before is removed first.
///
/// # Errors
///
/// Returns a `DirectoryReset` error if removal or creation fails
#[inline]
pub fn recreate_directory(system: &dyn System, dir_path: &Path) -> Result<(), ProvisionError> {
    if system.exists(dir_path) {
        system.remove_dir_all(dir_path).map_err(|e| {
            ProvisionError::directory_reset(format!(
                "Failed to remove directory {}: {e}",
                dir_path.display()
            ))
        })?;
    }

    system.create_dir_all(dir_path).map_err(|e| {
        ProvisionError::directory_reset(format!(
            "Failed to create directory {}: {e}",
            dir_path.display()
        ))
    })
}
