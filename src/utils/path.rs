//! Path expansion utilities

use crate::error::ProvisionError;
use crate::system::System;
use std::path::PathBuf;

/// Expand a leading `~` to the home directory
///
/// The home directory comes from `HOME` (or `USERPROFILE`) as seen through
/// `system`, falling back to `dirs::home_dir()`.
///
/// # Errors
///
/// Returns a `Configuration` error if the path starts with `~` and no home
/// directory can be determined
#[inline]
pub fn expand_home(system: &dyn System, raw: &str) -> Result<PathBuf, ProvisionError> {
    let Some(rest) = raw.strip_prefix('~') else {
        return Ok(PathBuf::from(raw));
    };

    let home = system
        .env_var("HOME")
        .or_else(|_| system.env_var("USERPROFILE"))
        .map(PathBuf::from)
        .ok()
        .or_else(dirs::home_dir)
        .ok_or_else(|| {
            ProvisionError::configuration(format!(
                "Cannot determine home directory for ~ expansion of '{raw}'"
            ))
        })?;

    Ok(home.join(rest.trim_start_matches(['/', '\\'])))
}
