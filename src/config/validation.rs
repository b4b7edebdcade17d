//! Configuration validation logic

use crate::config::{Config, PathsConfig};
use crate::error::ProvisionError;
use anyhow::{Result, anyhow};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$"));

/// Validate a complete configuration
///
/// # Errors
///
/// Returns an error if:
/// - A server id is empty or used twice
/// - A server host is empty or its port is zero
/// - A remote path is relative
#[inline]
pub fn validate_config(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();

    for (index, server) in config.servers.iter().enumerate() {
        let context = format!("Server #{}", index + 1);

        if server.id.trim().is_empty() {
            return Err(anyhow!("{context}: Server id cannot be empty"));
        }
        if !seen.insert(server.id.as_str()) {
            return Err(anyhow!("{context}: Duplicate server id '{}'", server.id));
        }
        if server.host.trim().is_empty() {
            return Err(anyhow!("{context}: Host cannot be empty"));
        }
        if server.port == 0 {
            return Err(anyhow!("{context}: Port must be between 1 and 65535"));
        }
    }

    validate_remote_paths(&config.remote_paths)?;

    Ok(())
}

/// Remote paths are embedded in scripts run elsewhere, so they must be absolute
fn validate_remote_paths(paths: &PathsConfig) -> Result<()> {
    let entries = [
        ("root", paths.root.as_ref()),
        ("applications", paths.applications.as_ref()),
        ("compose", paths.compose.as_ref()),
        ("ssh", paths.ssh.as_ref()),
        ("logs", paths.logs.as_ref()),
    ];

    for (name, value) in entries {
        if let Some(value) = value
            && !Path::new(value).is_absolute()
        {
            return Err(anyhow!(
                "remote_paths.{name} must be an absolute path, got '{value}'"
            ));
        }
    }

    Ok(())
}

/// Validate an application name used as a directory component
///
/// # Errors
///
/// Returns a `Validation` error if the name is empty or contains characters
/// other than letters, digits, `.`, `_` and `-` (or starts with a symbol)
#[inline]
pub fn validate_app_name(name: &str) -> Result<(), ProvisionError> {
    validate_identifier("application name", name)
}

/// Validate an SSH key id used to build the private key file name
///
/// # Errors
///
/// Returns a `Validation` error under the same rules as `validate_app_name`
#[inline]
pub fn validate_credential_id(id: &str) -> Result<(), ProvisionError> {
    validate_identifier("SSH key id", id)
}

fn validate_identifier(kind: &str, value: &str) -> Result<(), ProvisionError> {
    let pattern = IDENTIFIER
        .as_ref()
        .map_err(|e| ProvisionError::validation(format!("Invalid identifier pattern: {e}")))?;

    if !pattern.is_match(value) {
        return Err(ProvisionError::validation(format!(
            "Invalid {kind} '{value}'. Use letters, digits, '.', '_' and '-'"
        )));
    }

    Ok(())
}
