//! Known-hosts registration
//!
//! Host keys are appended unconditionally. Repeated clones from the same host
//! leave repeated lines in the file, which `ssh` tolerates.

use crate::config::ShellQuoting;
use crate::error::ProvisionError;
use crate::git::location::SshLocation;
use crate::operations::shell;
use crate::system::{OutputStream, ProcessEnvironment, ProcessSpec, System, append};
use crate::utils::fs::create_parent_directories;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Program used to fetch a host's public keys
pub const KEYSCAN_PROGRAM: &str = "ssh-keyscan";

/// Records remote host keys in one known-hosts file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownHostsRegistrar {
    known_hosts_path: PathBuf,
}

impl KnownHostsRegistrar {
    #[must_use]
    #[inline]
    pub const fn new(known_hosts_path: PathBuf) -> Self {
        Self { known_hosts_path }
    }

    #[must_use]
    #[inline]
    pub fn known_hosts_path(&self) -> &Path {
        &self.known_hosts_path
    }

    /// `ssh-keyscan` arguments for `location`
    #[must_use]
    #[inline]
    pub fn scan_args(location: &SshLocation) -> Vec<String> {
        vec![
            "-p".to_owned(),
            location.port.to_string(),
            location.domain.clone(),
        ]
    }

    /// Scan the host now and append its keys
    ///
    /// # Errors
    ///
    /// Returns a `HostKeyScan` error if the scanner cannot be started, exits
    /// with a non-zero status, or its output cannot be appended
    #[inline]
    pub fn register_now(
        &self,
        system: &dyn System,
        environment: &ProcessEnvironment,
        location: &SshLocation,
    ) -> Result<(), ProvisionError> {
        create_parent_directories(system, &self.known_hosts_path)
            .map_err(|e| ProvisionError::host_key_scan(format!("{e:#}")))?;

        let spec = ProcessSpec::new(KEYSCAN_PROGRAM, Self::scan_args(location))
            .with_environment(environment.clone());
        debug!("Running {}", spec.command_line());

        let mut keys = Vec::new();
        let exit = system
            .run_process(&spec, &mut |stream, chunk| match stream {
                OutputStream::Stdout => keys.extend_from_slice(chunk),
                OutputStream::Stderr => {
                    debug!("{KEYSCAN_PROGRAM}: {}", String::from_utf8_lossy(chunk).trim_end());
                }
            })
            .map_err(|e| {
                ProvisionError::host_key_scan(format!(
                    "Failed to run {KEYSCAN_PROGRAM} for {}: {e}",
                    location.domain
                ))
            })?;

        if !exit.success() {
            return Err(ProvisionError::host_key_scan(format!(
                "{KEYSCAN_PROGRAM} for {}:{} failed with {}",
                location.domain,
                location.port,
                exit.describe()
            )));
        }

        append(system, &self.known_hosts_path, &keys).map_err(|e| {
            ProvisionError::host_key_scan(format!(
                "Failed to append host keys to {}: {e}",
                self.known_hosts_path.display()
            ))
        })
    }

    /// The shell line that performs the same registration on another host
    #[must_use]
    #[inline]
    pub fn register_command_text(&self, location: &SshLocation, quoting: ShellQuoting) -> String {
        format!(
            "{KEYSCAN_PROGRAM} -p {} {} >> {};",
            location.port,
            shell::word(&location.domain, quoting),
            shell::word(&self.known_hosts_path.display().to_string(), quoting)
        )
    }
}
