//! Remote command execution on managed hosts

use super::{OutputStream, ProcessEnvironment, ProcessSpec, System};
use crate::error::ProvisionError;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A managed host reachable over SSH
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub identity_file: Option<PathBuf>,
}

impl ServerHandle {
    /// `user@host`, as ssh expects it
    #[must_use]
    #[inline]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Runs shell scripts on managed hosts
pub trait RemoteExecutor: Send + Sync {
    /// Execute `script` with a POSIX shell on `server`
    ///
    /// # Errors
    ///
    /// Returns a `RemoteExecution` error if the host cannot be reached or the
    /// script exits with a non-zero status
    fn run_on_remote_host(&self, server: &ServerHandle, script: &str) -> Result<(), ProvisionError>;
}

/// Executes scripts by piping them into `sh -s` over an ssh session
pub struct SshRemoteExecutor<'src> {
    system: &'src dyn System,
}

impl<'src> SshRemoteExecutor<'src> {
    #[must_use]
    #[inline]
    pub fn new(system: &'src dyn System) -> Self {
        Self { system }
    }

    /// Build the ssh invocation for `server`
    #[must_use]
    #[inline]
    pub fn ssh_spec(&self, server: &ServerHandle, script: &str) -> ProcessSpec {
        let mut args = vec![
            "-o".to_owned(),
            "BatchMode=yes".to_owned(),
            "-p".to_owned(),
            server.port.to_string(),
        ];
        if let Some(identity) = server.identity_file.as_ref() {
            args.push("-i".to_owned());
            args.push(identity.display().to_string());
        }
        args.push(server.destination());
        args.push("sh".to_owned());
        args.push("-s".to_owned());

        ProcessSpec::new("ssh", args)
            .with_environment(ProcessEnvironment::inherit(self.system))
            .with_stdin(script.as_bytes().to_vec())
    }
}

impl RemoteExecutor for SshRemoteExecutor<'_> {
    fn run_on_remote_host(&self, server: &ServerHandle, script: &str) -> Result<(), ProvisionError> {
        info!("Running script on server '{}' ({})", server.id, server.host);
        let spec = self.ssh_spec(server, script);

        let mut stderr = Vec::new();
        let exit = self
            .system
            .run_process(&spec, &mut |stream, chunk| match stream {
                OutputStream::Stdout => debug!("[{}] {}", server.id, String::from_utf8_lossy(chunk).trim_end()),
                OutputStream::Stderr => stderr.extend_from_slice(chunk),
            })
            .map_err(|e| {
                ProvisionError::remote_execution(format!(
                    "Failed to start ssh for server '{}': {e}",
                    server.id
                ))
            })?;

        if !exit.success() {
            return Err(ProvisionError::remote_execution(format!(
                "Script failed on server '{}' ({}): {}",
                server.id,
                exit.describe(),
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        Ok(())
    }
}

/// Remote executor that records scripts instead of running them
#[derive(Clone, Default)]
pub struct RecordingRemoteExecutor {
    scripts: Arc<Mutex<Vec<(String, String)>>>,
    failure: Option<String>,
}

impl RecordingRemoteExecutor {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor that records the script and then reports `message`
    #[must_use]
    #[inline]
    pub fn failing(message: &str) -> Self {
        Self {
            scripts: Arc::default(),
            failure: Some(message.to_owned()),
        }
    }

    /// `(server id, script)` pairs received so far
    #[must_use]
    #[inline]
    pub fn scripts(&self) -> Vec<(String, String)> {
        self.scripts
            .lock()
            .map(|scripts| scripts.clone())
            .unwrap_or_default()
    }
}

impl RemoteExecutor for RecordingRemoteExecutor {
    fn run_on_remote_host(&self, server: &ServerHandle, script: &str) -> Result<(), ProvisionError> {
        self.scripts
            .lock()
            .map_err(|e| ProvisionError::remote_execution(e.to_string()))?
            .push((server.id.clone(), script.to_owned()));

        match self.failure.as_ref() {
            Some(message) => Err(ProvisionError::remote_execution(message.clone())),
            None => Ok(()),
        }
    }
}
