//! System abstraction for environment, filesystem and process operations
//!
//! This module provides a unified trait for all external system interactions,
//! allowing for easy testing with mock implementations. The credential
//! bookkeeping and remote execution collaborators live next to it.

use std::collections::BTreeMap;
use std::env::VarError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub mod credentials;
pub mod mock;
pub mod real;
pub mod remote;

pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use mock::{MockProcess, MockSystem};
pub use real::RealSystem;
pub use remote::{RecordingRemoteExecutor, RemoteExecutor, ServerHandle, SshRemoteExecutor};

/// Environment variable that points git's SSH transport at a custom command
pub const GIT_SSH_COMMAND: &str = "GIT_SSH_COMMAND";

/// Which pipe of a child process a chunk of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Environment handed to a child process
///
/// The child sees exactly `base_environment`, plus `GIT_SSH_COMMAND` when an
/// override is present. Nothing is inherited implicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEnvironment {
    pub base_environment: BTreeMap<String, String>,
    pub ssh_command_override: Option<String>,
}

impl ProcessEnvironment {
    /// Snapshot the environment visible through `system`
    #[must_use]
    #[inline]
    pub fn inherit(system: &dyn System) -> Self {
        Self {
            base_environment: system.env_vars().into_iter().collect(),
            ssh_command_override: None,
        }
    }

    /// Replace the SSH command override
    #[must_use]
    #[inline]
    pub fn with_ssh_command(mut self, command: Option<String>) -> Self {
        self.ssh_command_override = command;
        self
    }

    /// The final variable set for the child process
    #[must_use]
    #[inline]
    pub fn resolved(&self) -> BTreeMap<String, String> {
        let mut vars = self.base_environment.clone();
        if let Some(command) = self.ssh_command_override.as_ref() {
            vars.insert(GIT_SSH_COMMAND.to_owned(), command.clone());
        }
        vars
    }
}

/// Description of a child process to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub environment: ProcessEnvironment,
    /// Bytes written to the child's stdin, which is closed afterwards
    pub stdin: Option<Vec<u8>>,
}

impl ProcessSpec {
    /// Create a spec with an empty environment and no stdin
    #[must_use]
    #[inline]
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            environment: ProcessEnvironment::default(),
            stdin: None,
        }
    }

    #[must_use]
    #[inline]
    pub fn with_environment(mut self, environment: ProcessEnvironment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    #[inline]
    pub fn with_stdin(mut self, input: Vec<u8>) -> Self {
        self.stdin = Some(input);
        self
    }

    /// Program and arguments joined with spaces, for diagnostics
    #[must_use]
    #[inline]
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Exit status of a finished child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl ProcessExit {
    #[must_use]
    #[inline]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    #[must_use]
    #[inline]
    pub fn describe(&self) -> String {
        self.code
            .map_or_else(|| "terminated by signal".to_owned(), |code| format!("exit code {code}"))
    }
}

/// Unified trait for system operations (environment + filesystem + processes)
///
/// This trait abstracts all interactions with the operating system.
///
/// # Implementations
/// - `RealSystem`: Production implementation using `std::env`, `std::fs` and `std::process`
/// - `MockSystem`: Test implementation using in-memory storage and scripted processes
pub trait System: Send + Sync {
    // ==================== Environment Operations ====================

    /// Get an environment variable
    fn env_var(&self, key: &str) -> Result<String, VarError>;

    /// Snapshot of every environment variable
    fn env_vars(&self) -> Vec<(String, String)>;

    // ==================== Filesystem Operations ====================

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path points to a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Read entire file contents as a string
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write bytes to a file, creating it if it doesn't exist
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Recursively create a directory and all parent directories
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory and all its contents
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Read directory entries, returning paths of all entries
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Open a file for appending, creating it if missing
    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send + '_>>;

    // ==================== Process Operations ====================

    /// Run a child process to completion
    ///
    /// Output chunks are handed to `on_output` as they are produced. The call
    /// returns once the process has exited; a non-zero exit is not an error at
    /// this level, only a failure to spawn or wait is.
    fn run_process(
        &self,
        spec: &ProcessSpec,
        on_output: &mut dyn FnMut(OutputStream, &[u8]),
    ) -> io::Result<ProcessExit>;
}

/// Append bytes to a file through the system abstraction
///
/// # Errors
///
/// Returns an error if the file cannot be opened or written
#[inline]
pub fn append(system: &dyn System, path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut writer = system.open_append(path)?;
    writer.write_all(contents)?;
    writer.flush()
}
