//! Custom error types with exit codes

use thiserror::Error;

/// Main error type for gitprovision operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProvisionError {
    /// Validation Error - the repository reference is incomplete
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Parse Error - the repository location could not be parsed
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Configuration Error - missing or invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Host Key Scan Error - known-hosts registration failed
    #[error("Host key scan error: {message}")]
    HostKeyScan { message: String },

    /// Directory Reset Error - destination could not be emptied
    #[error("Directory reset error: {message}")]
    DirectoryReset { message: String },

    /// Clone Process Error - git clone failed to spawn or exited non-zero
    #[error("Clone error: {message}")]
    CloneProcess { message: String },

    /// Credential Error - credential bookkeeping failed
    #[error("Credential error: {message}")]
    Credential { message: String },

    /// Remote Execution Error - the managed host reported a failure
    #[error("Remote execution error: {message}")]
    RemoteExecution { message: String },

    /// Log Sink Error - the deployment log could not be opened
    #[error("Log sink error: {message}")]
    LogSink { message: String },
}

impl ProvisionError {
    /// Get the appropriate exit code for this error type
    #[must_use]
    #[inline]
    pub const fn exit_code(&self) -> i32 {
        match *self {
            Self::Validation { .. } => 1,
            Self::Parse { .. } => 2,
            Self::Configuration { .. } => 3,
            Self::HostKeyScan { .. } => 4,
            Self::DirectoryReset { .. } => 5,
            Self::CloneProcess { .. } => 6,
            Self::Credential { .. } => 7,
            Self::RemoteExecution { .. } => 8,
            Self::LogSink { .. } => 9,
        }
    }

    /// Input errors are never worth retrying; everything else may be transient
    #[must_use]
    #[inline]
    pub const fn is_input_error(&self) -> bool {
        matches!(*self, Self::Validation { .. } | Self::Parse { .. })
    }

    /// Create a validation error
    #[inline]
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a parse error
    #[inline]
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[inline]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a host key scan error
    #[inline]
    pub fn host_key_scan<S: Into<String>>(message: S) -> Self {
        Self::HostKeyScan {
            message: message.into(),
        }
    }

    /// Create a directory reset error
    #[inline]
    pub fn directory_reset<S: Into<String>>(message: S) -> Self {
        Self::DirectoryReset {
            message: message.into(),
        }
    }

    /// Create a clone process error
    #[inline]
    pub fn clone_process<S: Into<String>>(message: S) -> Self {
        Self::CloneProcess {
            message: message.into(),
        }
    }

    /// Create a credential error
    #[inline]
    pub fn credential<S: Into<String>>(message: S) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    /// Create a remote execution error
    #[inline]
    pub fn remote_execution<S: Into<String>>(message: S) -> Self {
        Self::RemoteExecution {
            message: message.into(),
        }
    }

    /// Create a log sink error
    #[inline]
    pub fn log_sink<S: Into<String>>(message: S) -> Self {
        Self::LogSink {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            ProvisionError::validation("a"),
            ProvisionError::parse("a"),
            ProvisionError::configuration("a"),
            ProvisionError::host_key_scan("a"),
            ProvisionError::directory_reset("a"),
            ProvisionError::clone_process("a"),
            ProvisionError::credential("a"),
            ProvisionError::remote_execution("a"),
            ProvisionError::log_sink("a"),
        ];
        let mut codes: Vec<i32> = errors.iter().map(ProvisionError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_input_errors() {
        assert!(ProvisionError::validation("missing branch").is_input_error());
        assert!(ProvisionError::parse("bad url").is_input_error());
        assert!(!ProvisionError::clone_process("exit 128").is_input_error());
        assert!(!ProvisionError::host_key_scan("timeout").is_input_error());
    }

    #[test]
    fn test_display_includes_kind() {
        let err = ProvisionError::clone_process("exit status 128");
        assert_eq!(err.to_string(), "Clone error: exit status 128");
    }
}
