//! User-supplied repository references and where a clone runs

use crate::error::ProvisionError;
use crate::system::ServerHandle;

/// Which tree an application's source lands in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BaseTree {
    /// Single-container applications
    #[default]
    Application,
    /// Compose stacks
    Compose,
}

/// Where the clone is performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// On this machine, with streamed progress
    Local,
    /// On a managed host, through a generated script
    Remote(ServerHandle),
}

/// A repository location plus branch and optional SSH credential
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryReference {
    pub app_name: String,
    pub url: Option<String>,
    pub branch: Option<String>,
    pub ssh_key_id: Option<String>,
}

impl RepositoryReference {
    #[must_use]
    #[inline]
    pub fn new<S: Into<String>>(app_name: S) -> Self {
        Self {
            app_name: app_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    #[inline]
    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    #[inline]
    pub fn with_branch<S: Into<String>>(mut self, branch: S) -> Self {
        self.branch = Some(branch.into());
        self
    }

    #[must_use]
    #[inline]
    pub fn with_ssh_key<S: Into<String>>(mut self, ssh_key_id: S) -> Self {
        self.ssh_key_id = Some(ssh_key_id.into());
        self
    }

    /// The credential id, ignoring blank values
    #[must_use]
    #[inline]
    pub fn credential_id(&self) -> Option<&str> {
        non_blank(self.ssh_key_id.as_deref())
    }

    /// URL and branch, both required for a clone
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if either is missing or blank
    #[inline]
    pub fn require_source(&self) -> Result<(&str, &str), ProvisionError> {
        match (non_blank(self.url.as_deref()), non_blank(self.branch.as_deref())) {
            (Some(url), Some(branch)) => Ok((url, branch)),
            (None, _) => Err(ProvisionError::validation(format!(
                "Repository URL is required to clone '{}'",
                self.app_name
            ))),
            (Some(_), None) => Err(ProvisionError::validation(format!(
                "Branch is required to clone '{}'",
                self.app_name
            ))),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
