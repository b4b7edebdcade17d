//! Configuration management module
//!
//! Handles YAML configuration parsing, JSON schema validation and resolution
//! of the base directory trees on the local machine and on managed hosts.

pub mod schema;
pub mod validation;
pub mod yaml;

use crate::error::ProvisionError;
use crate::git::BaseTree;
use crate::system::{ServerHandle, System};
use crate::utils::path::expand_home;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "./gitprovision.yaml";

/// Root of the base trees on managed hosts
pub const REMOTE_ROOT: &str = "/etc/gitprovision";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Base trees on this machine
    #[serde(default)]
    pub paths: PathsConfig,

    /// Base trees on managed hosts
    #[serde(default)]
    pub remote_paths: PathsConfig,

    /// Managed hosts reachable over SSH
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerConfig>,

    /// JSON file used for SSH key "last used" bookkeeping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_store: Option<String>,

    #[serde(default)]
    pub credential_touch: CredentialTouchPolicy,

    #[serde(default)]
    pub shell_quoting: ShellQuoting,
}

/// Optional overrides for one set of base trees
///
/// Each tree defaults to `<root>/<name>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

/// A managed host entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub id: String,
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_server_user")]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

/// What a failed credential "last used" update does to the clone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialTouchPolicy {
    /// The failure aborts the clone like any other step failure
    #[default]
    Propagate,
    /// The failure is logged and the clone goes on
    BestEffort,
}

/// How values are interpolated into generated shell scripts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellQuoting {
    /// Values are embedded verbatim
    #[default]
    Literal,
    /// Values with shell metacharacters are single-quoted
    Hardened,
}

/// Resolved base trees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub applications: PathBuf,
    pub compose: PathBuf,
    pub ssh: PathBuf,
    pub logs: PathBuf,
}

impl Paths {
    /// All trees directly under `root`
    #[must_use]
    #[inline]
    pub fn under(root: &Path) -> Self {
        Self {
            applications: root.join("applications"),
            compose: root.join("compose"),
            ssh: root.join("ssh"),
            logs: root.join("logs"),
        }
    }

    /// Directory holding the per-application trees of `tree`
    #[must_use]
    #[inline]
    pub fn base_for(&self, tree: BaseTree) -> &Path {
        match tree {
            BaseTree::Application => &self.applications,
            BaseTree::Compose => &self.compose,
        }
    }

    /// Known-hosts file shared by every clone
    #[must_use]
    #[inline]
    pub fn known_hosts(&self) -> PathBuf {
        self.ssh.join("known_hosts")
    }

    /// Private key file of an SSH credential
    #[must_use]
    #[inline]
    pub fn ssh_key(&self, credential_id: &str) -> PathBuf {
        self.ssh.join(format!("{credential_id}_rsa"))
    }

    /// Default deployment log of an application's clone
    #[must_use]
    #[inline]
    pub fn clone_log(&self, app_name: &str) -> PathBuf {
        self.logs.join(app_name).join("clone.log")
    }
}

impl PathsConfig {
    /// Resolve against `default_root`, expanding `~` when `system` is given
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `~` cannot be expanded
    #[inline]
    pub fn resolve(
        &self,
        system: Option<&dyn System>,
        default_root: &Path,
    ) -> Result<Paths, ProvisionError> {
        let expand = |raw: &str| -> Result<PathBuf, ProvisionError> {
            match system {
                Some(system) => expand_home(system, raw),
                None => Ok(PathBuf::from(raw)),
            }
        };

        let root = match self.root.as_deref() {
            Some(root) => expand(root)?,
            None => default_root.to_path_buf(),
        };
        let defaults = Paths::under(&root);
        let pick = |value: Option<&String>, default: PathBuf| -> Result<PathBuf, ProvisionError> {
            value.map_or(Ok(default), |raw| expand(raw.as_str()))
        };

        Ok(Paths {
            applications: pick(self.applications.as_ref(), defaults.applications)?,
            compose: pick(self.compose.as_ref(), defaults.compose)?,
            ssh: pick(self.ssh.as_ref(), defaults.ssh)?,
            logs: pick(self.logs.as_ref(), defaults.logs)?,
        })
    }
}

impl Config {
    /// Load configuration from file
    pub fn load_from_file(system: &dyn System, path: &str) -> anyhow::Result<Self> {
        yaml::load_config(system, path)
    }

    /// Base trees on this machine
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `~` cannot be expanded
    #[inline]
    pub fn local_paths(&self, system: &dyn System) -> Result<Paths, ProvisionError> {
        self.paths.resolve(Some(system), &default_local_root())
    }

    /// Base trees on managed hosts, taken literally
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible to match `local_paths`
    #[inline]
    pub fn remote_paths(&self) -> Result<Paths, ProvisionError> {
        self.remote_paths.resolve(None, Path::new(REMOTE_ROOT))
    }

    /// Location of the credential bookkeeping file
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the paths cannot be resolved
    #[inline]
    pub fn credential_store_path(&self, system: &dyn System) -> Result<PathBuf, ProvisionError> {
        match self.credential_store.as_deref() {
            Some(raw) => expand_home(system, raw),
            None => Ok(self.local_paths(system)?.ssh.join("credentials.json")),
        }
    }

    /// Look up a managed host by id
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if no server has that id
    #[inline]
    pub fn server(&self, system: &dyn System, id: &str) -> Result<ServerHandle, ProvisionError> {
        let server = self
            .servers
            .iter()
            .find(|server| server.id == id)
            .ok_or_else(|| ProvisionError::configuration(format!("Unknown server '{id}'")))?;

        Ok(ServerHandle {
            id: server.id.clone(),
            host: server.host.clone(),
            port: server.port,
            user: server.user.clone(),
            identity_file: server
                .identity_file
                .as_deref()
                .map(|raw| expand_home(system, raw))
                .transpose()?,
        })
    }
}

/// `<data dir>/gitprovision`, falling back to `/var/lib/gitprovision`
#[must_use]
#[inline]
pub fn default_local_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("gitprovision")
}

const fn default_server_port() -> u16 {
    22
}

fn default_server_user() -> String {
    "root".to_owned()
}
