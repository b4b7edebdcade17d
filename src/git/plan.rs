//! Clone planning
//!
//! A [`ClonePlan`] is resolved fresh for every clone attempt. Its ordered
//! [`CloneStep`] list is the single description of the procedure; the local
//! executor runs the steps and the remote renderer turns them into shell text.

use crate::config::Paths;
use crate::config::validation::{validate_app_name, validate_credential_id};
use crate::error::ProvisionError;
use crate::git::location::{SshLocation, is_http_transport};
use crate::git::reference::{BaseTree, RepositoryReference};
use crate::operations::markers;
use std::path::PathBuf;

/// Fully resolved parameters of one clone attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonePlan {
    pub app_name: String,
    pub url: String,
    pub branch: String,
    pub destination_path: PathBuf,
    pub ssh_key_file_path: Option<PathBuf>,
    pub known_hosts_path: PathBuf,
    pub log_path: PathBuf,
    pub is_ssh_transport: bool,
    /// Parsed location, present for SSH transport only
    pub location: Option<SshLocation>,
    pub credential_id: Option<String>,
}

/// One step of the clone procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneStep {
    /// Record the remote host key in the known-hosts file
    HostKeyScan(SshLocation),
    /// Leave the destination existing and empty
    DirReset(PathBuf),
    /// Announce the clone in the deployment log
    LogAnnounce(String),
    /// Run `git clone`
    CloneCommand(CloneCommand),
}

/// The `git clone` invocation of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneCommand {
    /// Arguments after `git`
    pub args: Vec<String>,
    /// Value for `GIT_SSH_COMMAND`, when a credential is used over SSH
    pub ssh_command: Option<String>,
}

impl ClonePlan {
    /// Resolve a reference against the base trees
    ///
    /// Nothing touches the filesystem here; a reference that fails validation
    /// or parsing never produces a plan.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for a bad app name, credential id, or a
    /// missing URL/branch, and a `Parse` error for an unparseable SSH location
    #[inline]
    pub fn resolve(
        reference: &RepositoryReference,
        tree: BaseTree,
        paths: &Paths,
    ) -> Result<Self, ProvisionError> {
        validate_app_name(&reference.app_name)?;
        let (url, branch) = reference.require_source()?;
        let credential_id = reference.credential_id();
        if let Some(id) = credential_id {
            validate_credential_id(id)?;
        }

        let is_ssh_transport = !is_http_transport(url);
        let location = if is_ssh_transport {
            Some(SshLocation::parse(url)?)
        } else {
            None
        };

        Ok(Self {
            app_name: reference.app_name.clone(),
            url: url.to_owned(),
            branch: branch.to_owned(),
            destination_path: paths
                .base_for(tree)
                .join(&reference.app_name)
                .join("code"),
            ssh_key_file_path: credential_id.map(|id| paths.ssh_key(id)),
            known_hosts_path: paths.known_hosts(),
            log_path: paths.clone_log(&reference.app_name),
            is_ssh_transport,
            location,
            credential_id: credential_id.map(str::to_owned),
        })
    }

    /// Send the deployment log somewhere else
    #[must_use]
    #[inline]
    pub fn with_log_path(mut self, log_path: PathBuf) -> Self {
        self.log_path = log_path;
        self
    }

    /// `GIT_SSH_COMMAND` value for credential-bearing SSH clones
    #[must_use]
    #[inline]
    pub fn ssh_command(&self) -> Option<String> {
        if !self.is_ssh_transport {
            return None;
        }
        self.ssh_key_file_path.as_ref().map(|key| {
            format!(
                "ssh -i {} -o UserKnownHostsFile={}",
                key.display(),
                self.known_hosts_path.display()
            )
        })
    }

    /// Arguments after `git`: shallow, exact branch, submodules, progress
    #[must_use]
    #[inline]
    pub fn clone_args(&self) -> Vec<String> {
        vec![
            "clone".to_owned(),
            "--branch".to_owned(),
            self.branch.clone(),
            "--depth".to_owned(),
            "1".to_owned(),
            "--recurse-submodules".to_owned(),
            self.url.clone(),
            self.destination_path.display().to_string(),
            "--progress".to_owned(),
        ]
    }

    /// The ordered procedure shared by both execution targets
    #[must_use]
    #[inline]
    pub fn steps(&self) -> Vec<CloneStep> {
        let mut steps = Vec::with_capacity(4);

        if let Some(location) = self.location.as_ref() {
            steps.push(CloneStep::HostKeyScan(location.clone()));
        }
        steps.push(CloneStep::DirReset(self.destination_path.clone()));
        steps.push(CloneStep::LogAnnounce(markers::announce(
            &self.url,
            &self.destination_path,
        )));
        steps.push(CloneStep::CloneCommand(CloneCommand {
            args: self.clone_args(),
            ssh_command: self.ssh_command(),
        }));

        steps
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "This is a test module")]
mod tests {
    use super::*;
    use std::path::Path;

    fn paths() -> Paths {
        Paths::under(Path::new("/srv/gp"))
    }

    #[test]
    fn test_resolve_ssh_with_credential() {
        let reference = RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("main")
            .with_ssh_key("k1");
        let plan = ClonePlan::resolve(&reference, BaseTree::Application, &paths()).unwrap();

        assert!(plan.is_ssh_transport);
        assert_eq!(
            plan.destination_path,
            PathBuf::from("/srv/gp/applications/shop/code")
        );
        assert_eq!(
            plan.ssh_command().as_deref(),
            Some("ssh -i /srv/gp/ssh/k1_rsa -o UserKnownHostsFile=/srv/gp/ssh/known_hosts")
        );
        assert_eq!(plan.location.unwrap().domain, "github.com");
    }

    #[test]
    fn test_resolve_compose_tree() {
        let reference = RepositoryReference::new("stack")
            .with_url("https://github.com/acme/stack.git")
            .with_branch("dev");
        let plan = ClonePlan::resolve(&reference, BaseTree::Compose, &paths()).unwrap();
        assert_eq!(
            plan.destination_path,
            PathBuf::from("/srv/gp/compose/stack/code")
        );
    }

    #[test]
    fn test_http_plan_has_no_host_key_step() {
        let reference = RepositoryReference::new("shop")
            .with_url("https://github.com/owner/repo.git")
            .with_branch("main")
            .with_ssh_key("k1");
        let plan = ClonePlan::resolve(&reference, BaseTree::Application, &paths()).unwrap();

        assert!(!plan.is_ssh_transport);
        assert!(plan.ssh_command().is_none());
        assert!(
            !plan
                .steps()
                .iter()
                .any(|step| matches!(step, CloneStep::HostKeyScan(_)))
        );
    }

    #[test]
    fn test_step_order() {
        let reference = RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("main");
        let plan = ClonePlan::resolve(&reference, BaseTree::Application, &paths()).unwrap();
        let steps = plan.steps();

        assert_eq!(steps.len(), 4);
        assert!(matches!(steps[0], CloneStep::HostKeyScan(_)));
        assert!(matches!(steps[1], CloneStep::DirReset(_)));
        assert!(matches!(steps[2], CloneStep::LogAnnounce(_)));
        assert!(matches!(
            &steps[3],
            CloneStep::CloneCommand(CloneCommand { ssh_command: None, .. })
        ));
    }

    #[test]
    fn test_clone_args() {
        let reference = RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("release/1.2");
        let plan = ClonePlan::resolve(&reference, BaseTree::Application, &paths()).unwrap();
        assert_eq!(
            plan.clone_args(),
            vec![
                "clone",
                "--branch",
                "release/1.2",
                "--depth",
                "1",
                "--recurse-submodules",
                "git@github.com:acme/shop.git",
                "/srv/gp/applications/shop/code",
                "--progress",
            ]
        );
    }

    #[test]
    fn test_validation_precedes_parsing() {
        let reference = RepositoryReference::new("shop").with_url("not a url??");
        let err = ClonePlan::resolve(&reference, BaseTree::Application, &paths()).unwrap_err();
        assert!(matches!(err, ProvisionError::Validation { .. }));

        let reference = reference.with_branch("main");
        let err = ClonePlan::resolve(&reference, BaseTree::Application, &paths()).unwrap_err();
        assert!(matches!(err, ProvisionError::Parse { .. }));
    }

    #[test]
    fn test_invalid_credential_id() {
        let reference = RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("main")
            .with_ssh_key("../../etc/passwd");
        let err = ClonePlan::resolve(&reference, BaseTree::Application, &paths()).unwrap_err();
        assert!(matches!(err, ProvisionError::Validation { .. }));
    }
}
