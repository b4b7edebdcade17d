//! Clone on this machine

use crate::config::{CredentialTouchPolicy, Paths};
use crate::error::ProvisionError;
use crate::git::{
    BaseTree, CloneCommand, ClonePlan, CloneStep, KnownHostsRegistrar, RepositoryReference,
};
use crate::operations::log_sink::LogSink;
use crate::operations::{markers, touch_credential};
use crate::system::{CredentialStore, ProcessEnvironment, ProcessSpec, System};
use crate::utils::fs::recreate_directory;
use std::path::PathBuf;
use tracing::{debug, info};

/// Program that performs the clone
pub const GIT_PROGRAM: &str = "git";

/// Runs the clone procedure locally with output streamed to a deployment log
#[non_exhaustive]
pub struct LocalCloner<'src> {
    system: &'src dyn System,
    credentials: &'src dyn CredentialStore,
    paths: Paths,
    credential_touch: CredentialTouchPolicy,
    log_path: Option<PathBuf>,
    progress: Option<&'src dyn Fn(&[u8])>,
}

impl<'src> LocalCloner<'src> {
    #[must_use]
    #[inline]
    pub const fn new(
        system: &'src dyn System,
        credentials: &'src dyn CredentialStore,
        paths: Paths,
    ) -> Self {
        Self {
            system,
            credentials,
            paths,
            credential_touch: CredentialTouchPolicy::Propagate,
            log_path: None,
            progress: None,
        }
    }

    #[must_use]
    #[inline]
    pub fn with_credential_touch(mut self, policy: CredentialTouchPolicy) -> Self {
        self.credential_touch = policy;
        self
    }

    /// Write the deployment log to `log_path` instead of `<logs>/<app>/clone.log`
    #[must_use]
    #[inline]
    pub fn with_log_path(mut self, log_path: Option<PathBuf>) -> Self {
        self.log_path = log_path;
        self
    }

    /// Also hand every output chunk of the clone to `progress`
    #[must_use]
    #[inline]
    pub fn with_progress(mut self, progress: &'src dyn Fn(&[u8])) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Resolve the plan this cloner would execute
    ///
    /// # Errors
    ///
    /// Returns a `Validation` or `Parse` error for a bad reference
    #[inline]
    pub fn plan(
        &self,
        reference: &RepositoryReference,
        tree: BaseTree,
    ) -> Result<ClonePlan, ProvisionError> {
        let plan = ClonePlan::resolve(reference, tree, &self.paths)?;
        Ok(match self.log_path.clone() {
            Some(log_path) => plan.with_log_path(log_path),
            None => plan,
        })
    }

    /// Clone `reference` into its application directory
    ///
    /// Input errors are raised before anything is touched. Once the log is
    /// open, every outcome ends with a marker line and the log is closed.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error
    #[inline]
    pub fn clone_local(
        &self,
        reference: &RepositoryReference,
        tree: BaseTree,
    ) -> Result<(), ProvisionError> {
        let plan = self.plan(reference, tree)?;
        self.execute(&plan)
    }

    /// Execute an already resolved plan
    ///
    /// # Errors
    ///
    /// Returns a `LogSink` error if the log cannot be opened, otherwise the
    /// first failing step's error
    #[inline]
    pub fn execute(&self, plan: &ClonePlan) -> Result<(), ProvisionError> {
        let mut sink = LogSink::open(self.system, &plan.log_path)?;

        let result = self.run_steps(plan, &mut sink);
        match result.as_ref() {
            Ok(()) => {
                info!("Cloned {} into {}", plan.url, plan.destination_path.display());
                sink.write_marker(&markers::success(&plan.url, &plan.destination_path));
            }
            Err(e) => sink.write_marker(&markers::failure(&e.to_string())),
        }
        sink.close();

        result
    }

    fn run_steps(&self, plan: &ClonePlan, sink: &mut LogSink<'_>) -> Result<(), ProvisionError> {
        let base_environment = ProcessEnvironment::inherit(self.system);

        for step in plan.steps() {
            match step {
                CloneStep::HostKeyScan(location) => {
                    info!("Registering host key of {}:{}", location.domain, location.port);
                    KnownHostsRegistrar::new(plan.known_hosts_path.clone()).register_now(
                        self.system,
                        &base_environment,
                        &location,
                    )?;
                }
                CloneStep::DirReset(destination) => {
                    debug!("Resetting {}", destination.display());
                    recreate_directory(self.system, &destination)?;
                }
                CloneStep::LogAnnounce(line) => sink.write_marker(&line),
                CloneStep::CloneCommand(command) => {
                    if let Some(id) = plan.credential_id.as_deref() {
                        touch_credential(self.credentials, self.credential_touch, id)?;
                    }
                    self.run_clone(&command, &base_environment, sink)?;
                }
            }
        }

        Ok(())
    }

    fn run_clone(
        &self,
        command: &CloneCommand,
        base_environment: &ProcessEnvironment,
        sink: &mut LogSink<'_>,
    ) -> Result<(), ProvisionError> {
        let spec = ProcessSpec::new(GIT_PROGRAM, command.args.clone()).with_environment(
            base_environment
                .clone()
                .with_ssh_command(command.ssh_command.clone()),
        );
        info!("Running {}", spec.command_line());

        let exit = self
            .system
            .run_process(&spec, &mut |_, chunk| {
                sink.write_chunk(chunk);
                if let Some(progress) = self.progress {
                    progress(chunk);
                }
            })
            .map_err(|e| ProvisionError::clone_process(format!("Failed to run git: {e}")))?;

        if exit.success() {
            Ok(())
        } else {
            Err(ProvisionError::clone_process(format!(
                "git clone failed with {}",
                exit.describe()
            )))
        }
    }
}
