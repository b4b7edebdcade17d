//! Clone on a managed host through a generated shell script
//!
//! The script is rendered from the same step list the local executor runs,
//! so both targets reset, announce, clone and report in the same order.

use crate::config::validation::validate_app_name;
use crate::config::{CredentialTouchPolicy, Paths, ShellQuoting};
use crate::error::ProvisionError;
use crate::git::{
    BaseTree, CloneCommand, ClonePlan, CloneStep, KnownHostsRegistrar, RepositoryReference,
};
use crate::operations::clone_local::GIT_PROGRAM;
use crate::operations::shell::{quote, word};
use crate::operations::{markers, touch_credential};
use crate::system::{CredentialStore, GIT_SSH_COMMAND, RemoteExecutor, ServerHandle};
use std::path::Path;
use tracing::{debug, info, warn};

/// Failure detail written by the script when `git clone` exits non-zero
pub const REMOTE_CLONE_FAILURE: &str = "git clone exited with a non-zero status";

/// Render the clone procedure of `plan` as POSIX shell text
///
/// The script exits 1 right after writing the failure marker when the clone
/// fails, and writes the success marker otherwise.
#[must_use]
#[inline]
pub fn build_remote_clone_script(plan: &ClonePlan, quoting: ShellQuoting) -> String {
    let log = word(&plan.log_path.display().to_string(), quoting);
    let mut script = String::new();

    if let Some(log_dir) = plan.log_path.parent() {
        push_line(&mut script, &mkdir(log_dir, quoting));
    }

    for step in plan.steps() {
        match step {
            CloneStep::HostKeyScan(location) => {
                if let Some(ssh_dir) = plan.known_hosts_path.parent() {
                    push_line(&mut script, &mkdir(ssh_dir, quoting));
                }
                let registrar = KnownHostsRegistrar::new(plan.known_hosts_path.clone());
                push_line(
                    &mut script,
                    &registrar.register_command_text(&location, quoting),
                );
            }
            CloneStep::DirReset(destination) => {
                let destination = word(&destination.display().to_string(), quoting);
                push_line(&mut script, &format!("rm -rf {destination};"));
                push_line(&mut script, &format!("mkdir -p {destination};"));
            }
            CloneStep::LogAnnounce(line) => push_line(&mut script, &log_marker(&line, &log)),
            CloneStep::CloneCommand(command) => {
                render_clone(&mut script, plan, &command, &log, quoting);
            }
        }
    }

    script
}

fn render_clone(
    script: &mut String,
    plan: &ClonePlan,
    command: &CloneCommand,
    log: &str,
    quoting: ShellQuoting,
) {
    if let Some(ssh_command) = command.ssh_command.as_deref() {
        let value = match quoting {
            ShellQuoting::Literal => format!("\"{ssh_command}\""),
            ShellQuoting::Hardened => quote(ssh_command),
        };
        push_line(script, &format!("export {GIT_SSH_COMMAND}={value};"));
    }

    let mut clone_line = GIT_PROGRAM.to_owned();
    for arg in &command.args {
        clone_line.push(' ');
        clone_line.push_str(&word(arg, quoting));
    }

    push_line(script, &format!("if ! {clone_line} >> {log} 2>&1; then"));
    push_line(
        script,
        &format!("  {}", log_marker(&markers::failure(REMOTE_CLONE_FAILURE), log)),
    );
    push_line(script, "  exit 1;");
    push_line(script, "fi");
    push_line(
        script,
        &log_marker(&markers::success(&plan.url, &plan.destination_path), log),
    );
}

/// Script that records an input error in the remote log and fails
#[must_use]
#[inline]
pub fn build_error_script(log_path: &Path, error: &ProvisionError, quoting: ShellQuoting) -> String {
    let log = word(&log_path.display().to_string(), quoting);
    let mut script = String::new();

    if let Some(log_dir) = log_path.parent() {
        push_line(&mut script, &mkdir(log_dir, quoting));
    }
    push_line(
        &mut script,
        &log_marker(&markers::failure(&error.to_string()), &log),
    );
    push_line(&mut script, "exit 1;");

    script
}

fn mkdir(dir: &Path, quoting: ShellQuoting) -> String {
    format!("mkdir -p {};", word(&dir.display().to_string(), quoting))
}

/// Append a marker line, bracketed by blank lines, to `log`
fn log_marker(line: &str, log: &str) -> String {
    format!("printf '\\n%s\\n\\n' {} >> {log};", quote(line))
}

fn push_line(script: &mut String, line: &str) {
    script.push_str(line);
    script.push('\n');
}

/// Drives clones on managed hosts through a `RemoteExecutor`
#[non_exhaustive]
pub struct RemoteCloner<'src> {
    executor: &'src dyn RemoteExecutor,
    credentials: &'src dyn CredentialStore,
    paths: Paths,
    credential_touch: CredentialTouchPolicy,
    quoting: ShellQuoting,
}

impl<'src> RemoteCloner<'src> {
    /// `paths` are the base trees as seen on the managed hosts
    #[must_use]
    #[inline]
    pub const fn new(
        executor: &'src dyn RemoteExecutor,
        credentials: &'src dyn CredentialStore,
        paths: Paths,
    ) -> Self {
        Self {
            executor,
            credentials,
            paths,
            credential_touch: CredentialTouchPolicy::Propagate,
            quoting: ShellQuoting::Literal,
        }
    }

    #[must_use]
    #[inline]
    pub fn with_credential_touch(mut self, policy: CredentialTouchPolicy) -> Self {
        self.credential_touch = policy;
        self
    }

    #[must_use]
    #[inline]
    pub fn with_shell_quoting(mut self, quoting: ShellQuoting) -> Self {
        self.quoting = quoting;
        self
    }

    /// Render the script without contacting the host
    ///
    /// # Errors
    ///
    /// Returns a `Validation` or `Parse` error for a bad reference
    #[inline]
    pub fn render_script(
        &self,
        reference: &RepositoryReference,
        tree: BaseTree,
    ) -> Result<String, ProvisionError> {
        let plan = ClonePlan::resolve(reference, tree, &self.paths)?;
        Ok(build_remote_clone_script(&plan, self.quoting))
    }

    /// Render the script for `server`
    ///
    /// Input errors are also written to the host's deployment log, since that
    /// log is where deployments are followed.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` or `Parse` error for a bad reference
    #[inline]
    pub fn prepare_script(
        &self,
        reference: &RepositoryReference,
        tree: BaseTree,
        server: &ServerHandle,
    ) -> Result<String, ProvisionError> {
        let plan = self.resolve_reporting(reference, tree, server)?;
        Ok(build_remote_clone_script(&plan, self.quoting))
    }

    /// Clone `reference` on `server`
    ///
    /// The credential usage is recorded here, before the script is built.
    ///
    /// # Errors
    ///
    /// Returns input errors, a `Credential` error under the propagate policy,
    /// or a `RemoteExecution` error when the script fails on the host
    #[inline]
    pub fn clone_remote(
        &self,
        reference: &RepositoryReference,
        tree: BaseTree,
        server: &ServerHandle,
    ) -> Result<(), ProvisionError> {
        let plan = self.resolve_reporting(reference, tree, server)?;
        if let Some(id) = plan.credential_id.as_deref() {
            touch_credential(self.credentials, self.credential_touch, id)?;
        }

        let script = build_remote_clone_script(&plan, self.quoting);
        info!(
            "Cloning {} on {} into {}",
            plan.url,
            server.id,
            plan.destination_path.display()
        );
        debug!("Remote script:\n{script}");
        self.executor.run_on_remote_host(server, &script)
    }

    fn resolve_reporting(
        &self,
        reference: &RepositoryReference,
        tree: BaseTree,
        server: &ServerHandle,
    ) -> Result<ClonePlan, ProvisionError> {
        match ClonePlan::resolve(reference, tree, &self.paths) {
            Ok(plan) => Ok(plan),
            Err(e) if e.is_input_error() => {
                self.report_input_error(reference, server, &e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn report_input_error(
        &self,
        reference: &RepositoryReference,
        server: &ServerHandle,
        error: &ProvisionError,
    ) {
        // An unusable app name cannot pick a log directory
        let log_path = if validate_app_name(&reference.app_name).is_ok() {
            self.paths.clone_log(&reference.app_name)
        } else {
            self.paths.logs.join("clone.log")
        };

        let script = build_error_script(&log_path, error, self.quoting);
        if let Err(report_error) = self.executor.run_on_remote_host(server, &script) {
            warn!("Failed to report error to {}: {report_error}", server.id);
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "This is a test module")]
mod tests {
    use super::*;
    use crate::system::{MemoryCredentialStore, RecordingRemoteExecutor};

    fn paths() -> Paths {
        Paths::under(Path::new("/etc/gitprovision"))
    }

    fn server() -> ServerHandle {
        ServerHandle {
            id: "edge".to_owned(),
            host: "edge.internal".to_owned(),
            port: 22,
            user: "root".to_owned(),
            identity_file: None,
        }
    }

    fn plan(reference: &RepositoryReference) -> ClonePlan {
        ClonePlan::resolve(reference, BaseTree::Application, &paths()).unwrap()
    }

    #[test]
    fn test_ssh_script_with_credential() {
        let reference = RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("main")
            .with_ssh_key("deploy");
        let script = build_remote_clone_script(&plan(&reference), ShellQuoting::Literal);

        let expected = "\
mkdir -p /etc/gitprovision/logs/shop;
mkdir -p /etc/gitprovision/ssh;
ssh-keyscan -p 22 github.com >> /etc/gitprovision/ssh/known_hosts;
rm -rf /etc/gitprovision/applications/shop/code;
mkdir -p /etc/gitprovision/applications/shop/code;
printf '\\n%s\\n\\n' 'Cloning Repo git@github.com:acme/shop.git to /etc/gitprovision/applications/shop/code: \u{2705}' >> /etc/gitprovision/logs/shop/clone.log;
export GIT_SSH_COMMAND=\"ssh -i /etc/gitprovision/ssh/deploy_rsa -o UserKnownHostsFile=/etc/gitprovision/ssh/known_hosts\";
if ! git clone --branch main --depth 1 --recurse-submodules git@github.com:acme/shop.git /etc/gitprovision/applications/shop/code --progress >> /etc/gitprovision/logs/shop/clone.log 2>&1; then
  printf '\\n%s\\n\\n' 'ERROR Cloning Repo: git clone exited with a non-zero status: \u{274c}' >> /etc/gitprovision/logs/shop/clone.log;
  exit 1;
fi
printf '\\n%s\\n\\n' 'Cloned Repo git@github.com:acme/shop.git to /etc/gitprovision/applications/shop/code: \u{2705}' >> /etc/gitprovision/logs/shop/clone.log;
";
        assert_eq!(script, expected);
    }

    #[test]
    fn test_http_script_has_no_scan_or_override() {
        let reference = RepositoryReference::new("site")
            .with_url("https://github.com/acme/site.git")
            .with_branch("main")
            .with_ssh_key("deploy");
        let script = build_remote_clone_script(&plan(&reference), ShellQuoting::Literal);

        assert!(!script.contains("ssh-keyscan"));
        assert!(!script.contains(GIT_SSH_COMMAND));
        assert!(script.contains("if ! git clone"));
    }

    #[test]
    fn test_hardened_quoting() {
        let reference = RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("feature/$(touch pwned)")
            .with_ssh_key("deploy");
        let literal = build_remote_clone_script(&plan(&reference), ShellQuoting::Literal);
        let hardened = build_remote_clone_script(&plan(&reference), ShellQuoting::Hardened);

        assert!(literal.contains("--branch feature/$(touch pwned) "));
        assert!(hardened.contains("--branch 'feature/$(touch pwned)' "));
        assert!(hardened.contains(
            "export GIT_SSH_COMMAND='ssh -i /etc/gitprovision/ssh/deploy_rsa -o UserKnownHostsFile=/etc/gitprovision/ssh/known_hosts';"
        ));
    }

    #[test]
    fn test_clone_remote_touches_then_executes() {
        let executor = RecordingRemoteExecutor::new();
        let store = MemoryCredentialStore::new();
        let reference = RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("main")
            .with_ssh_key("deploy");

        RemoteCloner::new(&executor, &store, paths())
            .clone_remote(&reference, BaseTree::Application, &server())
            .unwrap();

        assert_eq!(store.touched_ids(), vec!["deploy"]);
        let scripts = executor.scripts();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].0, "edge");
        assert!(scripts[0].1.contains("if ! git clone"));
    }

    #[test]
    fn test_missing_url_is_reported_remotely() {
        let executor = RecordingRemoteExecutor::new();
        let store = MemoryCredentialStore::new();
        let reference = RepositoryReference::new("shop").with_branch("main").with_ssh_key("deploy");

        let err = RemoteCloner::new(&executor, &store, paths())
            .clone_remote(&reference, BaseTree::Application, &server())
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Validation { .. }));
        assert!(store.touched_ids().is_empty());
        let scripts = executor.scripts();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].1.contains(">> /etc/gitprovision/logs/shop/clone.log;"));
        assert!(scripts[0].1.contains("Repository URL is required"));
        assert!(scripts[0].1.ends_with("exit 1;\n"));
    }

    #[test]
    fn test_invalid_app_name_reports_to_shared_log() {
        let executor = RecordingRemoteExecutor::failing("connection refused");
        let store = MemoryCredentialStore::new();
        let reference = RepositoryReference::new("../etc")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("main");

        let err = RemoteCloner::new(&executor, &store, paths())
            .prepare_script(&reference, BaseTree::Application, &server())
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Validation { .. }));
        assert!(executor.scripts()[0].1.contains(">> /etc/gitprovision/logs/clone.log;"));
    }

    #[test]
    fn test_render_script_does_not_contact_host() {
        let executor = RecordingRemoteExecutor::new();
        let store = MemoryCredentialStore::new();
        let cloner = RemoteCloner::new(&executor, &store, paths());
        let reference = RepositoryReference::new("shop").with_url("git@github.com:acme/shop.git");

        assert!(cloner.render_script(&reference, BaseTree::Application).is_err());
        assert!(executor.scripts().is_empty());
    }
}
