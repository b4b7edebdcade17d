//! Remote clone script tests

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "This is a test module")]
mod tests {
    use gitprovision::config::{Paths, ShellQuoting};
    use gitprovision::error::ProvisionError;
    use gitprovision::git::{BaseTree, ClonePlan, RepositoryReference};
    use gitprovision::operations::clone_local::GIT_PROGRAM;
    use gitprovision::operations::{LocalCloner, RemoteCloner, build_remote_clone_script, markers};
    use gitprovision::system::{
        MemoryCredentialStore, MockSystem, RecordingRemoteExecutor, ServerHandle,
    };
    use std::path::Path;

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

    fn credential_reference() -> RepositoryReference {
        RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("main")
            .with_ssh_key("deploy")
    }

    fn script_for(reference: &RepositoryReference) -> String {
        let plan = ClonePlan::resolve(reference, BaseTree::Application, &paths()).unwrap();
        build_remote_clone_script(&plan, ShellQuoting::Literal)
    }

    #[test]
    fn single_ssh_command_line_right_before_clone() {
        let script = script_for(&credential_reference());
        let lines: Vec<&str> = script.lines().collect();

        let assignments: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains("GIT_SSH_COMMAND="))
            .map(|(index, _)| index)
            .collect();
        assert_eq!(assignments.len(), 1);

        let clone_index = lines
            .iter()
            .position(|line| line.starts_with("if ! git clone "))
            .unwrap();
        assert_eq!(assignments[0] + 1, clone_index);
    }

    #[test]
    fn failed_clone_writes_marker_and_exits() {
        let script = script_for(&credential_reference());
        let lines: Vec<&str> = script.lines().collect();
        let clone_index = lines
            .iter()
            .position(|line| line.starts_with("if ! git clone "))
            .unwrap();

        assert!(lines[clone_index].ends_with(">> /etc/gitprovision/logs/shop/clone.log 2>&1; then"));
        assert!(lines[clone_index + 1].contains(markers::FAILURE_SYMBOL));
        assert_eq!(lines[clone_index + 2].trim(), "exit 1;");
        assert_eq!(lines[clone_index + 3], "fi");
        assert!(lines[clone_index + 4].contains("Cloned Repo git@github.com:acme/shop.git"));
        assert_eq!(lines.len(), clone_index + 5);
    }

    #[test]
    fn steps_follow_local_order() {
        let script = script_for(&credential_reference());
        let position = |needle: &str| script.find(needle).unwrap();

        assert!(position("ssh-keyscan") < position("rm -rf "));
        assert!(position("rm -rf ") < position("mkdir -p /etc/gitprovision/applications/shop/code;"));
        assert!(position("Cloning Repo") < position("GIT_SSH_COMMAND="));
    }

    #[test]
    fn script_and_local_clone_use_same_arguments() {
        let reference = credential_reference();

        let system = MockSystem::new();
        let store = MemoryCredentialStore::new();
        LocalCloner::new(&system, &store, paths())
            .clone_local(&reference, BaseTree::Application)
            .unwrap();
        let git = system
            .invocations()
            .into_iter()
            .find(|spec| spec.program == GIT_PROGRAM)
            .unwrap();

        let script = script_for(&reference);
        assert!(script.contains(&format!("if ! {} >> ", git.command_line())));
        assert!(script.contains(&format!(
            "export GIT_SSH_COMMAND=\"{}\";",
            git.environment.ssh_command_override.unwrap()
        )));
    }

    #[test]
    fn http_script_skips_host_key_scan() {
        let script = script_for(
            &RepositoryReference::new("site")
                .with_url("https://github.com/owner/repo.git")
                .with_branch("main"),
        );
        assert!(!script.contains("ssh-keyscan"));
        assert!(!script.contains("GIT_SSH_COMMAND"));
    }

    #[test]
    fn parse_error_is_reported_locally_and_remotely() {
        let executor = RecordingRemoteExecutor::new();
        let store = MemoryCredentialStore::new();
        let reference = RepositoryReference::new("shop")
            .with_url("not a url??")
            .with_branch("main")
            .with_ssh_key("deploy");

        let err = RemoteCloner::new(&executor, &store, paths())
            .clone_remote(&reference, BaseTree::Application, &server())
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Parse { .. }));
        assert!(store.touched_ids().is_empty());

        let scripts = executor.scripts();
        assert_eq!(scripts.len(), 1);
        let (server_id, script) = &scripts[0];
        assert_eq!(server_id, "edge");
        assert!(script.contains(&markers::failure(&err.to_string())));
        assert!(script.trim_end().ends_with("exit 1;"));
    }

    #[test]
    fn remote_failure_surfaces_as_remote_execution_error() {
        let executor = RecordingRemoteExecutor::failing("script exited with exit code 1");
        let store = MemoryCredentialStore::new();

        let err = RemoteCloner::new(&executor, &store, paths())
            .clone_remote(&credential_reference(), BaseTree::Compose, &server())
            .unwrap_err();

        assert!(matches!(err, ProvisionError::RemoteExecution { .. }));
        assert_eq!(store.touched_ids(), vec!["deploy"]);
        assert!(executor.scripts()[0].1.contains("/etc/gitprovision/compose/shop/code"));
    }

    #[test]
    fn hardened_quoting_neutralizes_metacharacters() {
        let executor = RecordingRemoteExecutor::new();
        let store = MemoryCredentialStore::new();
        let reference = RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("main;reboot");

        let script = RemoteCloner::new(&executor, &store, paths())
            .with_shell_quoting(ShellQuoting::Hardened)
            .prepare_script(&reference, BaseTree::Application, &server())
            .unwrap();

        assert!(script.contains("--branch 'main;reboot' "));
        assert!(executor.scripts().is_empty());
    }
}
