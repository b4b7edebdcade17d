//! Local clone tests against the in-memory system

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "This is a test module")]
mod tests {
    use gitprovision::config::Paths;
    use gitprovision::error::ProvisionError;
    use gitprovision::git::known_hosts::KEYSCAN_PROGRAM;
    use gitprovision::git::{BaseTree, RepositoryReference};
    use gitprovision::operations::clone_local::GIT_PROGRAM;
    use gitprovision::operations::{LocalCloner, markers};
    use gitprovision::system::{MemoryCredentialStore, MockProcess, MockSystem, System as _};
    use std::path::Path;

    const LOG: &str = "/srv/gp/logs/shop/clone.log";
    const CODE: &str = "/srv/gp/applications/shop/code";

    fn paths() -> Paths {
        Paths::under(Path::new("/srv/gp"))
    }

    fn reference() -> RepositoryReference {
        RepositoryReference::new("shop")
            .with_url("git@github.com:acme/shop.git")
            .with_branch("main")
    }

    #[test]
    fn second_clone_replaces_first() {
        let system = MockSystem::new()
            .with_process(
                GIT_PROGRAM,
                MockProcess::success().creating(format!("{CODE}/first.txt"), b"1"),
            )
            .unwrap()
            .with_process(
                GIT_PROGRAM,
                MockProcess::success().creating(format!("{CODE}/second.txt"), b"2"),
            )
            .unwrap();
        let store = MemoryCredentialStore::new();
        let cloner = LocalCloner::new(&system, &store, paths());

        cloner.clone_local(&reference(), BaseTree::Application).unwrap();
        cloner.clone_local(&reference(), BaseTree::Application).unwrap();

        assert!(!system.exists(&Path::new(CODE).join("first.txt")));
        assert!(system.exists(&Path::new(CODE).join("second.txt")));
        assert_eq!(system.read_dir(Path::new(CODE)).unwrap().len(), 1);

        let success = markers::success("git@github.com:acme/shop.git", Path::new(CODE));
        assert_eq!(system.file_contents(LOG).matches(&success).count(), 2);
    }

    #[test]
    fn known_hosts_grows_without_dedup() {
        let key_line = "github.com ssh-ed25519 AAAA\n";
        let system = MockSystem::new()
            .with_process(KEYSCAN_PROGRAM, MockProcess::success().stdout(key_line))
            .unwrap()
            .with_process(KEYSCAN_PROGRAM, MockProcess::success().stdout(key_line))
            .unwrap();
        let store = MemoryCredentialStore::new();
        let cloner = LocalCloner::new(&system, &store, paths());

        cloner.clone_local(&reference(), BaseTree::Application).unwrap();
        cloner.clone_local(&reference(), BaseTree::Application).unwrap();

        assert_eq!(
            system.file_contents("/srv/gp/ssh/known_hosts").lines().count(),
            2
        );
    }

    #[test]
    fn child_failure_is_logged_raised_and_closed() {
        let system = MockSystem::new()
            .with_process(
                GIT_PROGRAM,
                MockProcess::exit(128)
                    .stderr("Cloning into '/srv/gp/applications/shop/code'...\n")
                    .stderr("fatal: Could not read from remote repository.\n"),
            )
            .unwrap();
        let store = MemoryCredentialStore::new();

        let err = LocalCloner::new(&system, &store, paths())
            .clone_local(&reference(), BaseTree::Application)
            .unwrap_err();

        assert!(matches!(err, ProvisionError::CloneProcess { .. }));
        assert_eq!(err.exit_code(), 6);

        let log = system.file_contents(LOG);
        let announce = markers::announce("git@github.com:acme/shop.git", Path::new(CODE));
        assert!(log.starts_with(&markers::bracketed(&announce)));
        assert!(log.contains("fatal: Could not read from remote repository."));
        assert!(log.contains(&markers::failure(&err.to_string())));
        assert!(!log.contains("Cloned Repo"));
        assert_eq!(system.open_writers(), 0);
    }

    #[test]
    fn spawn_failure_is_clone_error() {
        let system = MockSystem::new()
            .with_process(GIT_PROGRAM, MockProcess::spawn_failure("git: command not found"))
            .unwrap();
        let store = MemoryCredentialStore::new();

        let err = LocalCloner::new(&system, &store, paths())
            .clone_local(&reference(), BaseTree::Application)
            .unwrap_err();

        assert!(matches!(err, ProvisionError::CloneProcess { .. }));
        assert!(system.file_contents(LOG).contains(markers::FAILURE_SYMBOL));
    }

    #[test]
    fn directory_reset_failure_is_logged() {
        let system = MockSystem::new()
            .with_dir(CODE)
            .unwrap()
            .with_failing_path(CODE)
            .unwrap();
        let store = MemoryCredentialStore::new();

        let err = LocalCloner::new(&system, &store, paths())
            .clone_local(&reference(), BaseTree::Application)
            .unwrap_err();

        assert!(matches!(err, ProvisionError::DirectoryReset { .. }));
        assert_eq!(system.invoked_programs(), vec![KEYSCAN_PROGRAM]);
        assert!(system.file_contents(LOG).contains(&markers::failure(&err.to_string())));
    }

    #[test]
    fn input_errors_have_no_side_effects() {
        let store = MemoryCredentialStore::new();
        let references = [
            RepositoryReference::new("shop").with_url("git@github.com:acme/shop.git"),
            RepositoryReference::new("shop").with_branch("main"),
            RepositoryReference::new("shop")
                .with_url("not a url??")
                .with_branch("main"),
            RepositoryReference::new("shop")
                .with_url("   ")
                .with_branch("main"),
        ];

        for reference in references {
            let system = MockSystem::new();
            let err = LocalCloner::new(&system, &store, paths())
                .clone_local(&reference, BaseTree::Application)
                .unwrap_err();

            assert!(err.is_input_error(), "{err}");
            assert!(system.invocations().is_empty());
            assert!(!system.exists(Path::new(LOG)));
            assert!(!system.exists(Path::new(CODE)));
        }
        assert!(store.touched_ids().is_empty());
    }

    #[test]
    fn credential_sets_ssh_command_only_for_ssh() {
        let store = MemoryCredentialStore::new();

        let system = MockSystem::new();
        LocalCloner::new(&system, &store, paths())
            .clone_local(&reference().with_ssh_key("deploy"), BaseTree::Application)
            .unwrap();
        let git = system.invocations().pop().unwrap();
        assert_eq!(
            git.environment.ssh_command_override.as_deref(),
            Some("ssh -i /srv/gp/ssh/deploy_rsa -o UserKnownHostsFile=/srv/gp/ssh/known_hosts")
        );

        let system = MockSystem::new();
        let https = RepositoryReference::new("shop")
            .with_url("https://github.com/acme/shop.git")
            .with_branch("main")
            .with_ssh_key("deploy");
        LocalCloner::new(&system, &store, paths())
            .clone_local(&https, BaseTree::Application)
            .unwrap();
        assert_eq!(system.invoked_programs(), vec![GIT_PROGRAM]);
        assert!(system.invocations()[0].environment.ssh_command_override.is_none());
    }
}
