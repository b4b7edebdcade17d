//! `GitProvision` - Provision application source trees from Git repositories
//!
//! This library parses repository locations into SSH connection parameters,
//! registers host keys, and clones a branch either on this machine, with the
//! git output streamed to a deployment log, or on a managed host through a
//! generated shell script.

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod operations;
pub mod system;
pub mod utils;

use anyhow::{Context as _, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_PATH};
use error::ProvisionError;
use git::SshLocation;
use indicatif::{ProgressBar, ProgressStyle};
use operations::{LocalCloner, RemoteCloner};
use std::path::{Path, PathBuf};
use system::{FileCredentialStore, RealSystem, SshRemoteExecutor, System};
use tracing::info;

/// Main entry point for the gitprovision library
///
/// # Errors
///
/// Returns the `ProvisionError` of the failing step, wrapped in `anyhow`
#[inline]
pub fn run(args: &Args) -> Result<()> {
    let system = RealSystem::new();
    let config = load_config(&system, args.config.as_deref())?;
    let reference = args.reference();
    let tree = args.base_tree();
    let credentials = FileCredentialStore::new(&system, config.credential_store_path(&system)?);

    if let Some(server_id) = args.server.as_deref() {
        let server = config.server(&system, server_id)?;
        let executor = SshRemoteExecutor::new(&system);
        let cloner = RemoteCloner::new(&executor, &credentials, config.remote_paths()?)
            .with_credential_touch(config.credential_touch)
            .with_shell_quoting(config.shell_quoting);

        if args.to_script {
            let script = cloner.render_script(&reference, tree)?;
            print!("{script}");
            return Ok(());
        }

        cloner.clone_remote(&reference, tree, &server)?;
        info!("Clone of '{}' finished on {}", reference.app_name, server.id);
        return Ok(());
    }

    let spinner = clone_spinner(&reference.app_name);
    let progress = |chunk: &[u8]| {
        if let Some(line) = last_progress_line(chunk) {
            spinner.set_message(line);
        }
        spinner.tick();
    };

    let result = LocalCloner::new(&system, &credentials, config.local_paths(&system)?)
        .with_credential_touch(config.credential_touch)
        .with_log_path(args.log_file.as_deref().map(PathBuf::from))
        .with_progress(&progress)
        .clone_local(&reference, tree);
    spinner.finish_and_clear();
    result?;

    info!("Clone of '{}' finished", reference.app_name);
    Ok(())
}

/// Print the SSH parameters of a repository location
///
/// # Errors
///
/// Returns a `Parse` error for an unparseable location
#[inline]
pub fn run_parse(raw: &str, format: OutputFormat) -> Result<()> {
    let location = SshLocation::parse(raw)?;

    // Output to stdout (not using logging)
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&location)
                .context("Failed to serialize location to JSON")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            println!("user: {}", location.user);
            println!("domain: {}", location.domain);
            println!("port: {}", location.port);
            println!("owner: {}", location.owner);
            println!("repo: {}", location.repo);
            println!("url: {}", location.canonical_url());
        }
    }

    Ok(())
}

/// Load the configuration file
///
/// Without an explicit path, a missing `./gitprovision.yaml` means defaults.
///
/// # Errors
///
/// Returns a `Configuration` error if the file is missing, unreadable or invalid
#[inline]
pub fn load_config(system: &dyn System, explicit: Option<&str>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path,
        None if system.exists(Path::new(DEFAULT_CONFIG_PATH)) => DEFAULT_CONFIG_PATH,
        None => return Ok(Config::default()),
    };

    Config::load_from_file(system, path)
        .map_err(|e| ProvisionError::configuration(format!("{e:#}")).into())
}

fn clone_spinner(app_name: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed}] {prefix} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_prefix(app_name.to_owned());
    spinner
}

/// Last non-empty line of a git output chunk; git redraws progress with `\r`
fn last_progress_line(chunk: &[u8]) -> Option<String> {
    String::from_utf8_lossy(chunk)
        .split(['\r', '\n'])
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_owned)
}
