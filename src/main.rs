//! # `GitProvision`
//!
//! `GitProvision` clones the Git repository of an application into its source
//! tree, either on this machine or on a managed host reachable over SSH.
//!
//! ## Features
//! - Accepts scp-style (`git@host:owner/repo.git`), `ssh://` and `https://` locations.
//! - Registers the remote host key in a dedicated known-hosts file before cloning.
//! - Uses a per-application SSH key through `GIT_SSH_COMMAND`.
//! - Streams git output to a deployment log ending in a success or failure marker.
//! - Renders the same procedure as a POSIX shell script for managed hosts.
//!
//! ## Usage
//!
//! **Local clone:**
//! ```sh
//! gitprovision --app-name shop --url git@github.com:acme/shop.git --branch main --ssh-key-id deploy
//! ```
//!
//! **On a managed host:**
//! ```sh
//! gitprovision --app-name shop --url git@github.com:acme/shop.git --branch main --server edge
//! ```
//!
//! **Inspect a location:**
//! ```sh
//! gitprovision --parse ssh://git@git.internal:2222/team/app.git --output-format json
//! ```
//!
//! See `gitprovision --help` for more options and details.

use anyhow::Result;
use clap::Parser as _;
use gitprovision::cli::{Args, OutputFormat};
use gitprovision::error::ProvisionError;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
    let args = Args::parse();

    // Script and parse output go to stdout, keep the log quiet for them
    let log_level = if args.to_script || args.parse.is_some() {
        "error"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    // Handle parse mode
    if let Some(raw) = args.parse.as_deref() {
        let format = args
            .output_format
            .parse::<OutputFormat>()
            .unwrap_or_else(|err| {
                error!("{}", err);
                std::process::exit(1);
            });

        exit_with(gitprovision::run_parse(raw, format));
    }

    // Normal execution mode
    exit_with(gitprovision::run(&args))
}

fn exit_with(result: Result<()>) -> ! {
    match result {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(
                err.downcast_ref::<ProvisionError>()
                    .map_or(1, ProvisionError::exit_code),
            );
        }
    }
}
