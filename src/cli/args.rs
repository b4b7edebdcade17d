use crate::git::{BaseTree, RepositoryReference};
use clap::Parser;
use std::str::FromStr;

/// Command-line arguments for gitprovision
#[derive(Parser, Debug, Clone)]
#[command(name = "gitprovision")]
#[command(
    about = "Clone an application's Git repository locally or on a managed host"
)]
#[command(long_about = None)]
#[command(version)]
pub struct Args {
    /// Application whose source tree is provisioned
    #[arg(long, value_name = "NAME", required_unless_present = "parse")]
    pub app_name: Option<String>,

    /// Repository location (`git@host:owner/repo.git`, `ssh://...` or `https://...`)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Branch to check out
    #[arg(long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Id of the SSH key used for the clone
    #[arg(long = "ssh-key-id", value_name = "ID")]
    pub ssh_key_id: Option<String>,

    /// Clone into the compose tree instead of the application tree
    #[arg(long)]
    pub compose: bool,

    /// Clone on this managed host instead of locally
    #[arg(long, value_name = "ID")]
    pub server: Option<String>,

    /// Deployment log for a local clone (default: `<logs>/<app>/clone.log`)
    #[arg(long = "log-file", value_name = "PATH", conflicts_with = "server")]
    pub log_file: Option<String>,

    /// Configuration file path (default: ./gitprovision.yaml when present)
    #[arg(long, value_name = "PATH", env = "GITPROVISION_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the script that would run on the managed host instead of running it
    #[arg(long = "to-script", requires = "server", conflicts_with = "parse")]
    pub to_script: bool,

    /// Parse a repository location and print its SSH parameters
    #[arg(long, value_name = "REF")]
    pub parse: Option<String>,

    /// Output format for --parse: text or json
    #[arg(
        long = "output-format",
        value_name = "FORMAT",
        default_value = "text",
        requires = "parse"
    )]
    pub output_format: String,
}

impl Args {
    /// The repository reference named on the command line
    #[must_use]
    #[inline]
    pub fn reference(&self) -> RepositoryReference {
        RepositoryReference {
            app_name: self.app_name.clone().unwrap_or_default(),
            url: self.url.clone(),
            branch: self.branch.clone(),
            ssh_key_id: self.ssh_key_id.clone(),
        }
    }

    #[must_use]
    #[inline]
    pub const fn base_tree(&self) -> BaseTree {
        if self.compose {
            BaseTree::Compose
        } else {
            BaseTree::Application
        }
    }
}

/// Output formats for `--parse`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutputFormat {
    /// One `key: value` line per field
    Text,
    /// A JSON object
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {s}. Use 'text' or 'json'")),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "This is a test module")]
mod tests {
    use super::*;

    #[test]
    fn test_local_clone_args() {
        let args = Args::try_parse_from([
            "gitprovision",
            "--app-name",
            "shop",
            "--url",
            "git@github.com:acme/shop.git",
            "--branch",
            "main",
            "--ssh-key-id",
            "deploy",
            "--compose",
        ])
        .unwrap();

        assert_eq!(args.base_tree(), BaseTree::Compose);
        let reference = args.reference();
        assert_eq!(reference.app_name, "shop");
        assert_eq!(reference.credential_id(), Some("deploy"));
    }

    #[test]
    fn test_to_script_requires_server() {
        let result = Args::try_parse_from(["gitprovision", "--app-name", "shop", "--to-script"]);
        assert!(result.is_err());

        let args = Args::try_parse_from([
            "gitprovision",
            "--app-name",
            "shop",
            "--server",
            "edge",
            "--to-script",
        ])
        .unwrap();
        assert!(args.to_script);
    }

    #[test]
    fn test_parse_mode_needs_no_app_name() {
        let args = Args::try_parse_from([
            "gitprovision",
            "--parse",
            "git@github.com:acme/shop.git",
            "--output-format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.output_format.parse::<OutputFormat>().unwrap(), OutputFormat::Json);

        assert!(Args::try_parse_from(["gitprovision"]).is_err());
    }

    #[test]
    fn test_log_file_conflicts_with_server() {
        let result = Args::try_parse_from([
            "gitprovision",
            "--app-name",
            "shop",
            "--server",
            "edge",
            "--log-file",
            "/tmp/clone.log",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
