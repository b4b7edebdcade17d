//! Repository location parsing
//!
//! Turns the free-form git locations users paste (`git@host:owner/repo.git`,
//! `ssh://user@host:2222/owner/repo`, `host:owner/repo`) into SSH connection
//! parameters. The input is consumed left to right, one token class at a
//! time: scheme, userinfo, host, port, path segments.

use crate::error::ProvisionError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// User assumed when the location names none
pub const DEFAULT_SSH_USER: &str = "git";

/// Port assumed when the location names none
pub const DEFAULT_SSH_PORT: u16 = 22;

/// SSH connection parameters of a git remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshLocation {
    pub user: String,
    pub domain: String,
    pub port: u16,
    /// Namespace in front of the repository, possibly empty or nested (`group/sub`)
    pub owner: String,
    pub repo: String,
}

impl SshLocation {
    /// Parse a raw repository location
    ///
    /// # Errors
    ///
    /// Returns a `Parse` error when no host or no repository segment can be
    /// found, or when a token contains characters outside its class
    #[inline]
    pub fn parse(raw: &str) -> Result<Self, ProvisionError> {
        let body = strip_decorations(raw);
        if body.is_empty() {
            return Err(parse_error(raw, "location is empty"));
        }

        let rest = skip_scheme(raw, body)?;
        let (user, rest) = take_userinfo(raw, rest)?;
        let (domain, rest) = take_host(raw, rest)?;
        let (port, path) = take_port(raw, rest)?;
        let (owner, repo) = split_path(raw, path)?;

        Ok(Self {
            user: user.unwrap_or(DEFAULT_SSH_USER).to_owned(),
            domain: domain.to_owned(),
            port: port.unwrap_or(DEFAULT_SSH_PORT),
            owner,
            repo: repo.to_owned(),
        })
    }

    /// Normalized `ssh://user@domain:port/owner/repo.git` form
    #[must_use]
    #[inline]
    pub fn canonical_url(&self) -> String {
        if self.owner.is_empty() {
            format!(
                "ssh://{}@{}:{}/{}.git",
                self.user, self.domain, self.port, self.repo
            )
        } else {
            format!(
                "ssh://{}@{}:{}/{}/{}.git",
                self.user, self.domain, self.port, self.owner, self.repo
            )
        }
    }
}

impl FromStr for SshLocation {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SshLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_url())
    }
}

/// Whether a raw location uses the HTTP(S) transport
///
/// Anything else is treated as SSH transport and gets host-key registration.
#[must_use]
#[inline]
pub fn is_http_transport(raw: &str) -> bool {
    let raw = raw.trim_start();
    raw.starts_with("http://") || raw.starts_with("https://")
}

fn parse_error(raw: &str, reason: &str) -> ProvisionError {
    ProvisionError::parse(format!("Invalid repository location '{}': {reason}", raw.trim()))
}

/// Drop surrounding whitespace, trailing slashes and one `.git` suffix
fn strip_decorations(raw: &str) -> &str {
    let trimmed = raw
        .trim_start()
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace());
    trimmed.strip_suffix(".git").unwrap_or(trimmed)
}

fn skip_scheme<'a>(raw: &str, body: &'a str) -> Result<&'a str, ProvisionError> {
    let Some((scheme, rest)) = body.split_once("://") else {
        return Ok(body);
    };

    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(parse_error(raw, "malformed scheme"));
    }
    Ok(rest)
}

fn take_userinfo<'a>(raw: &str, rest: &'a str) -> Result<(Option<&'a str>, &'a str), ProvisionError> {
    let Some(at) = rest.find('@') else {
        return Ok((None, rest));
    };
    // An '@' inside the path belongs to the path
    if rest.find('/').is_some_and(|slash| slash < at) {
        return Ok((None, rest));
    }

    let user = &rest[..at];
    if user.is_empty() || user.chars().any(|c| c.is_whitespace() || c == ':') {
        return Err(parse_error(raw, "malformed user"));
    }
    Ok((Some(user), &rest[at + 1..]))
}

fn take_host<'a>(raw: &str, rest: &'a str) -> Result<(&'a str, &'a str), ProvisionError> {
    let end = rest.find([':', '/']).unwrap_or(rest.len());
    let host = &rest[..end];

    if host.is_empty() {
        return Err(parse_error(raw, "missing host"));
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(parse_error(raw, "host contains invalid characters"));
    }
    Ok((host, &rest[end..]))
}

/// Split an optional `:port` off the text following the host
///
/// `:` followed by digits up to the next `/` (or the end) is a port; any other
/// `:` starts an scp-style path.
fn take_port<'a>(raw: &str, rest: &'a str) -> Result<(Option<u16>, &'a str), ProvisionError> {
    if let Some(after_colon) = rest.strip_prefix(':') {
        let digits_end = after_colon
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_colon.len());
        let remainder = &after_colon[digits_end..];

        if digits_end > 0 && (remainder.is_empty() || remainder.starts_with('/')) {
            let port = after_colon[..digits_end]
                .parse::<u32>()
                .ok()
                .and_then(|port| u16::try_from(port).ok())
                .filter(|port| *port != 0)
                .ok_or_else(|| parse_error(raw, "port must be between 1 and 65535"))?;
            return Ok((Some(port), remainder.strip_prefix('/').unwrap_or(remainder)));
        }
        return Ok((None, after_colon));
    }

    Ok((None, rest.strip_prefix('/').unwrap_or(rest)))
}

fn split_path<'a>(raw: &str, path: &'a str) -> Result<(String, &'a str), ProvisionError> {
    if path.is_empty() {
        return Err(parse_error(raw, "missing repository name"));
    }

    let segments: Vec<&str> = path.split('/').collect();
    if segments
        .iter()
        .any(|segment| segment.is_empty() || segment.chars().any(char::is_whitespace))
    {
        return Err(parse_error(raw, "malformed repository path"));
    }

    let Some((repo, owner)) = segments.split_last() else {
        return Err(parse_error(raw, "missing repository name"));
    };
    Ok((owner.join("/"), *repo))
}
