//! Marker lines written to deployment logs
//!
//! Log viewers detect the outcome of a clone from these texts, so both the
//! local executor and the generated remote script take them from here.

use std::path::Path;

/// Suffix of announce and success lines
pub const SUCCESS_SYMBOL: &str = "\u{2705}";

/// Suffix of failure lines
pub const FAILURE_SYMBOL: &str = "\u{274c}";

/// Written before the clone starts
#[must_use]
#[inline]
pub fn announce(url: &str, destination: &Path) -> String {
    format!(
        "Cloning Repo {url} to {}: {SUCCESS_SYMBOL}",
        destination.display()
    )
}

/// Written once the clone has finished
#[must_use]
#[inline]
pub fn success(url: &str, destination: &Path) -> String {
    format!(
        "Cloned Repo {url} to {}: {SUCCESS_SYMBOL}",
        destination.display()
    )
}

/// Written when any step of the clone fails
#[must_use]
#[inline]
pub fn failure(detail: &str) -> String {
    format!("ERROR Cloning Repo: {detail}: {FAILURE_SYMBOL}")
}

/// Line as it appears in the log: on its own, between blank lines
#[must_use]
#[inline]
pub fn bracketed(line: &str) -> String {
    format!("\n{line}\n\n")
}
