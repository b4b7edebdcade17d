//! Rendering values into POSIX shell text

use crate::config::ShellQuoting;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Characters that never need quoting in a POSIX shell word
static SAFE_WORD: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$"));

/// Whether `value` can appear unquoted as a single shell word
#[must_use]
#[inline]
pub fn is_safe_word(value: &str) -> bool {
    SAFE_WORD
        .as_ref()
        .is_ok_and(|pattern| pattern.is_match(value))
}

/// Single-quote `value` for a POSIX shell
#[must_use]
#[inline]
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Render a user-influenced value as one shell word
///
/// `Literal` embeds the value verbatim and only warns when it would be split
/// or interpreted by the shell; `Hardened` quotes such values.
#[must_use]
#[inline]
pub fn word(value: &str, quoting: ShellQuoting) -> String {
    if is_safe_word(value) {
        return value.to_owned();
    }
    match quoting {
        ShellQuoting::Literal => {
            warn!("Embedding unquoted shell value: {value}");
            value.to_owned()
        }
        ShellQuoting::Hardened => quote(value),
    }
}
