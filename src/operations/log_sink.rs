//! Append-only deployment log

use crate::error::ProvisionError;
use crate::operations::markers;
use crate::system::System;
use crate::utils::fs::create_parent_directories;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Deployment log opened in append mode
///
/// Writes never fail the caller. Once the sink is closed, or after its first
/// write error, further output is dropped.
pub struct LogSink<'src> {
    path: PathBuf,
    writer: Option<Box<dyn Write + Send + 'src>>,
}

impl<'src> LogSink<'src> {
    /// Open `path` for appending, creating it and its parent directory
    ///
    /// # Errors
    ///
    /// Returns a `LogSink` error if the file cannot be opened
    #[inline]
    pub fn open(system: &'src dyn System, path: &Path) -> Result<Self, ProvisionError> {
        create_parent_directories(system, path)
            .map_err(|e| ProvisionError::log_sink(format!("{e:#}")))?;
        let writer = system.open_append(path).map_err(|e| {
            ProvisionError::log_sink(format!("Failed to open {}: {e}", path.display()))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
        })
    }

    #[must_use]
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    #[inline]
    pub const fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    /// Forward raw process output
    #[inline]
    pub fn write_chunk(&mut self, chunk: &[u8]) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writer.write_all(chunk) {
            warn!("Deployment log {} stopped accepting output: {e}", self.path.display());
            self.writer = None;
        }
    }

    /// Write a marker line between blank lines
    #[inline]
    pub fn write_marker(&mut self, line: &str) {
        self.write_chunk(markers::bracketed(line).as_bytes());
    }

    /// Flush and release the file; safe to call more than once
    #[inline]
    pub fn close(&mut self) {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.flush()
        {
            warn!("Failed to flush deployment log {}: {e}", self.path.display());
        }
    }
}

impl Drop for LogSink<'_> {
    #[inline]
    fn drop(&mut self) {
        self.close();
    }
}
