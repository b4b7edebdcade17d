//! SSH credential "last used" bookkeeping

use super::System;
use crate::error::ProvisionError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Records when an SSH credential was last used for a clone
pub trait CredentialStore: Send + Sync {
    /// Mark `credential_id` as used at `timestamp`
    ///
    /// # Errors
    ///
    /// Returns a `Credential` error if the usage cannot be recorded
    fn touch_credential_usage(
        &self,
        credential_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ProvisionError>;
}

/// Credential store backed by a JSON file mapping ids to RFC 3339 timestamps
///
/// Only ids that already exist in the file can be touched; the file is the
/// registry of known credentials.
pub struct FileCredentialStore<'src> {
    system: &'src dyn System,
    path: PathBuf,
}

impl<'src> FileCredentialStore<'src> {
    #[must_use]
    #[inline]
    pub fn new(system: &'src dyn System, path: PathBuf) -> Self {
        Self { system, path }
    }

    #[must_use]
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a credential id with no recorded usage
    ///
    /// # Errors
    ///
    /// Returns a `Credential` error if the store cannot be read or written
    #[inline]
    pub fn register(&self, credential_id: &str) -> Result<(), ProvisionError> {
        let mut entries = self.load()?;
        entries.entry(credential_id.to_owned()).or_insert(None);
        self.save(&entries)
    }

    /// When a credential was last used, if ever
    ///
    /// # Errors
    ///
    /// Returns a `Credential` error if the store cannot be read
    #[inline]
    pub fn last_used(&self, credential_id: &str) -> Result<Option<String>, ProvisionError> {
        Ok(self.load()?.get(credential_id).cloned().flatten())
    }

    fn load(&self) -> Result<BTreeMap<String, Option<String>>, ProvisionError> {
        if !self.system.exists(&self.path) {
            return Ok(BTreeMap::new());
        }
        let content = self.system.read_to_string(&self.path).map_err(|e| {
            ProvisionError::credential(format!(
                "Failed to read credential store {}: {e}",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ProvisionError::credential(format!(
                "Credential store {} is not valid JSON: {e}",
                self.path.display()
            ))
        })
    }

    fn save(&self, entries: &BTreeMap<String, Option<String>>) -> Result<(), ProvisionError> {
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| ProvisionError::credential(format!("Failed to encode credentials: {e}")))?;

        if let Some(parent) = self.path.parent()
            && !self.system.exists(parent)
        {
            self.system.create_dir_all(parent).map_err(|e| {
                ProvisionError::credential(format!(
                    "Failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }

        self.system
            .write(&self.path, content.as_bytes())
            .map_err(|e| {
                ProvisionError::credential(format!(
                    "Failed to write credential store {}: {e}",
                    self.path.display()
                ))
            })
    }
}

impl CredentialStore for FileCredentialStore<'_> {
    fn touch_credential_usage(
        &self,
        credential_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ProvisionError> {
        let mut entries = self.load()?;
        let Some(last_used) = entries.get_mut(credential_id) else {
            return Err(ProvisionError::credential(format!(
                "Unknown SSH key '{credential_id}'"
            )));
        };
        *last_used = Some(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true));
        self.save(&entries)
    }
}

/// In-memory credential store for tests
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    touches: Arc<Mutex<Vec<(String, DateTime<Utc>)>>>,
    failure: Option<String>,
}

impl MemoryCredentialStore {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every touch fails with `message`
    #[must_use]
    #[inline]
    pub fn failing(message: &str) -> Self {
        Self {
            touches: Arc::default(),
            failure: Some(message.to_owned()),
        }
    }

    /// Ids touched so far, in order
    #[must_use]
    #[inline]
    pub fn touched_ids(&self) -> Vec<String> {
        self.touches
            .lock()
            .map(|touches| touches.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn touch_credential_usage(
        &self,
        credential_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ProvisionError> {
        if let Some(message) = self.failure.as_ref() {
            return Err(ProvisionError::credential(message.clone()));
        }
        self.touches
            .lock()
            .map_err(|e| ProvisionError::credential(e.to_string()))?
            .push((credential_id.to_owned(), timestamp));
        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "This is a test module")]
mod tests {
    use super::*;
    use crate::system::MockSystem;
    use chrono::TimeZone as _;

    #[test]
    fn test_touch_records_timestamp() {
        let system = MockSystem::new().with_dir("/ssh").unwrap();
        let store = FileCredentialStore::new(&system, PathBuf::from("/ssh/credentials.json"));
        store.register("deploy-key").unwrap();

        let when = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        store.touch_credential_usage("deploy-key", when).unwrap();

        assert_eq!(
            store.last_used("deploy-key").unwrap().as_deref(),
            Some("2026-03-01T12:30:00.000Z")
        );
    }

    #[test]
    fn test_touch_unknown_credential_fails() {
        let system = MockSystem::new();
        let store = FileCredentialStore::new(&system, PathBuf::from("/ssh/credentials.json"));
        let err = store
            .touch_credential_usage("missing", Utc::now())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Credential { .. }));
    }

    #[test]
    fn test_corrupt_store_is_credential_error() {
        let system = MockSystem::new()
            .with_file("/ssh/credentials.json", b"{not json")
            .unwrap();
        let store = FileCredentialStore::new(&system, PathBuf::from("/ssh/credentials.json"));
        assert!(store.last_used("any").is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::new();
        store.touch_credential_usage("a", Utc::now()).unwrap();
        store.touch_credential_usage("b", Utc::now()).unwrap();
        assert_eq!(store.touched_ids(), vec!["a".to_owned(), "b".to_owned()]);

        let failing = MemoryCredentialStore::failing("database is locked");
        assert!(failing.touch_credential_usage("a", Utc::now()).is_err());
    }
}
