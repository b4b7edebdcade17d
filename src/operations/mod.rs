//! Operations module
//!
//! Executes clone plans locally and renders them into scripts for managed hosts

pub mod clone_local;
pub mod log_sink;
pub mod markers;
pub mod remote_script;
pub mod shell;

pub use clone_local::LocalCloner;
pub use log_sink::LogSink;
pub use remote_script::{RemoteCloner, build_remote_clone_script};

use crate::config::CredentialTouchPolicy;
use crate::error::ProvisionError;
use crate::system::CredentialStore;
use chrono::Utc;
use tracing::{debug, warn};

/// Record that an SSH key is about to be used
///
/// # Errors
///
/// Returns the store's error under `CredentialTouchPolicy::Propagate`
#[inline]
pub fn touch_credential(
    store: &dyn CredentialStore,
    policy: CredentialTouchPolicy,
    credential_id: &str,
) -> Result<(), ProvisionError> {
    debug!("Recording usage of SSH key '{credential_id}'");
    match store.touch_credential_usage(credential_id, Utc::now()) {
        Ok(()) => Ok(()),
        Err(e) if policy == CredentialTouchPolicy::BestEffort => {
            warn!("Failed to record usage of SSH key '{credential_id}': {e}");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
