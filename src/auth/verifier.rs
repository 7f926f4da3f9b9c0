use super::loader::{CapabilityLoader, CapabilitySource, CapabilityState};
use super::pam::SystemPamSource;
use super::{AuthenticateFn, Authenticator};
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use tracing::debug;

/// Whether PAM can be used in this process, and why not if it can't.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PamAvailability {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PamAvailability {
    fn from_state(state: &CapabilityState) -> Self {
        match state {
            CapabilityState::Available(_) => Self {
                available: true,
                error: None,
            },
            CapabilityState::Unavailable(reason) => Self {
                available: false,
                error: Some(reason.clone()),
            },
            CapabilityState::Unresolved => Self {
                available: false,
                error: None,
            },
        }
    }
}

/// Checks credentials through an optional capability, failing closed when
/// the capability could not be loaded.
#[derive(Debug)]
pub struct CredentialVerifier {
    loader: CapabilityLoader,
}

impl CredentialVerifier {
    pub fn new<S: CapabilitySource + 'static>(source: S) -> Self {
        Self {
            loader: CapabilityLoader::new(source),
        }
    }

    /// Verifier backed by the host PAM stack for `service`.
    pub fn system(service: &str) -> Self {
        Self::new(SystemPamSource::new(service))
    }

    pub fn loader(&self) -> &CapabilityLoader {
        &self.loader
    }

    pub async fn availability(&self) -> PamAvailability {
        PamAvailability::from_state(&self.loader.ensure_loaded().await)
    }

    /// Returns `true` only if the capability is loaded and accepts the
    /// credentials. Rejections, internal PAM failures and panics inside the
    /// handle all come back as `false`.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> bool {
        let handle = match self.loader.ensure_loaded().await {
            CapabilityState::Available(handle) => handle,
            _ => {
                debug!("PAM unavailable, rejecting '{}'", username);
                return false;
            }
        };

        let outcome = AssertUnwindSafe(handle.authenticate(username, password))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                debug!("PAM accepted credentials for '{}'", username);
                true
            }
            Ok(Err(e)) => {
                debug!("PAM rejected credentials for '{}': {}", username, e);
                false
            }
            Err(_) => {
                debug!("PAM handle panicked while checking '{}'", username);
                false
            }
        }
    }
}

#[async_trait]
impl Authenticator for CredentialVerifier {
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        Ok(self.verify_credentials(username, password).await)
    }
}
