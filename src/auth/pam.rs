use super::loader::{CapabilitySource, Exports};
use crate::error::LoadError;
use async_trait::async_trait;

/// Service used when the caller does not name one.
pub const DEFAULT_PAM_SERVICE: &str = "login";

/// Capability source backed by the host's PAM stack.
///
/// Loading starts (and immediately drops) a PAM transaction for the
/// service. That only catches a PAM library that cannot start at all: a
/// service with no `/etc/pam.d` entry still starts, because Linux-PAM falls
/// back to the `other` service, so a misnamed service reports available and
/// then rejects every login. In practice the source reports unavailable
/// mainly when the crate is built without the `pam-auth` feature.
#[derive(Debug, Clone)]
pub struct SystemPamSource {
    service: String,
}

impl SystemPamSource {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Default for SystemPamSource {
    fn default() -> Self {
        Self::new(DEFAULT_PAM_SERVICE)
    }
}

#[async_trait]
impl CapabilitySource for SystemPamSource {
    fn name(&self) -> &str {
        "pam"
    }

    #[cfg(feature = "pam-auth")]
    async fn load(&self) -> Result<Exports, LoadError> {
        use super::loader::NAMED_EXPORT;
        use std::sync::Arc;

        let service = self.service.clone();
        let probe = tokio::task::spawn_blocking(move || {
            system::PamAuthenticate::probe(&service)
        })
        .await;

        match probe {
            Ok(Ok(handle)) => Ok(Exports::new().with_function(NAMED_EXPORT, Arc::new(handle))),
            Ok(Err(e)) => Err(e),
            Err(join_err) => Err(LoadError::Init {
                service: self.service.clone(),
                reason: format!("PAM probe task failed: {}", join_err),
            }),
        }
    }

    #[cfg(not(feature = "pam-auth"))]
    async fn load(&self) -> Result<Exports, LoadError> {
        Err(LoadError::NotCompiled)
    }
}

#[cfg(feature = "pam-auth")]
mod system {
    use super::super::AuthenticateFn;
    use crate::error::LoadError;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use pam::Authenticator as PamAuth;
    use tracing::debug;

    /// Credential check that runs one PAM conversation per call.
    pub(super) struct PamAuthenticate {
        service: String,
    }

    impl PamAuthenticate {
        pub(super) fn probe(service: &str) -> Result<Self, LoadError> {
            PamAuth::with_password(service).map_err(|e| LoadError::Init {
                service: service.to_string(),
                reason: format!("{:?}", e),
            })?;
            debug!("PAM transaction for service '{}' started", service);
            Ok(Self {
                service: service.to_string(),
            })
        }
    }

    #[async_trait]
    impl AuthenticateFn for PamAuthenticate {
        async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
            let service = self.service.clone();
            let username = username.to_string();
            let password = password.to_string();

            let result = tokio::task::spawn_blocking(move || {
                let mut auth = PamAuth::with_password(&service).map_err(|e| {
                    anyhow!("Failed to initialize PAM for service '{}': {:?}", service, e)
                })?;

                auth.get_handler().set_credentials(&username, &password);

                auth.authenticate()
                    .map_err(|e| anyhow!("PAM rejected '{}': {:?}", username, e))
            })
            .await;

            match result {
                Ok(auth_result) => auth_result,
                Err(join_err) => Err(anyhow!("PAM task panicked: {}", join_err)),
            }
        }
    }
}
