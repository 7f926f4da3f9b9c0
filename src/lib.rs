//! Optional PAM credential verification.
//!
//! PAM is resolved lazily, once per process. When it cannot be loaded the
//! crate reports why through [`get_pam_availability`] and every credential
//! check fails closed instead of erroring.

pub mod auth;
pub mod config;
pub mod error;

pub use auth::loader::{CapabilityLoader, CapabilitySource, CapabilityState, Export, Exports};
pub use auth::pam::{SystemPamSource, DEFAULT_PAM_SERVICE};
pub use auth::verifier::{CredentialVerifier, PamAvailability};
pub use auth::{AuthHandle, AuthenticateFn, Authenticator};
pub use config::Config;
pub use error::LoadError;

use std::sync::OnceLock;

static SYSTEM_VERIFIER: OnceLock<CredentialVerifier> = OnceLock::new();

/// Process-wide verifier for the default PAM service.
pub fn system_verifier() -> &'static CredentialVerifier {
    SYSTEM_VERIFIER.get_or_init(|| CredentialVerifier::system(DEFAULT_PAM_SERVICE))
}

pub async fn get_pam_availability() -> PamAvailability {
    system_verifier().availability().await
}

pub async fn verify_pam_credentials(username: &str, password: &str) -> bool {
    system_verifier().verify_credentials(username, password).await
}
