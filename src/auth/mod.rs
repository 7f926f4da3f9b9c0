use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod loader;
pub mod pam;
pub mod verifier;

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a user with a password.
    /// Returns Ok(true) if successful, Ok(false) if failed, or Err if an error occurred.
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool>;
}

/// The raw credential check exposed by a capability source.
///
/// `Ok(())` means the credentials were accepted. Any `Err` is a rejection,
/// whatever its cause.
#[async_trait]
pub trait AuthenticateFn: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<()>;
}

#[async_trait]
impl<F> AuthenticateFn for F
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync,
{
    async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        (self)(username, password)
    }
}

pub type AuthHandle = Arc<dyn AuthenticateFn>;
