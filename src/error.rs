use thiserror::Error;

/// Reasons a capability source could not produce a usable PAM handle.
///
/// The `Display` output of each variant is what ends up in
/// [`PamAvailability::error`](crate::auth::verifier::PamAvailability).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot find module '{0}'")]
    NotFound(String),

    #[error("PAM support was not compiled in (enable the `pam-auth` feature)")]
    NotCompiled,

    #[error("Failed to initialize PAM for service '{service}': {reason}")]
    Init { service: String, reason: String },

    #[error("{source_name} did not export an authenticate function")]
    MissingExport { source_name: String },

    #[error("{0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoadError {
    /// Builds a [`LoadError::Panicked`] from a caught panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "capability source panicked".to_string()
        };
        LoadError::Panicked(message)
    }
}
