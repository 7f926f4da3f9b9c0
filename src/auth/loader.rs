//! One-shot resolution of the optional PAM capability.
//!
//! A [`CapabilitySource`] plays the part of the optional dependency: it may
//! be missing, may fail while loading, or may expose its credential check in
//! one of several shapes. [`CapabilityLoader`] asks the source exactly once,
//! picks a handle out of whatever was exported, and caches the outcome for
//! the life of the loader.

use super::AuthHandle;
use crate::error::LoadError;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Field name checked after a bare callable.
pub const NAMED_EXPORT: &str = "authenticate";
/// Field name checked last.
pub const DEFAULT_EXPORT: &str = "default";

/// A single named item exported by a capability source.
#[derive(Clone)]
pub enum Export {
    Function(AuthHandle),
    /// Anything that is not callable. Never selected as a handle.
    Value(String),
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Function(_) => f.write_str("Function(..)"),
            Export::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// Everything a capability source exposes once loaded.
///
/// A source can be callable itself, carry named fields, or both.
#[derive(Clone, Default)]
pub struct Exports {
    callable: Option<AuthHandle>,
    fields: HashMap<String, Export>,
}

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callable(handle: AuthHandle) -> Self {
        Self {
            callable: Some(handle),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, export: Export) -> Self {
        self.fields.insert(name.into(), export);
        self
    }

    pub fn with_function(self, name: impl Into<String>, handle: AuthHandle) -> Self {
        self.with_field(name, Export::Function(handle))
    }

    fn function(&self, name: &str) -> Option<&AuthHandle> {
        match self.fields.get(name) {
            Some(Export::Function(handle)) => Some(handle),
            _ => None,
        }
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort();
        f.debug_struct("Exports")
            .field("callable", &self.callable.is_some())
            .field("fields", &names)
            .finish()
    }
}

/// Picks the credential check out of `exports`.
///
/// Order: the bare callable, then the `authenticate` field, then the
/// `default` field. Fields holding non-callable values are skipped.
pub fn resolve_handle(exports: &Exports) -> Option<AuthHandle> {
    exports
        .callable
        .clone()
        .or_else(|| exports.function(NAMED_EXPORT).cloned())
        .or_else(|| exports.function(DEFAULT_EXPORT).cloned())
}

/// Where the optional capability comes from.
#[async_trait]
pub trait CapabilitySource: Send + Sync {
    /// Name used in diagnostics and logs.
    fn name(&self) -> &str;

    async fn load(&self) -> Result<Exports, LoadError>;
}

#[derive(Clone)]
pub enum CapabilityState {
    Unresolved,
    Available(AuthHandle),
    Unavailable(String),
}

impl CapabilityState {
    pub fn is_available(&self) -> bool {
        matches!(self, CapabilityState::Available(_))
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, CapabilityState::Unresolved)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            CapabilityState::Unavailable(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Debug for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityState::Unresolved => f.write_str("Unresolved"),
            CapabilityState::Available(_) => f.write_str("Available(..)"),
            CapabilityState::Unavailable(reason) => {
                f.debug_tuple("Unavailable").field(reason).finish()
            }
        }
    }
}

type Resolution = Shared<BoxFuture<'static, CapabilityState>>;

pub struct CapabilityLoader {
    source: Arc<dyn CapabilitySource>,
    resolution: OnceLock<Resolution>,
}

impl CapabilityLoader {
    pub fn new<S: CapabilitySource + 'static>(source: S) -> Self {
        Self {
            source: Arc::new(source),
            resolution: OnceLock::new(),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Resolves the capability if nobody has yet and returns the settled state.
    ///
    /// The resolution future is created once and shared by every caller.
    /// Dropping a waiter (for example on a caller-side timeout) leaves it
    /// parked, and the next caller picks it up where it stopped, so the
    /// source is loaded at most once. The returned state is never
    /// [`CapabilityState::Unresolved`].
    pub async fn ensure_loaded(&self) -> CapabilityState {
        self.resolution
            .get_or_init(|| {
                let source = Arc::clone(&self.source);
                async move { resolve(source.as_ref()).await }.boxed().shared()
            })
            .clone()
            .await
    }

    /// Current state, without triggering resolution.
    pub fn state(&self) -> CapabilityState {
        self.resolution
            .get()
            .and_then(|resolution| resolution.peek())
            .cloned()
            .unwrap_or(CapabilityState::Unresolved)
    }
}

impl fmt::Debug for CapabilityLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityLoader")
            .field("source", &self.source.name())
            .field("state", &self.state())
            .finish()
    }
}

async fn resolve(source: &dyn CapabilitySource) -> CapabilityState {
    let name = source.name().to_string();
    debug!("Resolving PAM capability from '{}'", name);

    let loaded = AssertUnwindSafe(source.load())
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(LoadError::from_panic(payload)));

    let handle = loaded.and_then(|exports| {
        debug!("'{}' exported {:?}", name, exports);
        resolve_handle(&exports).ok_or_else(|| LoadError::MissingExport {
            source_name: name.clone(),
        })
    });

    match handle {
        Ok(handle) => {
            info!("PAM capability '{}' is available", name);
            CapabilityState::Available(handle)
        }
        Err(e) => {
            let reason = e.to_string();
            warn!("PAM capability '{}' is unavailable: {}", name, reason);
            CapabilityState::Unavailable(reason)
        }
    }
}
