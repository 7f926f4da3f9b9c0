#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use pamgate::{AuthHandle, CapabilitySource, Exports, LoadError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a mock source does when asked to load.
pub enum Behavior {
    Exports(Exports),
    Fail(fn() -> LoadError),
    Panic,
}

/// Capability source that counts how often it is loaded.
pub struct MockSource {
    behavior: Behavior,
    delay: Duration,
    loads: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn loads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

#[async_trait]
impl CapabilitySource for MockSource {
    fn name(&self) -> &str {
        "authenticate-pam"
    }

    async fn load(&self) -> Result<Exports, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Exports(exports) => Ok(exports.clone()),
            Behavior::Fail(make) => Err(make()),
            Behavior::Panic => panic!("native module crashed"),
        }
    }
}

/// Handle accepting exactly one username/password pair, counting calls.
pub fn password_handle(
    username: &'static str,
    password: &'static str,
    calls: Arc<AtomicUsize>,
) -> AuthHandle {
    handle(move |u, p| {
        calls.fetch_add(1, Ordering::SeqCst);
        if u == username && p == password {
            Ok(())
        } else {
            Err(anyhow!("Authentication failure"))
        }
    })
}

pub fn handle<F>(f: F) -> AuthHandle
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn not_found() -> LoadError {
    LoadError::NotFound("authenticate-pam".to_string())
}
