mod common;

use common::{handle, not_found, Behavior, MockSource};
use pamgate::{CapabilityLoader, CapabilityState, Exports, LoadError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_state_starts_unresolved() {
    let loader = CapabilityLoader::new(MockSource::new(Behavior::Fail(not_found)));
    assert!(matches!(loader.state(), CapabilityState::Unresolved));
}

#[tokio::test]
async fn test_sequential_calls_resolve_once() {
    let source = MockSource::new(Behavior::Exports(Exports::callable(handle(|_, _| Ok(())))));
    let loads = source.loads();
    let loader = CapabilityLoader::new(source);

    for _ in 0..5 {
        assert!(loader.ensure_loaded().await.is_available());
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(loader.state().is_available());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_callers_share_one_resolution() {
    let source = MockSource::new(Behavior::Fail(not_found)).with_delay(Duration::from_millis(50));
    let loads = source.loads();
    let loader = Arc::new(CapabilityLoader::new(source));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.ensure_loaded().await.reason().map(String::from) })
        })
        .collect();

    for task in tasks {
        let reason = task.await.unwrap();
        assert_eq!(reason.as_deref(), Some("Cannot find module 'authenticate-pam'"));
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_load_error_message_is_captured() {
    let loader = CapabilityLoader::new(MockSource::new(Behavior::Fail(|| {
        LoadError::Other(anyhow::anyhow!("libpam.so.0: cannot open shared object file"))
    })));

    let state = loader.ensure_loaded().await;
    assert_eq!(state.reason(), Some("libpam.so.0: cannot open shared object file"));
}

#[tokio::test]
async fn test_shape_mismatch_is_unavailable() {
    let exports = Exports::new().with_function("login", handle(|_, _| Ok(())));
    let loader = CapabilityLoader::new(MockSource::new(Behavior::Exports(exports)));

    let state = loader.ensure_loaded().await;
    assert!(!state.is_available());
    // Wording is not part of the contract, only that a reason exists.
    assert!(!state.reason().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_panicking_source_is_absorbed() {
    let source = MockSource::new(Behavior::Panic);
    let loads = source.loads();
    let loader = CapabilityLoader::new(source);

    assert_eq!(loader.ensure_loaded().await.reason(), Some("native module crashed"));
    assert_eq!(loader.ensure_loaded().await.reason(), Some("native module crashed"));
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropped_first_caller_does_not_restart_resolution() {
    let source = MockSource::new(Behavior::Fail(not_found)).with_delay(Duration::from_millis(200));
    let loads = source.loads();
    let loader = CapabilityLoader::new(source);

    let first = tokio::time::timeout(Duration::from_millis(20), loader.ensure_loaded()).await;
    assert!(first.is_err());
    assert!(matches!(loader.state(), CapabilityState::Unresolved));

    let state = loader.ensure_loaded().await;
    assert_eq!(state.reason(), Some("Cannot find module 'authenticate-pam'"));
    assert!(loader.state().is_resolved());
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}
