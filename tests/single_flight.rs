//! Single-Flight Integration Tests
//!
//! Coalescing across many concurrent callers and keys, shared failures, and
//! invalidation while flights are running.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use folio::core::{FlightAborted, SingleFlight};
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum TestError {
    #[error("producer failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Aborted(#[from] FlightAborted),
}

type Memo = SingleFlight<String, usize, TestError>;

#[tokio::test]
async fn test_keys_are_coalesced_independently() {
    let memo = Memo::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let mut handles = Vec::new();
    for caller in 0..30 {
        let memo = memo.clone();
        let runs = Arc::clone(&runs);
        let gate = Arc::clone(&gate);
        let key = format!("key-{}", caller % 3);

        handles.push(tokio::spawn(async move {
            memo.get(key.clone(), move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                Ok(key.len() + caller % 3)
            })
            .await
        }));
    }

    // Let every caller join before any flight lands
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    gate.notify_waiters();

    for (caller, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Ok(5 + caller % 3));
    }
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(memo.len(), 3);
}

#[tokio::test]
async fn test_failure_is_shared_then_retried() {
    let memo = Memo::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let memo = memo.clone();
        let runs = Arc::clone(&runs);
        handles.push(tokio::spawn(async move {
            memo.get("k".to_string(), move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err::<usize, _>(TestError::Failed("disk".to_string()))
            })
            .await
        }));
    }
    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            Err(TestError::Failed("disk".to_string()))
        );
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(!memo.is_cached(&"k".to_string()));

    let value = memo.get("k".to_string(), || async { Ok(7) }).await;
    assert_eq!(value, Ok(7));
    assert!(memo.is_cached(&"k".to_string()));
}

#[tokio::test]
async fn test_clear_during_flight_does_not_cache_stale_value() {
    let memo = Memo::new();
    let gate = Arc::new(Notify::new());

    let waiter = {
        let memo = memo.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            memo.get("k".to_string(), move || async move {
                gate.notified().await;
                Ok(1)
            })
            .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    memo.clear();
    gate.notify_waiters();

    // The detached flight still answers its own caller
    assert_eq!(waiter.await.unwrap(), Ok(1));
    assert!(memo.is_empty());

    let fresh = memo.get("k".to_string(), || async { Ok(2) }).await;
    assert_eq!(fresh, Ok(2));
}
