//! Contract tests for the `SessionStore` trait against the memory backend.
//!
//! These exercise the compound operations the QR state machine and the
//! session lifecycle rely on: conditional replace, take-once, and atomic
//! marker rotation.

use std::sync::Arc;
use std::time::Duration;

use qrlink_store::{MemoryStore, SessionStore};

fn store() -> Arc<dyn SessionStore> {
    Arc::new(MemoryStore::new())
}

// ---------------------------------------------------------------------------
// Test: delete is idempotent and reports whether a value existed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_reports_existence() {
    let store = store();
    store.put("k", "v", 60).await.unwrap();

    assert!(store.delete("k").await.unwrap());
    assert!(!store.delete("k").await.unwrap());
    assert_eq!(store.get("k").await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test: replace never creates a missing key
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replace_on_missing_key_writes_nothing() {
    let store = store();

    assert!(!store.replace("qr:ghost", "value", 60).await.unwrap());
    assert_eq!(store.get("qr:ghost").await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test: replace re-arms the TTL of an existing key
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn replace_rearms_ttl() {
    let store = store();
    store.put("qr:s", "pending", 120).await.unwrap();

    tokio::time::advance(Duration::from_secs(100)).await;
    assert!(store.replace("qr:s", "authenticated", 60).await.unwrap());

    // Past the original deadline, still within the re-armed window.
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(
        store.get("qr:s").await.unwrap().as_deref(),
        Some("authenticated")
    );

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(store.get("qr:s").await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test: replace does not resurrect an expired key
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn replace_after_expiry_is_refused() {
    let store = store();
    store.put("qr:s", "pending", 120).await.unwrap();

    tokio::time::advance(Duration::from_secs(130)).await;

    assert!(!store.replace("qr:s", "authenticated", 60).await.unwrap());
    assert_eq!(store.get("qr:s").await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test: take yields the value exactly once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn take_is_at_most_once() {
    let store = store();
    store.put("qr:s", "payload", 60).await.unwrap();

    assert_eq!(store.take("qr:s").await.unwrap().as_deref(), Some("payload"));
    assert_eq!(store.take("qr:s").await.unwrap(), None);
    assert_eq!(store.get("qr:s").await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test: concurrent takers -- exactly one wins
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_take_has_single_winner() {
    let store = store();
    store.put("qr:race", "payload", 60).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.take("qr:race").await.unwrap() }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

// ---------------------------------------------------------------------------
// Test: take of an expired key yields nothing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn take_after_expiry_is_absent() {
    let store = store();
    store.put("qr:s", "payload", 60).await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;

    assert_eq!(store.take("qr:s").await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test: rotate swaps old for new in one step
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rotate_replaces_old_marker() {
    let store = store();
    store.put("session:u1:old", "valid", 600).await.unwrap();

    assert!(store
        .rotate("session:u1:old", "session:u1:new", "valid", 600)
        .await
        .unwrap());

    assert_eq!(store.get("session:u1:old").await.unwrap(), None);
    assert_eq!(
        store.get("session:u1:new").await.unwrap().as_deref(),
        Some("valid")
    );
}

// ---------------------------------------------------------------------------
// Test: rotate without an old marker creates nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rotate_without_old_marker_is_refused() {
    let store = store();

    assert!(!store
        .rotate("session:u1:old", "session:u1:new", "valid", 600)
        .await
        .unwrap());
    assert_eq!(store.get("session:u1:new").await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test: only one of two concurrent rotations of the same marker succeeds
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_rotations_have_single_winner() {
    let store = store();
    store.put("session:u1:old", "valid", 600).await.unwrap();

    let a = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .rotate("session:u1:old", "session:u1:a", "valid", 600)
                .await
                .unwrap()
        })
    };
    let b = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .rotate("session:u1:old", "session:u1:b", "valid", 600)
                .await
                .unwrap()
        })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a ^ b, "exactly one rotation must win");

    let a_live = store.get("session:u1:a").await.unwrap().is_some();
    let b_live = store.get("session:u1:b").await.unwrap().is_some();
    assert_eq!((a_live, b_live), (a, b));
}

// ---------------------------------------------------------------------------
// Test: ping always succeeds for the memory backend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_is_ok() {
    assert!(store().ping().await.is_ok());
}
