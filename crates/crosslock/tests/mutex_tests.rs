//! Mutex façade semantics, exercised against an in-memory backend.

mod common;

use std::time::{Duration, Instant};

use crosslock::{LockError, LockName, Mutex};

use common::MemoryStore;

fn mutex(store: &MemoryStore, name: &str) -> Mutex {
    Mutex::new(LockName::new(name).unwrap(), store.backend())
}

#[tokio::test]
async fn acquire_release_cycle() {
    let store = MemoryStore::new();
    let mut mutex = mutex(&store, "cycle");

    assert!(!mutex.is_acquired());
    assert!(mutex.acquire(Duration::ZERO).await.unwrap());
    assert!(mutex.is_acquired());
    assert!(mutex.lease().is_some());
    assert!(mutex.is_locked().await.unwrap());

    assert!(mutex.release().await.unwrap());
    assert!(!mutex.is_acquired());
    assert!(mutex.lease().is_none());
    assert!(!mutex.is_locked().await.unwrap());

    // Release makes the lock acquirable again, by anyone.
    assert!(mutex.acquire(Duration::ZERO).await.unwrap());
    assert!(mutex.release().await.unwrap());
}

#[tokio::test]
async fn mutual_exclusion_between_holders() {
    let store = MemoryStore::new();
    let mut first = mutex(&store, "exclusive");
    let mut second = mutex(&store, "exclusive");

    assert!(first.acquire(Duration::ZERO).await.unwrap());
    assert!(!second.acquire(Duration::ZERO).await.unwrap());
    assert!(
        !second
            .acquire(Duration::from_millis(120))
            .await
            .unwrap()
    );

    assert!(first.release().await.unwrap());
    assert!(second.acquire(Duration::ZERO).await.unwrap());
    assert!(second.release().await.unwrap());
}

#[tokio::test]
async fn locks_with_different_names_are_independent() {
    let store = MemoryStore::new();
    let mut report = mutex(&store, "nightly-report");
    let mut cleanup = mutex(&store, "nightly-cleanup");

    assert!(report.acquire(Duration::ZERO).await.unwrap());
    assert!(cleanup.acquire(Duration::ZERO).await.unwrap());

    assert!(report.release().await.unwrap());
    assert!(cleanup.release().await.unwrap());
}

#[tokio::test]
async fn double_acquire_is_misuse() {
    let store = MemoryStore::new();
    let mut mutex = mutex(&store, "double");

    assert!(mutex.acquire(Duration::ZERO).await.unwrap());
    let err = mutex.acquire(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, LockError::AlreadyHeld(name) if name == "double"));

    // The original lease is untouched by the failed call.
    assert!(mutex.is_acquired());
    assert!(mutex.release().await.unwrap());
}

#[tokio::test]
async fn release_and_renew_without_lease_are_misuse() {
    let store = MemoryStore::new();
    let mut mutex = mutex(&store, "unheld");

    assert!(matches!(
        mutex.release().await.unwrap_err(),
        LockError::NotOwned(_)
    ));
    assert!(matches!(
        mutex.renew(Duration::from_secs(30)).await.unwrap_err(),
        LockError::NotOwned(_)
    ));
}

#[tokio::test]
async fn expired_lease_is_taken_over_and_stale_release_reports_false() {
    let store = MemoryStore::new();
    let mut crashed = mutex(&store, "takeover").with_lease_ttl(Duration::from_millis(40));
    let mut successor = mutex(&store, "takeover");

    assert!(crashed.acquire(Duration::ZERO).await.unwrap());
    tokio::time::sleep(Duration::from_millis(80)).await;

    // TTL self-healing: the abandoned lease no longer blocks anyone.
    assert!(successor.acquire(Duration::ZERO).await.unwrap());

    // The stale holder's release must not disturb the new lease.
    assert!(!crashed.release().await.unwrap());
    assert!(successor.is_acquired());
    assert!(successor.is_locked().await.unwrap());
    assert!(successor.release().await.unwrap());
}

#[tokio::test]
async fn renew_extends_the_lease() {
    let store = MemoryStore::new();
    let mut holder = mutex(&store, "renewed").with_lease_ttl(Duration::from_millis(100));
    let mut contender = mutex(&store, "renewed");

    assert!(holder.acquire(Duration::ZERO).await.unwrap());
    assert!(holder.renew(Duration::from_millis(500)).await.unwrap());

    // Well past the original TTL, the renewed lease still holds.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!contender.acquire(Duration::ZERO).await.unwrap());

    let remaining = holder.lease().unwrap().remaining().unwrap();
    assert!(remaining > Duration::from_millis(200));
    assert!(holder.release().await.unwrap());
}

#[tokio::test]
async fn lost_renewal_clears_the_lease() {
    let store = MemoryStore::new();
    let mut stale = mutex(&store, "lost").with_lease_ttl(Duration::from_millis(40));
    let mut successor = mutex(&store, "lost");

    assert!(stale.acquire(Duration::ZERO).await.unwrap());
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(successor.acquire(Duration::ZERO).await.unwrap());

    assert!(!stale.renew(Duration::from_secs(30)).await.unwrap());
    assert!(!stale.is_acquired());
    // After the lost renewal the state machine is back at unlocked, so a
    // release is now misuse rather than a stale-token no-op.
    assert!(matches!(
        stale.release().await.unwrap_err(),
        LockError::NotOwned(_)
    ));

    assert!(successor.release().await.unwrap());
}

#[tokio::test]
async fn each_acquisition_gets_a_fresh_token() {
    let store = MemoryStore::new();
    let mut mutex = mutex(&store, "tokens");

    assert!(mutex.acquire(Duration::ZERO).await.unwrap());
    let first = mutex.lease().unwrap().token().clone();
    assert_eq!(store.holder("tokens").as_deref(), Some(first.as_str()));
    assert!(mutex.release().await.unwrap());

    assert!(mutex.acquire(Duration::ZERO).await.unwrap());
    let second = mutex.lease().unwrap().token().clone();
    assert_ne!(first, second);
    assert!(mutex.release().await.unwrap());
}

#[tokio::test]
async fn blocking_acquire_wakes_when_holder_releases() {
    let store = MemoryStore::new();
    let mut holder = mutex(&store, "handoff");
    let mut waiter = mutex(&store, "handoff").with_poll_interval(Duration::from_millis(10));

    assert!(holder.acquire(Duration::ZERO).await.unwrap());

    let waiting = tokio::spawn(async move {
        let acquired = waiter.acquire(Duration::from_secs(2)).await.unwrap();
        (acquired, waiter)
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(holder.release().await.unwrap());

    let started = Instant::now();
    let (acquired, mut waiter) = waiting.await.unwrap();
    assert!(acquired);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(waiter.release().await.unwrap());
}

#[tokio::test]
async fn zero_ttl_on_an_expiring_backend_is_rejected() {
    let store = MemoryStore::new();
    let mut mutex = mutex(&store, "zero-ttl").with_lease_ttl(Duration::ZERO);

    assert!(matches!(
        mutex.acquire(Duration::ZERO).await.unwrap_err(),
        LockError::InvalidConfig(_)
    ));
}
