//! A failed refresh leaves the local book and the cache file untouched and
//! surfaces the failure through the sync status.

use std::sync::Arc;
use std::time::Duration;

use tm_engine::{EngineOptions, LocalCache, MarketEngine, SyncOptions};
use tm_negotiation::OfferFilter;
use tm_sync::RemoteSyncError;
use tm_testkit::{actor, file_options, new_offer, FlakyRemoteStore, FAST_PUSH};

fn options(dir: &std::path::Path, store: Arc<FlakyRemoteStore>, timeout: Duration) -> EngineOptions {
    EngineOptions {
        sync: Some(SyncOptions {
            store,
            push: FAST_PUSH,
            timeout,
        }),
        ..file_options(dir)
    }
}

#[tokio::test]
async fn failed_pull_keeps_local_state_and_cache() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyRemoteStore::new());
    let engine = MarketEngine::bootstrap(options(dir.path(), store.clone(), Duration::from_secs(2)))
        .await
        .unwrap();

    let admin = actor();
    engine.set_open(true, &admin);
    let o = engine
        .create_offer(new_offer("p1", "ajax", "psv", 500), &admin)
        .unwrap();
    engine.wait_for_pushes().await;

    let cache = LocalCache::new(dir.path().join("market.json")).unwrap();
    let before = cache.load().unwrap().unwrap();

    store.fail_pull(true);
    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(err, RemoteSyncError::Unavailable(_)));

    assert_eq!(cache.load().unwrap().unwrap(), before);
    assert!(engine.get_offer(o.id).is_some());
    assert!(engine.is_open());

    let status = engine.sync_status();
    assert_eq!(status.last_refresh_ok, Some(false));
    assert!(status.last_error.unwrap().contains("injected pull failure"));

    // Recovery: the next refresh succeeds and clears the error.
    store.fail_pull(false);
    engine.refresh().await.unwrap();
    let status = engine.sync_status();
    assert_eq!(status.last_refresh_ok, Some(true));
    assert!(status.last_error.is_none());
    assert_eq!(engine.list_offers(&OfferFilter::all()).len(), 1);
}

#[tokio::test]
async fn slow_remote_times_out_without_touching_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyRemoteStore::new());
    let engine = MarketEngine::bootstrap(options(dir.path(), store.clone(), Duration::from_millis(50)))
        .await
        .unwrap();
    engine.set_open(true, &actor());
    engine.wait_for_pushes().await;

    store.delay_pull(Duration::from_millis(500));
    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(err, RemoteSyncError::Timeout(_)));
    assert!(engine.is_open());
}

#[tokio::test]
async fn bootstrap_with_unreachable_remote_starts_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let offer_id = {
        let e = MarketEngine::bootstrap(file_options(dir.path())).await.unwrap();
        e.set_open(true, "admin");
        e.create_offer(new_offer("p1", "ajax", "psv", 500), "psv-admin")
            .unwrap()
            .id
    };

    let store = Arc::new(FlakyRemoteStore::new());
    store.fail_pull(true);
    let e = MarketEngine::bootstrap(options(dir.path(), store, Duration::from_secs(2)))
        .await
        .unwrap();

    assert!(e.is_open());
    assert!(e.get_offer(offer_id).is_some());
    assert_eq!(e.sync_status().last_refresh_ok, Some(false));
}
