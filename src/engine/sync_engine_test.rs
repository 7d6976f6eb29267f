use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use mockall::Sequence;
use tokio::time::sleep;

use super::EngineBuilder;
use super::SyncEngine;
use crate::network::LongPollOutcome;
use crate::network::MockRemoteConfigSource;
use crate::network::NotificationChange;
use crate::storage::MockFallbackStore;
use crate::BackoffPolicy;
use crate::ConfigSnapshot;
use crate::NetworkError;
use crate::Settings;

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.sync.app_id = "demo-app".to_string();
    settings.sync.namespaces = vec!["application".to_string()];
    settings.sync.long_poll_timeout_in_secs = 1;
    settings.retry.fetch = BackoffPolicy {
        max_retries: 1,
        timeout_ms: 1000,
        base_delay_ms: 10,
        max_delay_ms: 50,
    };
    settings
}

fn engine_with(source: MockRemoteConfigSource, store: MockFallbackStore) -> SyncEngine {
    EngineBuilder::new(test_settings())
        .remote_source(Arc::new(source))
        .fallback_store(Arc::new(store))
        .build()
        .expect("engine should build")
}

fn snapshot_with(pairs: &[(&str, &str)], release_key: &str) -> ConfigSnapshot {
    let configurations: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ConfigSnapshot::new(configurations, release_key)
}

fn changed(namespace: &str, id: i64) -> LongPollOutcome {
    LongPollOutcome::Changed(vec![NotificationChange {
        namespace: namespace.to_string(),
        notification_id: id,
    }])
}

/// Case 1: the very first read performs exactly one blocking populate
#[tokio::test]
async fn test_first_read_blocking_populate_case1() {
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .times(1)
        .withf(|notifications| {
            notifications.len() == 1 && notifications[0] == ("application".to_string(), -1)
        })
        .returning(|_| Ok(changed("application", 5)));
    source
        .expect_fetch_uncached()
        .times(1)
        .withf(|namespace| namespace == "application")
        .returning(|_| Ok(snapshot_with(&[("timeout", "30")], "rk-5")));
    let mut store = MockFallbackStore::new();
    store.expect_write().returning(|_, _| Ok(()));

    let engine = engine_with(source, store);

    let value = engine.get_value("application", "timeout", "0", false).await;
    assert_eq!(value, "30");

    // the warm cache answers the second read; the mock panics on extra calls
    let value = engine.get_value("application", "timeout", "0", false).await;
    assert_eq!(value, "30");

    assert_eq!(engine.inner.tracker.get("application"), Some(5));
}

/// Case 2: concurrent first reads of one namespace populate it only once
#[tokio::test]
async fn test_first_read_blocking_populate_case2() {
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .times(1)
        .returning(|_| Ok(changed("application", 5)));
    source
        .expect_fetch_uncached()
        .times(1)
        .returning(|_| Ok(snapshot_with(&[("timeout", "30")], "rk-5")));
    let mut store = MockFallbackStore::new();
    store.expect_write().returning(|_, _| Ok(()));

    let engine = engine_with(source, store);

    let left = engine.clone();
    let right = engine.clone();
    let (a, b) = tokio::join!(
        left.get_value("application", "timeout", "0", false),
        right.get_value("application", "timeout", "0", false),
    );
    assert_eq!(a, "30");
    assert_eq!(b, "30");
}

#[tokio::test]
async fn test_missing_key_returns_default_without_network() {
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .times(1)
        .returning(|_| Ok(changed("application", 3)));
    source
        .expect_fetch_uncached()
        .times(1)
        .returning(|_| Ok(snapshot_with(&[("a", "1")], "rk-3")));
    let mut store = MockFallbackStore::new();
    store.expect_write().returning(|_, _| Ok(()));

    let engine = engine_with(source, store);

    assert_eq!(engine.get_value("application", "a", "0", false).await, "1");
    // no expect_fetch_cached is registered: any network call would panic
    assert_eq!(engine.get_value("application", "b", "x", false).await, "x");
    assert_eq!(engine.get("application", "b").await, None);
}

/// Case 1: a cache miss with auto-fetch hits the cached endpoint once
#[tokio::test]
async fn test_fetch_on_miss_case1() {
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .times(1)
        .returning(|_| Ok(LongPollOutcome::NoChange));
    source
        .expect_fetch_cached()
        .times(1)
        .withf(|namespace| namespace == "application")
        .returning(|_| Ok(snapshot_with(&[("b", "2")], "")));
    let mut store = MockFallbackStore::new();
    store.expect_write().returning(|_, _| Ok(()));

    let engine = engine_with(source, store);

    assert_eq!(engine.get_value("application", "b", "x", true).await, "2");
    // the fetched snapshot is now the published one
    assert_eq!(engine.get_value("application", "b", "x", false).await, "2");
}

/// Case 2: a failed auto-fetch falls back to the disk record, then the default
#[tokio::test]
async fn test_fetch_on_miss_case2() {
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .times(1)
        .returning(|_| Ok(LongPollOutcome::NoChange));
    source
        .expect_fetch_cached()
        .times(2)
        .returning(|_| Err(NetworkError::Server { status: 500 }));
    let mut store = MockFallbackStore::new();
    store
        .expect_read()
        .times(2)
        .withf(|namespace| namespace == "application")
        .returning(|_| Ok(Some(snapshot_with(&[("b", "7")], "rk-disk"))));

    let engine = engine_with(source, store);

    assert_eq!(engine.get_value("application", "b", "x", true).await, "7");
    assert_eq!(engine.get_value("application", "c", "x", true).await, "x");
}

/// Remote is fully down but disk holds a prior snapshot: reads serve the disk value
#[tokio::test]
async fn test_fallback_on_total_outage() {
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .returning(|_| Err(NetworkError::Timeout(Duration::from_secs(1))));
    let mut store = MockFallbackStore::new();
    store
        .expect_read()
        .withf(|namespace| namespace == "application")
        .returning(|_| Ok(Some(snapshot_with(&[("timeout", "30")], "rk-disk"))));

    let engine = engine_with(source, store);

    let value = engine.get_value("application", "timeout", "0", false).await;
    assert_eq!(value, "30");
}

#[tokio::test]
async fn test_notification_convergence() {
    let mut seq = Sequence::new();
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(LongPollOutcome::NoChange));
    source
        .expect_long_poll()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(changed("application", 5)));
    source
        .expect_fetch_uncached()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(snapshot_with(&[("v", "first")], "rk-5")));
    source
        .expect_long_poll()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(LongPollOutcome::NoChange));
    source
        .expect_long_poll()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(changed("application", 6)));
    source
        .expect_fetch_uncached()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(snapshot_with(&[("v", "second")], "rk-6")));
    let mut store = MockFallbackStore::new();
    store.expect_write().returning(|_, _| Ok(()));

    let engine = engine_with(source, store);
    engine
        .inner
        .cache
        .entry_or_register("application", &engine.inner.tracker);

    for _ in 0..4 {
        engine.inner.poll_once().await.expect("poll should succeed");
    }

    assert_eq!(engine.inner.tracker.get("application"), Some(6));
    let snapshot = engine.inner.cache.get("application").unwrap();
    assert_eq!(snapshot.get("v"), Some("second"));
    assert_eq!(snapshot.release_key, "rk-6");
}

/// Every namespace of one changed response is refreshed in the same cycle
#[tokio::test]
async fn test_full_batch_processing() {
    let mut source = MockRemoteConfigSource::new();
    source.expect_long_poll().times(1).returning(|_| {
        Ok(LongPollOutcome::Changed(vec![
            NotificationChange {
                namespace: "application".to_string(),
                notification_id: 5,
            },
            NotificationChange {
                namespace: "app.yaml".to_string(),
                notification_id: 7,
            },
        ]))
    });
    source
        .expect_fetch_uncached()
        .times(1)
        .withf(|namespace| namespace == "application")
        .returning(|_| Ok(snapshot_with(&[("a", "1")], "rk-a")));
    source
        .expect_fetch_uncached()
        .times(1)
        .withf(|namespace| namespace == "app.yaml")
        .returning(|_| Ok(snapshot_with(&[("content", "a: 1")], "rk-y")));
    let mut store = MockFallbackStore::new();
    store.expect_write().times(2).returning(|_, _| Ok(()));

    let engine = engine_with(source, store);
    engine
        .inner
        .cache
        .entry_or_register("application", &engine.inner.tracker);

    engine.inner.poll_once().await.expect("poll should succeed");

    assert_eq!(engine.inner.tracker.get("application"), Some(5));
    assert_eq!(engine.inner.tracker.get("app.yaml"), Some(7));
    assert_eq!(
        engine.inner.cache.get("app.yaml").unwrap().get("content"),
        Some("a: 1")
    );
}

/// A refresh that exhausts its retry budget leaves the tracker id untouched
#[tokio::test]
async fn test_failed_refresh_keeps_notification_id() {
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .times(1)
        .returning(|_| Ok(changed("application", 5)));
    source
        .expect_fetch_uncached()
        .times(1)
        .returning(|_| Err(NetworkError::Server { status: 500 }));
    let mut store = MockFallbackStore::new();
    store.expect_read().returning(|_| Ok(None));

    let engine = engine_with(source, store);
    engine
        .inner
        .cache
        .entry_or_register("application", &engine.inner.tracker);

    engine.inner.poll_once().await.expect("poll should succeed");

    // the next cycle re-sends -1 and the server re-delivers the change
    assert_eq!(engine.inner.tracker.get("application"), Some(-1));
}

#[tokio::test]
async fn test_change_callback_dispatch() {
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .times(1)
        .returning(|_| Ok(changed("application", 5)));
    source
        .expect_fetch_uncached()
        .times(1)
        .returning(|_| Ok(snapshot_with(&[("a", "1")], "rk-5")));
    let mut store = MockFallbackStore::new();
    store.expect_write().returning(|_, _| Ok(()));

    let events: Arc<parking_lot::Mutex<Vec<(String, String)>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = events.clone();

    let engine = EngineBuilder::new(test_settings())
        .remote_source(Arc::new(source))
        .fallback_store(Arc::new(store))
        .on_change(move |namespace, snapshot| {
            sink.lock()
                .push((namespace.to_string(), snapshot.release_key.clone()));
        })
        .build()
        .expect("engine should build");
    engine
        .inner
        .cache
        .entry_or_register("application", &engine.inner.tracker);

    engine.inner.poll_once().await.expect("poll should succeed");

    let events = events.lock();
    assert_eq!(
        *events,
        vec![("application".to_string(), "rk-5".to_string())]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_graceful_stop() {
    let mut source = MockRemoteConfigSource::new();
    source.expect_long_poll().returning(|_| {
        // stand-in for the server holding the connection open
        std::thread::sleep(Duration::from_millis(20));
        Ok(LongPollOutcome::NoChange)
    });
    let store = MockFallbackStore::new();

    let engine = engine_with(source, store);
    engine.start().await.expect("engine should start");
    assert!(!engine.is_stopped());

    // restart is not supported
    assert!(engine.start().await.is_err());

    engine.stop();
    assert!(engine.is_stopping());

    let deadline = Instant::now() + Duration::from_secs(2);
    while !engine.is_stopped() && Instant::now() < deadline {
        sleep(Duration::from_millis(10)).await;
    }
    assert!(engine.is_stopped());
}

/// Start with an unreachable remote: the preload namespaces come from disk
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_seeds_from_disk_on_outage() {
    let mut source = MockRemoteConfigSource::new();
    source
        .expect_long_poll()
        .returning(|_| Err(NetworkError::Timeout(Duration::from_secs(1))));
    let mut store = MockFallbackStore::new();
    store.expect_load_all().returning(|| {
        let mut records = HashMap::new();
        records.insert(
            "application".to_string(),
            snapshot_with(&[("timeout", "30")], "rk-disk"),
        );
        Ok(records)
    });

    let engine = engine_with(source, store);
    engine.start().await.expect("engine should start");

    // already synced from disk: this read must not block on the network
    let value = engine.get_value("application", "timeout", "0", false).await;
    assert_eq!(value, "30");

    engine.stop();
    let deadline = Instant::now() + Duration::from_secs(3);
    while !engine.is_stopped() && Instant::now() < deadline {
        sleep(Duration::from_millis(10)).await;
    }
    assert!(engine.is_stopped());
}
