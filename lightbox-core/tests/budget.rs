use std::collections::HashSet;
use std::sync::Arc;

use lightbox_core::testing::{Reply, ScriptedTransport};
use lightbox_core::{ByteSize, ByteSizedCache, CacheError, CacheKey, FetchCoordinator, MemorySurface};

fn setup(budget: u64) -> (FetchCoordinator, Arc<ScriptedTransport>, Arc<MemorySurface>) {
    let transport = Arc::new(ScriptedTransport::new());
    let surface = Arc::new(MemorySurface::new());
    let cache = Arc::new(ByteSizedCache::new(ByteSize::from_bytes(budget), surface.clone()));
    (FetchCoordinator::new(cache, transport.clone()), transport, surface)
}

#[tokio::test]
async fn protected_entries_hold_the_budget_open() {
    let (coordinator, transport, surface) = setup(100);
    let (a, b, c) = (CacheKey::from("A"), CacheKey::from("B"), CacheKey::from("C"));
    for key in [&a, &b, &c] {
        transport.reply(key.clone(), Reply::image(60));
    }
    let cache = coordinator.cache();

    cache.protect([a.clone()]);
    coordinator.fetch_or_get(&a).await.unwrap();
    coordinator.fetch_or_get(&b).await.unwrap();
    assert_eq!(cache.resident_bytes().as_bytes(), 120);
    assert_eq!(cache.len(), 2);

    coordinator.fetch_or_get(&c).await.unwrap();
    let resident: HashSet<_> = [&a, &b, &c]
        .into_iter()
        .filter(|key| cache.contains(key))
        .cloned()
        .collect();
    assert_eq!(resident, HashSet::from([a.clone(), c.clone()]));
    assert_eq!(cache.resident_bytes().as_bytes(), 120);
    assert_eq!(surface.live_count(), 2);

    // Nothing unprotected is left to evict.
    let report = cache.evict_except(&HashSet::from([c.clone()]));
    assert!(report.evicted.is_empty());
    assert!(report.over_budget());

    // Lifting protection lets the next pass reach the budget.
    cache.protect(Vec::<CacheKey>::new());
    let report = cache.evict_except(&HashSet::new());
    assert_eq!(report.evicted, vec![a.clone()]);
    assert_eq!(cache.resident_bytes().as_bytes(), 60);
}

#[tokio::test]
async fn many_concurrent_requesters_share_one_fetch() {
    let (coordinator, transport, _surface) = setup(10_000);
    let key = CacheKey::from("/shared.jpg");
    let gate = transport.gated(key.clone(), Reply::image(100));

    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = coordinator.clone();
            let key = key.clone();
            tokio::spawn(async move { coordinator.fetch_or_get(&key).await })
        })
        .collect();

    transport.wait_for_calls(&key, 1).await;
    gate.open();

    let mut handles = Vec::new();
    for waiter in waiters {
        handles.push(waiter.await.unwrap().unwrap());
    }
    assert!(handles.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(transport.calls_for(&key), 1);
    assert_eq!(coordinator.in_flight_len(), 0);
}

#[tokio::test]
async fn concurrent_requesters_all_see_the_failure() {
    let (coordinator, transport, _surface) = setup(10_000);
    let key = CacheKey::from("/gone.jpg");
    let gate = transport.gated(key.clone(), Reply::Status(410));

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let coordinator = coordinator.clone();
            let key = key.clone();
            tokio::spawn(async move { coordinator.fetch_or_get(&key).await })
        })
        .collect();
    transport.wait_for_calls(&key, 1).await;
    gate.open();

    for waiter in waiters {
        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err.status_code(), Some(410));
    }
    assert!(matches!(
        coordinator.fetch_or_get(&key).await,
        Err(CacheError::CachedFailure(_))
    ));
    assert_eq!(transport.calls_for(&key), 1);
}

#[tokio::test]
async fn resident_bytes_track_live_handles() {
    let (coordinator, transport, surface) = setup(250);
    let sizes = [90usize, 10, 120, 70, 5, 200, 30];
    for (idx, len) in sizes.iter().enumerate() {
        transport.reply(format!("/k/{idx}"), Reply::image(*len));
    }
    transport.reply("/bad", Reply::Status(500));

    for idx in 0..sizes.len() {
        coordinator
            .fetch_or_get(&CacheKey::from(format!("/k/{idx}")))
            .await
            .unwrap();
        let _ = coordinator.fetch_or_get(&CacheKey::from("/bad")).await;

        let held: u64 = (0..sizes.len())
            .filter_map(|other| coordinator.cache().peek(&CacheKey::from(format!("/k/{other}"))))
            .map(|entry| entry.size().as_bytes())
            .sum();
        assert_eq!(coordinator.cache().resident_bytes().as_bytes(), held);
        assert!(coordinator.cache().resident_bytes().as_bytes() <= 250);
    }
    assert_eq!(surface.live_count(), coordinator.cache().len() - 1);
}
