//! Neighbor preloading.
//!
//! Computes the window of items around the shown index, pins it in the
//! cache, and issues background fetches for whatever is not cached yet.
//! Preloading is best-effort: failures go to a [`PreloadObserver`] and are
//! never surfaced to the caller.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use lightbox_model::{CacheKey, MediaItem};
use tokio::task::JoinHandle;

use crate::error::CacheError;
use crate::fetch::FetchCoordinator;

/// Ring positions in issue order: `center`, then `+1, -1, +2, -2, …` out
/// to `radius`. Positions repeat once the radius passes half the ring.
fn ring_order(
    center: usize,
    radius: usize,
    len: usize,
) -> impl Iterator<Item = usize> {
    center.checked_rem(len).into_iter().flat_map(move |center| {
        std::iter::once(center).chain((1..=radius.min(len)).flat_map(
            move |offset| {
                [(center + offset) % len, (center + len - offset % len) % len]
            },
        ))
    })
}

/// Indices within `radius` of `center` on a ring of `item_count` items,
/// center included.
pub fn window_indices(
    center: usize,
    radius: usize,
    item_count: usize,
) -> BTreeSet<usize> {
    ring_order(center, radius, item_count).collect()
}

/// The keys to warm around one index, nearest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadWindow {
    pub center: usize,
    pub radius: usize,
    /// Image keys in issue order: center, then `+1, -1, +2, -2, …`.
    pub keys: Vec<CacheKey>,
}

impl PreloadWindow {
    /// Build the window over `items`. Video items are never included.
    pub fn plan(center: usize, radius: usize, items: &[MediaItem]) -> Self {
        let mut keys = Vec::new();
        let mut seen = HashSet::new();
        for idx in ring_order(center, radius, items.len()) {
            let item = &items[idx];
            if item.kind.is_image() && seen.insert(item.key.clone()) {
                keys.push(item.key.clone());
            }
        }
        Self {
            center,
            radius,
            keys,
        }
    }

    /// The window as an eviction protection set.
    pub fn protected(&self) -> HashSet<CacheKey> {
        self.keys.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Receives preload failures that are otherwise swallowed.
pub trait PreloadObserver: Send + Sync + fmt::Debug {
    fn preload_failed(&self, key: &CacheKey, error: &CacheError);
}

/// Default observer: logs and moves on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl PreloadObserver for LogObserver {
    fn preload_failed(&self, key: &CacheKey, error: &CacheError) {
        log::debug!("preload of {} failed: {}", key, error);
    }
}

/// Background fetches issued by one [`PreloadPlanner::warm`] call.
#[derive(Debug, Default)]
pub struct PreloadTicket {
    tasks: Vec<JoinHandle<Result<(), CacheError>>>,
}

/// Result of waiting on a [`PreloadTicket`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    pub warmed: usize,
    pub failed: usize,
}

impl PreloadTicket {
    /// Number of fetches this warm pass issued.
    pub fn issued(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// Wait for every issued fetch. Dropping the ticket instead detaches
    /// the fetches; they still complete and populate the cache.
    pub async fn settle(self) -> PreloadSummary {
        let mut summary = PreloadSummary::default();
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => summary.warmed += 1,
                Ok(Err(_)) | Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Issues best-effort fetches for a [`PreloadWindow`].
#[derive(Debug, Clone)]
pub struct PreloadPlanner {
    coordinator: FetchCoordinator,
    observer: Arc<dyn PreloadObserver>,
}

impl PreloadPlanner {
    pub fn new(coordinator: FetchCoordinator) -> Self {
        Self::with_observer(coordinator, Arc::new(LogObserver))
    }

    pub fn with_observer(
        coordinator: FetchCoordinator,
        observer: Arc<dyn PreloadObserver>,
    ) -> Self {
        Self {
            coordinator,
            observer,
        }
    }

    /// See [`PreloadWindow::plan`].
    pub fn plan_window(
        &self,
        center: usize,
        radius: usize,
        items: &[MediaItem],
    ) -> PreloadWindow {
        PreloadWindow::plan(center, radius, items)
    }

    /// Pin `window`, spawn a fetch for every key with no cache entry, then
    /// evict down to budget outside the window. Never waits on the network;
    /// must be called from within a tokio runtime.
    pub fn warm(&self, window: &PreloadWindow) -> PreloadTicket {
        let cache = self.coordinator.cache();
        cache.protect(window.keys.iter().cloned());

        let mut tasks = Vec::new();
        for key in &window.keys {
            if cache.contains(key) {
                continue;
            }
            let coordinator = self.coordinator.clone();
            let observer = Arc::clone(&self.observer);
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                let result = coordinator.fetch_or_get(&key).await.map(|_| ());
                if let Err(err) = &result {
                    observer.preload_failed(&key, err);
                }
                result
            }));
        }

        log::trace!(
            "preload window center={} radius={} keys={} issued={}",
            window.center,
            window.radius,
            window.keys.len(),
            tasks.len()
        );

        cache.evict_except(&window.protected());
        PreloadTicket { tasks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ByteSizedCache;
    use crate::resource::MemorySurface;
    use crate::testing::{Reply, ScriptedTransport};
    use lightbox_model::ByteSize;
    use parking_lot::Mutex;

    fn gallery(kinds: &[&str]) -> Vec<MediaItem> {
        kinds
            .iter()
            .enumerate()
            .map(|(idx, kind)| {
                let key = format!("/item/{idx}");
                match *kind {
                    "video" => MediaItem::video(key, format!("Video {idx}")),
                    _ => MediaItem::image(key, format!("Image {idx}")),
                }
            })
            .collect()
    }

    #[test]
    fn window_wraps_around_the_ring() {
        assert_eq!(
            window_indices(3, 2, 6).into_iter().collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(
            window_indices(0, 1, 5).into_iter().collect::<Vec<_>>(),
            vec![0, 1, 4]
        );
        assert_eq!(window_indices(1, 10, 3).len(), 3);
        assert!(window_indices(0, 2, 0).is_empty());
        assert_eq!(window_indices(2, 0, 4).into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn ring_order_alternates_outward() {
        assert_eq!(ring_order(0, 2, 5).collect::<Vec<_>>(), vec![0, 1, 4, 2, 3]);
        assert_eq!(ring_order(7, 1, 4).collect::<Vec<_>>(), vec![3, 0, 2]);
        assert_eq!(ring_order(1, 3, 0).count(), 0);
    }

    #[test]
    fn plan_covers_exactly_the_window_indices() {
        for (len, center, radius) in [(6, 3, 2), (5, 0, 1), (3, 1, 10), (4, 2, 0), (7, 9, 3)] {
            let items = gallery(&vec!["image"; len]);
            let window = PreloadWindow::plan(center, radius, &items);
            let planned: BTreeSet<usize> = window
                .keys
                .iter()
                .map(|key| items.iter().position(|item| &item.key == key).unwrap())
                .collect();
            assert_eq!(planned, window_indices(center, radius, len), "len {len} center {center}");
            assert_eq!(window.keys[0], items[center % len].key);
        }
    }

    #[test]
    fn plan_orders_nearest_first_and_skips_video() {
        let items = gallery(&["image", "image", "video", "image", "image", "image"]);
        let window = PreloadWindow::plan(3, 2, &items);
        let keys: Vec<&str> = window.keys.iter().map(CacheKey::as_str).collect();
        assert_eq!(keys, vec!["/item/3", "/item/4", "/item/5", "/item/1"]);
    }

    #[test]
    fn plan_skips_video_center() {
        let items = gallery(&["image", "video", "image"]);
        let window = PreloadWindow::plan(1, 1, &items);
        assert!(!window.protected().contains(&CacheKey::from("/item/1")));
        assert_eq!(window.keys.len(), 2);
    }

    #[derive(Debug, Default)]
    struct CollectingObserver {
        failed: Mutex<Vec<CacheKey>>,
    }

    impl PreloadObserver for CollectingObserver {
        fn preload_failed(&self, key: &CacheKey, _error: &CacheError) {
            self.failed.lock().push(key.clone());
        }
    }

    #[tokio::test]
    async fn warm_fetches_missing_keys_and_reports_failures() {
        let items = gallery(&["image", "image", "image", "image"]);
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply("/item/0", Reply::image(10));
        transport.reply("/item/1", Reply::image(10));
        transport.reply("/item/3", Reply::Status(500));
        // "/item/2" is unscripted and answers 404.

        let surface = Arc::new(MemorySurface::new());
        let cache = Arc::new(ByteSizedCache::new(ByteSize::from_kib(1), surface));
        let coordinator = FetchCoordinator::new(cache.clone(), transport.clone());
        coordinator.fetch_or_get(&CacheKey::from("/item/0")).await.unwrap();

        let observer = Arc::new(CollectingObserver::default());
        let planner = PreloadPlanner::with_observer(coordinator, observer.clone());
        let window = planner.plan_window(0, 2, &items);
        let ticket = planner.warm(&window);
        assert_eq!(ticket.issued(), 3);

        let summary = ticket.settle().await;
        assert_eq!(summary, PreloadSummary { warmed: 1, failed: 2 });
        let mut failed = observer.failed.lock().clone();
        failed.sort();
        assert_eq!(failed, vec![CacheKey::from("/item/2"), CacheKey::from("/item/3")]);
        assert_eq!(transport.calls_for(&CacheKey::from("/item/0")), 1);
        assert_eq!(cache.stats().pinned, window.protected());
    }

    #[tokio::test]
    async fn warm_evicts_outside_the_window() {
        let items = gallery(&["image"; 8]);
        let transport = Arc::new(ScriptedTransport::new());
        for item in &items {
            transport.reply(item.key.clone(), Reply::image(100));
        }
        let surface = Arc::new(MemorySurface::new());
        let cache = Arc::new(ByteSizedCache::new(ByteSize::from_bytes(1_000), surface.clone()));
        let coordinator = FetchCoordinator::new(cache.clone(), transport);
        for item in &items[4..8] {
            coordinator.fetch_or_get(&item.key).await.unwrap();
        }

        cache.set_budget(ByteSize::from_bytes(300));
        // 4..8 resident at 400 bytes would already have been trimmed to 300.
        assert_eq!(cache.resident_bytes().as_bytes(), 300);

        let planner = PreloadPlanner::new(coordinator);
        let window = planner.plan_window(1, 1, &items);
        planner.warm(&window).settle().await;

        for key in window.keys.iter() {
            assert!(cache.contains(key), "window key {key} evicted");
        }
        assert!(cache.resident_bytes().as_bytes() <= 300);
        assert_eq!(surface.live_count(), 3);
    }
}
