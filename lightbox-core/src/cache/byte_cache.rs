use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use lightbox_model::{ByteSize, CacheKey};
use log::{debug, info, warn};
use parking_lot::Mutex;

use super::entry::CacheEntry;
use crate::error::{CacheError, FetchError};
use crate::resource::{ResourceHandle, ResourceSurface};

/// Key to resource store with a hard byte budget.
///
/// Invariant: `resident` equals the summed size of every entry that holds a
/// handle. Negative entries hold no bytes and are never evicted; only
/// [`ByteSizedCache::invalidate`] clears them.
pub struct ByteSizedCache {
    state: Mutex<CacheState>,
    surface: Arc<dyn ResourceSurface>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    resident: ByteSize,
    budget: ByteSize,
    /// Keys shielded from every eviction pass until the next `protect`.
    pinned: HashSet<CacheKey>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove_and_account(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.resident = self.resident.saturating_sub(entry.resident_bytes());
        Some(entry)
    }

    /// Evict least-recently-used unprotected entries until resident bytes
    /// fit the budget. Returns the released handles for the caller to
    /// reclaim once the lock is dropped.
    fn evict(
        &mut self,
        protected: &HashSet<CacheKey>,
        extra: Option<&CacheKey>,
    ) -> (EvictionReport, Vec<ResourceHandle>) {
        let mut released = Vec::new();
        let mut report = EvictionReport::default();

        if self.resident > self.budget {
            let mut candidates: Vec<(u64, CacheKey)> = self
                .entries
                .iter()
                .filter(|(key, entry)| {
                    entry.handle.is_some()
                        && !protected.contains(*key)
                        && !self.pinned.contains(*key)
                        && extra != Some(*key)
                })
                .map(|(key, entry)| (entry.recency, key.clone()))
                .collect();
            candidates.sort_unstable_by_key(|(recency, _)| *recency);

            for (_, key) in candidates {
                if self.resident <= self.budget {
                    break;
                }
                if let Some(entry) = self.remove_and_account(&key) {
                    report.freed = report.freed.saturating_add(entry.size);
                    if let Some(handle) = entry.handle {
                        released.push(handle);
                    }
                    report.evicted.push(key);
                }
            }
        }

        report.resident = self.resident;
        report.budget = self.budget;
        (report, released)
    }
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Keys evicted, least recently used first.
    pub evicted: Vec<CacheKey>,
    pub freed: ByteSize,
    pub resident: ByteSize,
    pub budget: ByteSize,
}

impl EvictionReport {
    /// True when the pass ran out of unprotected candidates.
    pub fn over_budget(&self) -> bool {
        self.resident > self.budget
    }
}

/// Read-only snapshot of the cache for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub negative_entries: usize,
    pub resident: ByteSize,
    pub budget: ByteSize,
    pub pinned: HashSet<CacheKey>,
}

impl ByteSizedCache {
    pub fn new(budget: ByteSize, surface: Arc<dyn ResourceSurface>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                budget,
                ..CacheState::default()
            }),
            surface,
        }
    }

    pub fn surface(&self) -> &Arc<dyn ResourceSurface> {
        &self.surface
    }

    /// Cached handle for `key` without network access.
    ///
    /// A negative entry is reported as [`CacheError::CachedFailure`].
    pub fn get(&self, key: &CacheKey) -> Result<ResourceHandle, CacheError> {
        match self.lookup(key) {
            Some(Ok(handle)) => Ok(handle),
            Some(Err(err)) => Err(CacheError::CachedFailure(err)),
            None => Err(CacheError::NotCached(key.clone())),
        }
    }

    /// Stored outcome for `key`, if any. Hits refresh recency.
    pub fn lookup(
        &self,
        key: &CacheKey,
    ) -> Option<Result<ResourceHandle, FetchError>> {
        let mut state = self.state.lock();
        let recency = state.tick();
        let entry = state.entries.get_mut(key)?;
        if entry.handle.is_some() {
            entry.last_used_at = Instant::now();
            entry.recency = recency;
            debug!("cache hit: {}", key);
        }
        Some(entry.outcome())
    }

    /// True when any entry, positive or negative, exists for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Copy of the entry for `key` without touching its recency.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Insert a fetched outcome and enforce the budget.
    ///
    /// The inserted key is shielded from this pass alongside the pinned set,
    /// so the handle handed back to the requester is never released first.
    pub fn store(&self, key: CacheKey, mut entry: CacheEntry) -> EvictionReport {
        let (report, mut released) = {
            let mut state = self.state.lock();
            let mut released = Vec::new();
            if let Some(previous) = state.remove_and_account(&key)
                && let Some(handle) = previous.handle
            {
                released.push(handle);
            }
            entry.recency = state.tick();
            entry.last_used_at = Instant::now();
            state.resident = state.resident.saturating_add(entry.resident_bytes());
            debug!(
                "cache store: {} ({}, status {}, resident {} / {})",
                key,
                entry.size,
                entry.status,
                state.resident,
                state.budget
            );
            state.entries.insert(key.clone(), entry);
            let (report, evicted) = state.evict(&HashSet::new(), Some(&key));
            released.extend(evicted);
            (report, released)
        };
        self.release_all(&mut released);
        self.log_eviction(&report);
        report
    }

    /// Replace the pinned protection set.
    pub fn protect<I>(&self, keys: I)
    where
        I: IntoIterator<Item = CacheKey>,
    {
        let mut state = self.state.lock();
        state.pinned = keys.into_iter().collect();
    }

    /// Evict least-recently-used entries outside `protected` (and the pinned
    /// set) until resident bytes fit the budget.
    ///
    /// If every resident entry is protected the budget stays exceeded.
    pub fn evict_except(&self, protected: &HashSet<CacheKey>) -> EvictionReport {
        let (report, mut released) = self.state.lock().evict(protected, None);
        self.release_all(&mut released);
        self.log_eviction(&report);
        report
    }

    /// Change the budget and immediately evict down to it.
    pub fn set_budget(&self, budget: ByteSize) -> EvictionReport {
        self.state.lock().budget = budget;
        self.evict_except(&HashSet::new())
    }

    pub fn budget(&self) -> ByteSize {
        self.state.lock().budget
    }

    pub fn resident_bytes(&self) -> ByteSize {
        self.state.lock().resident
    }

    /// Drop the entry for `key`, positive or negative. This is the only way
    /// a recorded failure is cleared.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.state.lock().remove_and_account(key);
        match removed {
            Some(entry) => {
                if let Some(handle) = entry.handle {
                    self.surface.release(&handle);
                }
                debug!("cache invalidate: {}", key);
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            negative_entries: state
                .entries
                .values()
                .filter(|entry| entry.is_negative())
                .count(),
            resident: state.resident,
            budget: state.budget,
            pinned: state.pinned.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release_all(&self, handles: &mut Vec<ResourceHandle>) {
        for handle in handles.drain(..) {
            self.surface.release(&handle);
        }
    }

    fn log_eviction(&self, report: &EvictionReport) {
        if !report.evicted.is_empty() {
            info!(
                "Media cache cap: evicted {} entries (~{}) => {} / {}",
                report.evicted.len(),
                report.freed,
                report.resident,
                report.budget,
            );
        }
        if report.over_budget() {
            warn!(
                "Media cache over budget with no unprotected entries left: {} / {}",
                report.resident, report.budget,
            );
        }
    }
}

impl fmt::Debug for ByteSizedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ByteSizedCache")
            .field("entries", &state.entries.len())
            .field("resident", &state.resident)
            .field("budget", &state.budget)
            .field("surface", &self.surface)
            .finish()
    }
}

impl Drop for ByteSizedCache {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for (_, entry) in state.entries.drain() {
            if let Some(handle) = entry.handle {
                self.surface.release(&handle);
            }
        }
        state.resident = ByteSize::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemorySurface;

    fn cache(budget: u64) -> (ByteSizedCache, Arc<MemorySurface>) {
        let surface = Arc::new(MemorySurface::new());
        (
            ByteSizedCache::new(ByteSize::from_bytes(budget), surface.clone()),
            surface,
        )
    }

    fn put(cache: &ByteSizedCache, surface: &MemorySurface, key: &str, len: usize) {
        let key = CacheKey::from(key);
        let handle = surface.materialize(&key, vec![0u8; len]).unwrap();
        cache.store(key, CacheEntry::loaded(handle, 200));
    }

    fn key(raw: &str) -> CacheKey {
        CacheKey::from(raw)
    }

    fn protected(keys: &[&str]) -> HashSet<CacheKey> {
        keys.iter().map(|k| key(k)).collect()
    }

    #[test]
    fn evicts_least_recently_used_until_under_budget() {
        let (cache, surface) = cache(10_000);
        put(&cache, &surface, "a", 400);
        put(&cache, &surface, "b", 400);
        put(&cache, &surface, "c", 400);

        // Touch "a" so "b" becomes the oldest.
        cache.get(&key("a")).unwrap();

        let report = cache.set_budget(ByteSize::from_bytes(500));
        assert_eq!(report.evicted, vec![key("b"), key("c")]);
        assert!(cache.get(&key("a")).is_ok());
        assert_eq!(cache.resident_bytes().as_bytes(), 400);
        assert_eq!(surface.live_count(), 1);
        assert_eq!(surface.released_count(), 2);
    }

    #[test]
    fn protected_entries_survive_over_budget() {
        let (cache, surface) = cache(100);
        cache.protect([key("a")]);
        put(&cache, &surface, "a", 60);
        put(&cache, &surface, "b", 60);

        // "a" pinned, "b" shielded as the key just inserted.
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.resident_bytes().as_bytes(), 120);

        put(&cache, &surface, "c", 60);
        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert_eq!(cache.resident_bytes().as_bytes(), 120);

        let report = cache.evict_except(&protected(&["c"]));
        assert!(report.evicted.is_empty());
        assert!(report.over_budget());
    }

    #[test]
    fn evict_except_skips_protected_keys() {
        let (cache, surface) = cache(100);
        cache.protect(["a", "b", "c", "d"].map(key));
        for name in ["a", "b", "c", "d"] {
            put(&cache, &surface, name, 50);
        }
        assert_eq!(cache.resident_bytes().as_bytes(), 200);

        cache.protect(Vec::<CacheKey>::new());
        let report = cache.evict_except(&protected(&["b", "d"]));
        assert_eq!(report.evicted, vec![key("a"), key("c")]);
        assert_eq!(report.resident.as_bytes(), 100);
        assert!(!report.over_budget());
        assert_eq!(surface.live_count(), 2);
    }

    #[test]
    fn negative_entries_hold_no_bytes_and_are_not_evicted() {
        let (cache, surface) = cache(50);
        cache.store(key("bad"), CacheEntry::failed(FetchError::Http { status: 404 }));
        put(&cache, &surface, "good", 40);
        assert_eq!(cache.resident_bytes().as_bytes(), 40);

        cache.set_budget(ByteSize::ZERO);
        assert!(cache.contains(&key("bad")));
        assert!(!cache.contains(&key("good")));
        assert_eq!(cache.resident_bytes(), ByteSize::ZERO);

        match cache.get(&key("bad")) {
            Err(CacheError::CachedFailure(FetchError::Http { status })) => {
                assert_eq!(status, 404)
            }
            other => panic!("unexpected lookup result: {other:?}"),
        }
        assert_eq!(cache.stats().negative_entries, 1);
    }

    #[test]
    fn get_on_absent_key_is_not_cached() {
        let (cache, _surface) = cache(10);
        assert_eq!(
            cache.get(&key("missing")),
            Err(CacheError::NotCached(key("missing")))
        );
    }

    #[test]
    fn invalidate_releases_and_clears_negative_entries() {
        let (cache, surface) = cache(1_000);
        put(&cache, &surface, "a", 10);
        cache.store(
            key("bad"),
            CacheEntry::failed(FetchError::Transport {
                message: "refused".into(),
            }),
        );

        assert!(cache.invalidate(&key("a")));
        assert!(cache.invalidate(&key("bad")));
        assert!(!cache.invalidate(&key("bad")));
        assert!(cache.is_empty());
        assert_eq!(cache.resident_bytes(), ByteSize::ZERO);
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn replacing_an_entry_releases_the_old_handle() {
        let (cache, surface) = cache(1_000);
        put(&cache, &surface, "a", 10);
        put(&cache, &surface, "a", 30);
        assert_eq!(cache.resident_bytes().as_bytes(), 30);
        assert_eq!(surface.live_count(), 1);
        assert_eq!(surface.released_count(), 1);
    }

    #[test]
    fn drop_releases_every_handle() {
        let surface = Arc::new(MemorySurface::new());
        {
            let cache = ByteSizedCache::new(ByteSize::from_kib(1), surface.clone());
            put(&cache, &surface, "a", 10);
            put(&cache, &surface, "b", 10);
        }
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn resident_matches_sum_of_held_entries() {
        let (cache, surface) = cache(250);
        for (idx, len) in [90usize, 10, 120, 70, 5, 200].into_iter().enumerate() {
            put(&cache, &surface, &format!("k{idx}"), len);
            if idx % 2 == 0 {
                cache.store(
                    key(&format!("bad{idx}")),
                    CacheEntry::failed(FetchError::Http { status: 500 }),
                );
            }
            let state = cache.state.lock();
            let summed: ByteSize =
                state.entries.values().map(|e| e.resident_bytes()).sum();
            assert_eq!(state.resident, summed);
        }
    }
}
