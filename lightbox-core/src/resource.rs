//! Displayable resource handles and the surface that owns their memory.
//!
//! A [`ResourceHandle`] is what the view layer draws from. The surface that
//! minted it is not told when the last clone goes away; the cache calls
//! [`ResourceSurface::release`] explicitly when an entry leaves, the same
//! way an object URL must be revoked by hand.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lightbox_model::{ByteSize, CacheKey};
use parking_lot::Mutex;

/// Shared reference to decoded media bytes.
#[derive(Clone)]
pub struct ResourceHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: u64,
    key: CacheKey,
    locator: String,
    data: Arc<[u8]>,
}

impl ResourceHandle {
    pub fn new(
        id: u64,
        key: CacheKey,
        locator: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                key,
                locator: locator.into(),
                data: data.into(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn key(&self) -> &CacheKey {
        &self.inner.key
    }

    /// Surface-specific address the view layer resolves, e.g. `blob:…`.
    pub fn locator(&self) -> &str {
        &self.inner.locator
    }

    pub fn data(&self) -> &[u8] {
        &self.inner.data
    }

    pub fn size(&self) -> ByteSize {
        ByteSize::from_usize(self.inner.data.len())
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ResourceHandle {}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("locator", &self.inner.locator)
            .field("size", &self.size())
            .finish()
    }
}

/// Turns fetched bytes into handles and reclaims them.
pub trait ResourceSurface: Send + Sync + fmt::Debug {
    /// Decode step. An `Err` becomes a negative cache entry.
    fn materialize(
        &self,
        key: &CacheKey,
        body: Vec<u8>,
    ) -> Result<ResourceHandle, String>;

    /// Reclaim the memory behind `handle`. Called once per handle.
    fn release(&self, handle: &ResourceHandle);
}

/// In-process surface that keeps bytes in memory and tracks which handles
/// are still live.
#[derive(Debug, Default)]
pub struct MemorySurface {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
    released: AtomicU64,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self, handle: &ResourceHandle) -> bool {
        self.live.lock().contains(&handle.id())
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}

impl ResourceSurface for MemorySurface {
    fn materialize(
        &self,
        key: &CacheKey,
        body: Vec<u8>,
    ) -> Result<ResourceHandle, String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.live.lock().insert(id);
        Ok(ResourceHandle::new(
            id,
            key.clone(),
            format!("blob:lightbox/{id}"),
            body,
        ))
    }

    fn release(&self, handle: &ResourceHandle) {
        if self.live.lock().remove(&handle.id()) {
            self.released.fetch_add(1, Ordering::Relaxed);
        } else {
            log::warn!(
                "release of unknown or already released handle {} ({})",
                handle.id(),
                handle.key()
            );
        }
    }
}
