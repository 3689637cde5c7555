use std::time::Instant;

use lightbox_model::ByteSize;

use crate::error::FetchError;
use crate::resource::ResourceHandle;

/// One cached outcome for a key: a resource, or a recorded failure.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub(crate) handle: Option<ResourceHandle>,
    pub(crate) size: ByteSize,
    pub(crate) status: u16,
    pub(crate) last_used_at: Instant,
    /// Logical clock value of the last touch; orders LRU without ties.
    pub(crate) recency: u64,
    pub(crate) error: Option<FetchError>,
}

impl CacheEntry {
    pub fn loaded(handle: ResourceHandle, status: u16) -> Self {
        Self {
            size: handle.size(),
            handle: Some(handle),
            status,
            last_used_at: Instant::now(),
            recency: 0,
            error: None,
        }
    }

    /// Negative entry. Holds no bytes.
    pub fn failed(error: FetchError) -> Self {
        Self {
            handle: None,
            size: ByteSize::ZERO,
            status: error.status_code(),
            last_used_at: Instant::now(),
            recency: 0,
            error: Some(error),
        }
    }

    pub fn handle(&self) -> Option<&ResourceHandle> {
        self.handle.as_ref()
    }

    pub fn size(&self) -> ByteSize {
        self.size
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    pub fn is_negative(&self) -> bool {
        self.handle.is_none()
    }

    /// Bytes this entry contributes to the resident total.
    pub(crate) fn resident_bytes(&self) -> ByteSize {
        if self.handle.is_some() {
            self.size
        } else {
            ByteSize::ZERO
        }
    }

    pub(crate) fn outcome(&self) -> Result<ResourceHandle, FetchError> {
        match (&self.handle, &self.error) {
            (Some(handle), _) => Ok(handle.clone()),
            (None, Some(error)) => Err(error.clone()),
            (None, None) => Err(FetchError::Decode {
                status: self.status,
                message: "empty cache entry".to_string(),
            }),
        }
    }
}
