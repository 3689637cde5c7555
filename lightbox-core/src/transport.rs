//! Transport seam: `fetch(key) -> status + bytes`, split at its two
//! suspension points so a body failure can be told apart from a request
//! failure.

use std::fmt;

use async_trait::async_trait;
use lightbox_model::CacheKey;
use thiserror::Error;

/// Failure of the transport itself (connection, DNS, timeout, body read).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fetches raw bytes for a cache key.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Issue the request and wait for the status line.
    async fn request(
        &self,
        key: &CacheKey,
    ) -> Result<Box<dyn TransportResponse>, TransportError>;
}

/// A response whose status is known and whose body is still pending.
#[async_trait]
pub trait TransportResponse: Send {
    fn status(&self) -> u16;

    /// Read the full body.
    async fn body(self: Box<Self>) -> Result<Vec<u8>, TransportError>;
}
