//! Core data model definitions shared across Lightbox crates.
#![allow(missing_docs)]

pub mod bytes;
pub mod error;
pub mod media;
pub mod navigation;

// Intentionally curated re-exports for downstream consumers.
pub use bytes::ByteSize;
pub use error::{ModelError, Result as ModelResult};
pub use media::{CacheKey, MediaItem, MediaKind};
pub use navigation::{Direction, Navigation};
