//! Lightbox core
//!
//! The memory-bounded half of a media viewer: a byte-budgeted LRU cache of
//! fetched resources, a coordinator that collapses concurrent fetches of
//! the same key, a neighbor preloader whose reach follows navigation
//! velocity, and a render sequencer that drops results of superseded
//! renders. [`Lightbox`] wires these together behind the
//! open / navigate / close surface a view layer calls into.
//!
//! Notes
//! - All shared state sits behind short, non-async critical sections; no
//!   lock is held across an await.
//! - Background preloads are spawned onto the ambient tokio runtime.
#![allow(missing_docs)]

pub mod cache;
pub mod error;
pub mod fetch;
pub mod http;
pub mod preload;
pub mod resource;
pub mod sequencer;
pub mod session;
pub mod testing;
pub mod transport;
pub mod velocity;

pub use cache::{ByteSizedCache, CacheEntry, CacheStats, EvictionReport};
pub use error::{CacheError, FetchError, LightboxError, Result};
pub use fetch::FetchCoordinator;
pub use http::HttpTransport;
pub use preload::{
    LogObserver, PreloadObserver, PreloadPlanner, PreloadSummary,
    PreloadTicket, PreloadWindow, window_indices,
};
pub use resource::{MemorySurface, ResourceHandle, ResourceSurface};
pub use sequencer::{RenderAttempt, RenderPhase, RenderToken, ViewerSequencer};
pub use session::{
    Frame, FrameContent, Lightbox, LightboxBuilder, RenderFailure,
    RenderOutcome, ViewSink,
};
pub use transport::{Transport, TransportError, TransportResponse};
pub use velocity::{NavigationVelocityTracker, VelocityState};

pub use lightbox_config::ViewerConfig;
pub use lightbox_model::{
    ByteSize, CacheKey, Direction, MediaItem, MediaKind, Navigation,
};
