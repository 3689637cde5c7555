//! The open / navigate / close surface.
//!
//! A [`Lightbox`] owns one cache, one fetch coordinator, one velocity
//! tracker and one sequencer. Each navigation starts a render attempt; the
//! attempt fetches through the coordinator, checks its token after the
//! await, and only then calls into the [`ViewSink`]. A successful image
//! render warms the neighbor window sized by the current streak.

use std::fmt;
use std::sync::Arc;

use lightbox_config::ViewerConfig;
use lightbox_model::{ByteSize, CacheKey, MediaItem, MediaKind, Navigation};
use log::{debug, info};
use parking_lot::Mutex;

use crate::cache::ByteSizedCache;
use crate::error::{CacheError, FetchError, Result};
use crate::fetch::FetchCoordinator;
use crate::http::HttpTransport;
use crate::preload::{PreloadObserver, PreloadPlanner, PreloadSummary, PreloadTicket};
use crate::resource::{MemorySurface, ResourceHandle, ResourceSurface};
use crate::sequencer::{RenderAttempt, RenderToken, ViewerSequencer};
use crate::transport::Transport;
use crate::velocity::{NavigationVelocityTracker, VelocityState};

/// View-layer callback. Only ever called for the current render token.
///
/// Calls happen while the session holds its gallery lock, so
/// implementations must not call back into the [`Lightbox`].
pub trait ViewSink: Send + Sync + fmt::Debug {
    fn show(&self, frame: &Frame);
    fn show_error(&self, failure: &RenderFailure);
    /// The gallery was closed.
    fn clear(&self) {}
}

#[derive(Debug, Default)]
struct NullView;

impl ViewSink for NullView {
    fn show(&self, _frame: &Frame) {}
    fn show_error(&self, _failure: &RenderFailure) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameContent {
    Image(ResourceHandle),
    /// Videos are handed to the view by key and never fetched here.
    Streamed { source: CacheKey },
}

/// What the view shows for a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub token: RenderToken,
    pub index: usize,
    pub key: CacheKey,
    pub title: String,
    pub content: FrameContent,
    pub declared_size: Option<ByteSize>,
}

impl Frame {
    /// Size to show next to the title: the materialized size for images,
    /// the declared size otherwise.
    pub fn size_bytes(&self) -> Option<ByteSize> {
        match &self.content {
            FrameContent::Image(handle) => Some(handle.size()),
            FrameContent::Streamed { .. } => self.declared_size,
        }
    }

    pub fn handle(&self) -> Option<&ResourceHandle> {
        match &self.content {
            FrameContent::Image(handle) => Some(handle),
            FrameContent::Streamed { .. } => None,
        }
    }
}

/// What the view shows when the current item failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub token: RenderToken,
    pub index: usize,
    pub key: CacheKey,
    pub title: String,
    pub message: String,
    /// HTTP status, absent for connection failures.
    pub status: Option<u16>,
}

impl RenderFailure {
    fn new(token: RenderToken, index: usize, item: &MediaItem, err: &CacheError) -> Self {
        Self {
            token,
            index,
            key: item.key.clone(),
            title: item.title.clone(),
            message: err
                .fetch_error()
                .map(FetchError::message)
                .unwrap_or_else(|| err.to_string()),
            status: err.status_code(),
        }
    }
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => {
                write!(f, "{} ({}): {} [status {}]", self.title, self.key, self.message, status)
            }
            None => write!(f, "{} ({}): {}", self.title, self.key, self.message),
        }
    }
}

/// Result of one open or navigate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Displayed(Frame),
    /// A video item; shown without fetching.
    Streamed(Frame),
    Failed(RenderFailure),
    /// Superseded by a newer render before the fetch resolved.
    Stale(RenderToken),
    /// Nothing to render: the gallery is closed, empty, or the jump target
    /// is out of range.
    Ignored,
}

impl RenderOutcome {
    /// Whether anything reached the view.
    pub fn is_visible(&self) -> bool {
        matches!(
            self,
            RenderOutcome::Displayed(_)
                | RenderOutcome::Streamed(_)
                | RenderOutcome::Failed(_)
        )
    }
}

#[derive(Debug, Default)]
struct Gallery {
    items: Arc<[MediaItem]>,
    current: usize,
    open: bool,
}

/// Assembles a [`Lightbox`]. Surface, view and observer are optional.
#[derive(Debug)]
pub struct LightboxBuilder {
    config: ViewerConfig,
    transport: Arc<dyn Transport>,
    surface: Option<Arc<dyn ResourceSurface>>,
    view: Option<Arc<dyn ViewSink>>,
    observer: Option<Arc<dyn PreloadObserver>>,
}

impl LightboxBuilder {
    pub fn new(config: ViewerConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            surface: None,
            view: None,
            observer: None,
        }
    }

    pub fn surface(mut self, surface: Arc<dyn ResourceSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn view(mut self, view: Arc<dyn ViewSink>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PreloadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Lightbox {
        let warnings = self.config.validate();
        if !warnings.is_empty() {
            log::debug!("building viewer with config warnings:\n{}", warnings);
        }

        let surface = self
            .surface
            .unwrap_or_else(|| Arc::new(MemorySurface::new()));
        let cache = Arc::new(ByteSizedCache::new(
            self.config.cache_budget_bytes,
            surface,
        ));
        let coordinator = FetchCoordinator::new(cache, self.transport);
        let planner = match self.observer {
            Some(observer) => {
                PreloadPlanner::with_observer(coordinator.clone(), observer)
            }
            None => PreloadPlanner::new(coordinator.clone()),
        };
        let velocity = NavigationVelocityTracker::new(
            self.config.max_streak_level,
            self.config.streak_inactivity(),
        );

        Lightbox {
            inner: Arc::new(LightboxInner {
                config: self.config,
                coordinator,
                planner,
                velocity,
                sequencer: ViewerSequencer::new(),
                view: self.view.unwrap_or_else(|| Arc::new(NullView)),
                gallery: Mutex::new(Gallery::default()),
                preloads: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// One viewer instance. Clones share state; separate instances share
/// nothing.
#[derive(Clone)]
pub struct Lightbox {
    inner: Arc<LightboxInner>,
}

struct LightboxInner {
    config: ViewerConfig,
    coordinator: FetchCoordinator,
    planner: PreloadPlanner,
    velocity: NavigationVelocityTracker,
    sequencer: ViewerSequencer,
    view: Arc<dyn ViewSink>,
    gallery: Mutex<Gallery>,
    preloads: Mutex<Vec<PreloadTicket>>,
}

/// Everything a render needs once the gallery lock is released.
struct Pending {
    attempt: RenderAttempt,
    item: MediaItem,
    items: Arc<[MediaItem]>,
}

impl Lightbox {
    pub fn builder(
        config: ViewerConfig,
        transport: Arc<dyn Transport>,
    ) -> LightboxBuilder {
        LightboxBuilder::new(config, transport)
    }

    /// A viewer fetching over HTTP with an in-memory surface.
    pub fn http(config: ViewerConfig, view: Arc<dyn ViewSink>) -> Result<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::builder(config, Arc::new(transport)).view(view).build())
    }

    /// Show `items` starting at `start_index` (clamped into range).
    ///
    /// Resets navigation velocity. The cache is kept across galleries.
    pub async fn open(
        &self,
        items: Vec<MediaItem>,
        start_index: usize,
    ) -> RenderOutcome {
        self.inner.velocity.reset();
        let pending = {
            let mut gallery = self.inner.gallery.lock();
            gallery.items = items.into();
            gallery.open = true;
            if gallery.items.is_empty() {
                gallery.current = 0;
                self.inner.sequencer.begin();
                info!("opened empty gallery");
                return RenderOutcome::Ignored;
            }
            gallery.current = start_index.min(gallery.items.len() - 1);
            info!(
                "opened gallery: {} items, start {}",
                gallery.items.len(),
                gallery.current
            );
            self.begin_render(&gallery)
        };
        self.render(pending).await
    }

    pub async fn navigate(&self, navigation: Navigation) -> RenderOutcome {
        let pending = {
            let mut gallery = self.inner.gallery.lock();
            if !gallery.open {
                return RenderOutcome::Ignored;
            }
            let Some(target) =
                navigation.target(gallery.current, gallery.items.len())
            else {
                debug!("navigation {:?} has no target", navigation);
                return RenderOutcome::Ignored;
            };
            if let Some(direction) = navigation.direction() {
                self.inner.velocity.on_navigate(direction);
            }
            gallery.current = target;
            self.begin_render(&gallery)
        };
        self.render(pending).await
    }

    /// Close the gallery. In-flight renders become stale; preloads run to
    /// completion and stay cached.
    pub fn close(&self) {
        {
            let mut gallery = self.inner.gallery.lock();
            if !gallery.open {
                return;
            }
            gallery.open = false;
            self.inner.sequencer.begin();
            self.inner.view.clear();
            self.cache().protect(Vec::<CacheKey>::new());
        }
        self.inner.velocity.reset();
        info!("closed gallery");
    }

    /// Issue a token for the current item. Called with the gallery lock
    /// held, so pins change in token order.
    fn begin_render(&self, gallery: &Gallery) -> Pending {
        let index = gallery.current;
        let item = gallery.items[index].clone();
        let attempt = RenderAttempt::start(&self.inner.sequencer, index);
        if item.kind != MediaKind::Video {
            // Keep the target resident while its fetch is outstanding.
            self.cache().protect([item.key.clone()]);
        }
        Pending {
            attempt,
            item,
            items: Arc::clone(&gallery.items),
        }
    }

    async fn render(&self, pending: Pending) -> RenderOutcome {
        let Pending {
            mut attempt,
            item,
            items,
        } = pending;
        let token = attempt.token();
        let index = attempt.index();

        if item.kind == MediaKind::Video {
            let frame = Frame {
                token,
                index,
                key: item.key.clone(),
                title: item.title.clone(),
                content: FrameContent::Streamed {
                    source: item.key.clone(),
                },
                declared_size: item.declared_size,
            };
            let _gallery = self.inner.gallery.lock();
            if !attempt.checkpoint(&self.inner.sequencer) {
                return RenderOutcome::Stale(token);
            }
            self.inner.view.show(&frame);
            attempt.displayed();
            return RenderOutcome::Streamed(frame);
        }

        attempt.waiting();
        let fetched = self.inner.coordinator.fetch_or_get(&item.key).await;

        let _gallery = self.inner.gallery.lock();
        if !attempt.checkpoint(&self.inner.sequencer) {
            return RenderOutcome::Stale(token);
        }
        match fetched {
            Ok(handle) => {
                let frame = Frame {
                    token,
                    index,
                    key: item.key.clone(),
                    title: item.title.clone(),
                    content: FrameContent::Image(handle),
                    declared_size: item.declared_size,
                };
                self.inner.view.show(&frame);
                attempt.displayed();
                // Still under the gallery lock: no newer render can have
                // pinned its target yet, so the window pin cannot clobber it.
                self.preload_around(index, &items);
                RenderOutcome::Displayed(frame)
            }
            Err(err) => {
                let failure = RenderFailure::new(token, index, &item, &err);
                debug!("render {} failed: {}", token, failure);
                self.inner.view.show_error(&failure);
                attempt.errored();
                RenderOutcome::Failed(failure)
            }
        }
    }

    /// Caller holds the gallery lock.
    fn preload_around(&self, index: usize, items: &[MediaItem]) {
        let streak = self.inner.velocity.streak_level();
        let radius = self.inner.config.preload_radius(streak);
        let window = self.inner.planner.plan_window(index, radius, items);
        let ticket = self.inner.planner.warm(&window);
        let mut preloads = self.inner.preloads.lock();
        preloads.retain(|ticket| !ticket.is_finished());
        preloads.push(ticket);
    }

    /// Wait for every preload issued so far.
    pub async fn settle_preloads(&self) -> PreloadSummary {
        let tickets: Vec<PreloadTicket> =
            std::mem::take(&mut *self.inner.preloads.lock());
        let mut total = PreloadSummary::default();
        for ticket in tickets {
            let summary = ticket.settle().await;
            total.warmed += summary.warmed;
            total.failed += summary.failed;
        }
        total
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &Arc<ByteSizedCache> {
        self.inner.coordinator.cache()
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.inner.coordinator
    }

    pub fn sequencer(&self) -> &ViewerSequencer {
        &self.inner.sequencer
    }

    pub fn velocity(&self) -> VelocityState {
        self.inner.velocity.state()
    }

    pub fn is_open(&self) -> bool {
        self.inner.gallery.lock().open
    }

    /// Index of the shown item while a gallery is open.
    pub fn current_index(&self) -> Option<usize> {
        let gallery = self.inner.gallery.lock();
        (gallery.open && !gallery.items.is_empty()).then_some(gallery.current)
    }

    pub fn len(&self) -> usize {
        self.inner.gallery.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Lightbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gallery = self.inner.gallery.lock();
        f.debug_struct("Lightbox")
            .field("open", &gallery.open)
            .field("items", &gallery.items.len())
            .field("current", &gallery.current)
            .field("latest_token", &self.inner.sequencer.latest())
            .field("coordinator", &self.inner.coordinator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingView, Reply, ScriptedTransport, ViewEvent};

    fn items(count: usize) -> Vec<MediaItem> {
        (0..count)
            .map(|idx| MediaItem::image(format!("/img/{idx}.jpg"), format!("Photo {idx}")))
            .collect()
    }

    fn viewer(
        transport: Arc<ScriptedTransport>,
        view: Arc<RecordingView>,
    ) -> Lightbox {
        let config = ViewerConfig::default().with_base_preload_radius(0);
        Lightbox::builder(config, transport).view(view).build()
    }

    #[tokio::test]
    async fn open_clamps_start_and_displays() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply("/img/2.jpg", Reply::image(64));
        let view = Arc::new(RecordingView::new());
        let lightbox = viewer(transport, view.clone());

        let outcome = lightbox.open(items(3), 99).await;
        let RenderOutcome::Displayed(frame) = outcome else {
            panic!("expected a displayed frame, got {outcome:?}");
        };
        assert_eq!(frame.index, 2);
        assert_eq!(frame.size_bytes(), Some(ByteSize::from_bytes(64)));
        assert_eq!(lightbox.current_index(), Some(2));
        assert_eq!(view.shown_indices(), vec![2]);
    }

    #[tokio::test]
    async fn jumps_do_not_feed_velocity() {
        let transport = Arc::new(ScriptedTransport::new());
        let view = Arc::new(RecordingView::new());
        let lightbox = viewer(transport, view);

        lightbox.open(items(5), 0).await;
        lightbox.navigate(Navigation::NEXT).await;
        lightbox.navigate(Navigation::NEXT).await;
        assert_eq!(lightbox.velocity().streak_level, 2);

        lightbox.navigate(Navigation::Jump(4)).await;
        assert_eq!(lightbox.current_index(), Some(4));
        assert_eq!(lightbox.velocity().streak_level, 2);

        assert_eq!(
            lightbox.navigate(Navigation::Jump(9)).await,
            RenderOutcome::Ignored
        );
        assert_eq!(lightbox.current_index(), Some(4));
    }

    #[tokio::test]
    async fn closed_gallery_ignores_navigation() {
        let transport = Arc::new(ScriptedTransport::new());
        let view = Arc::new(RecordingView::new());
        let lightbox = viewer(transport, view.clone());

        lightbox.open(items(2), 0).await;
        lightbox.close();
        assert!(!lightbox.is_open());
        assert_eq!(lightbox.current_index(), None);
        assert_eq!(lightbox.navigate(Navigation::NEXT).await, RenderOutcome::Ignored);
        assert_eq!(view.events().last(), Some(&ViewEvent::Cleared));
    }

    #[tokio::test]
    async fn empty_gallery_renders_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let view = Arc::new(RecordingView::new());
        let lightbox = viewer(transport.clone(), view.clone());

        assert_eq!(lightbox.open(Vec::new(), 3).await, RenderOutcome::Ignored);
        assert_eq!(lightbox.navigate(Navigation::PREV).await, RenderOutcome::Ignored);
        assert!(view.events().is_empty());
        assert_eq!(transport.total_calls(), 0);
    }
}
