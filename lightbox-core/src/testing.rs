//! Test doubles for the transport and view seams.
//!
//! [`ScriptedTransport`] answers from a per-key script, counts every request
//! and can hold a reply behind a [`Gate`] so tests decide completion order.
//! [`RecordingView`] captures what a session would have put on screen.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lightbox_model::CacheKey;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::session::{Frame, RenderFailure, ViewSink};
use crate::transport::{Transport, TransportError, TransportResponse};

/// Scripted answer for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Body { status: u16, body: Vec<u8> },
    /// Status line only; the body is never read for error statuses.
    Status(u16),
    /// The request itself fails (status 0).
    Unreachable(String),
    /// Status arrives but reading the body fails.
    BrokenBody { status: u16, message: String },
}

impl Reply {
    /// A 200 response with a zero-filled body of `len` bytes.
    pub fn image(len: usize) -> Self {
        Reply::Body {
            status: 200,
            body: vec![0u8; len],
        }
    }
}

/// Holds a scripted reply until opened.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    async fn passed(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only ends once opened.
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[derive(Debug, Clone)]
struct Route {
    reply: Reply,
    gate: Option<Gate>,
}

/// In-memory [`Transport`]. Unscripted keys answer `404`.
#[derive(Debug)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<CacheKey, Route>>,
    calls: Mutex<Vec<CacheKey>>,
    call_tick: watch::Sender<u64>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        let (call_tick, _rx) = watch::channel(0);
        Self {
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            call_tick,
        }
    }

    pub fn reply(&self, key: impl Into<CacheKey>, reply: Reply) {
        self.routes
            .lock()
            .insert(key.into(), Route { reply, gate: None });
    }

    /// Script a reply that is withheld until the returned gate opens.
    pub fn gated(&self, key: impl Into<CacheKey>, reply: Reply) -> Gate {
        let gate = Gate::new();
        self.routes.lock().insert(
            key.into(),
            Route {
                reply,
                gate: Some(gate.clone()),
            },
        );
        gate
    }

    pub fn calls_for(&self, key: &CacheKey) -> usize {
        self.calls.lock().iter().filter(|called| *called == key).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Wait until `key` has been requested at least `count` times.
    pub async fn wait_for_calls(&self, key: &CacheKey, count: usize) {
        let mut rx = self.call_tick.subscribe();
        let _ = rx.wait_for(|_| self.calls_for(key) >= count).await;
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(
        &self,
        key: &CacheKey,
    ) -> Result<Box<dyn TransportResponse>, TransportError> {
        self.calls.lock().push(key.clone());
        self.call_tick.send_modify(|tick| *tick += 1);

        let route = self.routes.lock().get(key).cloned().unwrap_or(Route {
            reply: Reply::Status(404),
            gate: None,
        });
        if let Some(gate) = &route.gate {
            gate.passed().await;
        }

        match route.reply {
            Reply::Unreachable(message) => Err(TransportError::new(message)),
            Reply::Body { status, body } => {
                Ok(Box::new(ScriptedResponse { status, body: Ok(body) }))
            }
            Reply::Status(status) => Ok(Box::new(ScriptedResponse {
                status,
                body: Ok(Vec::new()),
            })),
            Reply::BrokenBody { status, message } => {
                Ok(Box::new(ScriptedResponse {
                    status,
                    body: Err(TransportError::new(message)),
                }))
            }
        }
    }
}

struct ScriptedResponse {
    status: u16,
    body: Result<Vec<u8>, TransportError>,
}

#[async_trait]
impl TransportResponse for ScriptedResponse {
    fn status(&self) -> u16 {
        self.status
    }

    async fn body(self: Box<Self>) -> Result<Vec<u8>, TransportError> {
        self.body
    }
}

/// Something the view layer was asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Shown(Frame),
    Error(RenderFailure),
    Cleared,
}

/// [`ViewSink`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().clone()
    }

    /// Indices of items that reached the screen, errors included.
    pub fn shown_indices(&self) -> Vec<usize> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Shown(frame) => Some(frame.index),
                ViewEvent::Error(failure) => Some(failure.index),
                ViewEvent::Cleared => None,
            })
            .collect()
    }
}

impl ViewSink for RecordingView {
    fn show(&self, frame: &Frame) {
        self.events.lock().push(ViewEvent::Shown(frame.clone()));
    }

    fn show_error(&self, failure: &RenderFailure) {
        self.events.lock().push(ViewEvent::Error(failure.clone()));
    }

    fn clear(&self) {
        self.events.lock().push(ViewEvent::Cleared);
    }
}
