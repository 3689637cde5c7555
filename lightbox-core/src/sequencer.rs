//! Render sequencing.
//!
//! Every render attempt takes a token from [`ViewerSequencer::begin`]. After
//! each await the attempt checks [`ViewerSequencer::is_current`]; once a
//! newer token exists the attempt goes [`RenderPhase::Stale`] and must not
//! touch the view. Underlying fetches are not cancelled, their results are
//! simply dropped by the stale attempt (the cache still keeps them).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one render attempt. Larger is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderToken(u64);

impl RenderToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RenderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues render tokens. Clones share one counter.
#[derive(Debug, Clone, Default)]
pub struct ViewerSequencer {
    latest: Arc<AtomicU64>,
}

impl ViewerSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token that supersedes every earlier one.
    pub fn begin(&self) -> RenderToken {
        RenderToken(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, token: RenderToken) -> bool {
        self.latest.load(Ordering::Acquire) == token.0
    }

    /// Most recently issued token, if any.
    pub fn latest(&self) -> Option<RenderToken> {
        match self.latest.load(Ordering::Acquire) {
            0 => None,
            raw => Some(RenderToken(raw)),
        }
    }
}

/// Lifecycle of one render attempt.
///
/// `Started -> WaitingOnResource -> Stale | Displayed | ErrorDisplayed`.
/// The last three are terminal; only `Displayed` and `ErrorDisplayed` are
/// visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Started,
    WaitingOnResource,
    Stale,
    Displayed,
    ErrorDisplayed,
}

impl RenderPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RenderPhase::Stale | RenderPhase::Displayed | RenderPhase::ErrorDisplayed
        )
    }
}

/// Tracks the phase of a single attempt and enforces legal transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderAttempt {
    token: RenderToken,
    index: usize,
    phase: RenderPhase,
}

impl RenderAttempt {
    pub fn start(sequencer: &ViewerSequencer, index: usize) -> Self {
        Self {
            token: sequencer.begin(),
            index,
            phase: RenderPhase::Started,
        }
    }

    pub fn token(&self) -> RenderToken {
        self.token
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Enter the suspension point.
    pub fn waiting(&mut self) {
        if self.phase == RenderPhase::Started {
            self.phase = RenderPhase::WaitingOnResource;
        }
    }

    /// Call right after every await. Returns `false` (and goes stale) when a
    /// newer attempt has begun.
    pub fn checkpoint(&mut self, sequencer: &ViewerSequencer) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        if !sequencer.is_current(self.token) {
            log::debug!(
                "render {} for index {} is stale, dropping result",
                self.token,
                self.index
            );
            self.phase = RenderPhase::Stale;
            return false;
        }
        true
    }

    pub fn displayed(&mut self) {
        self.finish(RenderPhase::Displayed);
    }

    pub fn errored(&mut self) {
        self.finish(RenderPhase::ErrorDisplayed);
    }

    fn finish(&mut self, phase: RenderPhase) {
        if !self.phase.is_terminal() {
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_increase_and_only_latest_is_current() {
        let sequencer = ViewerSequencer::new();
        assert_eq!(sequencer.latest(), None);

        let first = sequencer.begin();
        assert!(sequencer.is_current(first));
        let second = sequencer.clone().begin();
        assert!(second > first);
        assert!(!sequencer.is_current(first));
        assert!(sequencer.is_current(second));
        assert_eq!(sequencer.latest(), Some(second));
    }

    #[test]
    fn superseded_attempt_goes_stale_and_stays_there() {
        let sequencer = ViewerSequencer::new();
        let mut old = RenderAttempt::start(&sequencer, 3);
        old.waiting();
        assert_eq!(old.phase(), RenderPhase::WaitingOnResource);

        let mut new = RenderAttempt::start(&sequencer, 4);
        new.waiting();

        assert!(!old.checkpoint(&sequencer));
        assert_eq!(old.phase(), RenderPhase::Stale);
        old.displayed();
        assert_eq!(old.phase(), RenderPhase::Stale);

        assert!(new.checkpoint(&sequencer));
        new.errored();
        assert_eq!(new.phase(), RenderPhase::ErrorDisplayed);
        assert!(!new.checkpoint(&sequencer));
    }
}
