//! Navigation velocity.
//!
//! Counts consecutive same-direction steps. The streak widens the preload
//! window while the user keeps paging one way and collapses after an idle
//! window. Expiry is evaluated lazily on the next read or step, so there is
//! no timer task to cancel; every step re-arms the deadline.

use std::time::Duration;

use lightbox_model::Direction;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Snapshot of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VelocityState {
    pub last_direction: Option<Direction>,
    pub streak_level: u32,
}

#[derive(Debug, Default)]
struct Inner {
    state: VelocityState,
    expires_at: Option<Instant>,
}

impl Inner {
    fn expire(&mut self, now: Instant) {
        if let Some(deadline) = self.expires_at
            && now >= deadline
        {
            self.state = VelocityState::default();
            self.expires_at = None;
        }
    }
}

#[derive(Debug)]
pub struct NavigationVelocityTracker {
    inner: Mutex<Inner>,
    max_streak: u32,
    inactivity: Duration,
}

impl NavigationVelocityTracker {
    pub fn new(max_streak: u32, inactivity: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_streak,
            inactivity,
        }
    }

    /// Record a step and return the new streak level.
    ///
    /// Same direction as the previous step increments up to the max; any
    /// other direction starts a new streak at 1.
    pub fn on_navigate(&self, direction: Direction) -> u32 {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.expire(now);

        let level = if inner.state.last_direction == Some(direction) {
            inner.state.streak_level.saturating_add(1).min(self.max_streak)
        } else {
            1u32.min(self.max_streak)
        };
        inner.state = VelocityState {
            last_direction: Some(direction),
            streak_level: level,
        };
        inner.expires_at = Some(now + self.inactivity);
        log::trace!("navigate {}: streak {}", direction, level);
        level
    }

    pub fn streak_level(&self) -> u32 {
        self.state().streak_level
    }

    pub fn state(&self) -> VelocityState {
        let mut inner = self.inner.lock();
        inner.expire(Instant::now());
        inner.state
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> NavigationVelocityTracker {
        NavigationVelocityTracker::new(5, Duration::from_millis(1500))
    }

    #[tokio::test(start_paused = true)]
    async fn streak_caps_at_max() {
        let tracker = tracker();
        let levels: Vec<u32> =
            (0..6).map(|_| tracker.on_navigate(Direction::Forward)).collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn reversal_restarts_streak() {
        let tracker = tracker();
        let levels: Vec<u32> = [
            Direction::Forward,
            Direction::Forward,
            Direction::Forward,
            Direction::Backward,
        ]
        .into_iter()
        .map(|direction| tracker.on_navigate(direction))
        .collect();
        assert_eq!(levels, vec![1, 2, 3, 1]);
        assert_eq!(
            tracker.state().last_direction,
            Some(Direction::Backward)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_resets_to_zero() {
        let tracker = tracker();
        tracker.on_navigate(Direction::Forward);
        tracker.on_navigate(Direction::Forward);

        tokio::time::advance(Duration::from_millis(1499)).await;
        assert_eq!(tracker.streak_level(), 2);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(tracker.state(), VelocityState::default());
        assert_eq!(tracker.on_navigate(Direction::Forward), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn each_step_rearms_the_deadline() {
        let tracker = tracker();
        for _ in 0..4 {
            tracker.on_navigate(Direction::Backward);
            tokio::time::advance(Duration::from_millis(1000)).await;
        }
        assert_eq!(tracker.streak_level(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_streak_never_grows() {
        let tracker = NavigationVelocityTracker::new(0, Duration::from_secs(1));
        assert_eq!(tracker.on_navigate(Direction::Forward), 0);
        assert_eq!(tracker.on_navigate(Direction::Forward), 0);
        tracker.reset();
        assert_eq!(tracker.state().last_direction, None);
    }
}
