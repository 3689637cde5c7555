use std::time::Duration;

use lightbox_model::ByteSize;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_PRELOAD_RADIUS, DEFAULT_CACHE_BUDGET,
    DEFAULT_MAX_STREAK_LEVEL, DEFAULT_PRELOAD_RADIUS_CAP,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_STREAK_INACTIVITY_MS,
};

/// Tuning for one viewer instance. Every field is optional in config files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Hard budget for bytes held by cached resources. The budget may be
    /// exceeded transiently when every resident entry is protected.
    pub cache_budget_bytes: ByteSize,
    /// Neighbors warmed on each side of the shown item before any streak
    /// bonus is applied.
    pub base_preload_radius: usize,
    /// Highest streak level; each level past the first widens the preload
    /// window by one item per side.
    pub max_streak_level: u32,
    /// Idle window (ms) after which the navigation streak resets to zero.
    pub streak_inactivity_ms: u64,
    /// Absolute cap on the preload radius.
    pub preload_radius_cap: usize,
    /// Timeout (ms) for a single HTTP request, headers and body included.
    pub request_timeout_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cache_budget_bytes: DEFAULT_CACHE_BUDGET,
            base_preload_radius: DEFAULT_BASE_PRELOAD_RADIUS,
            max_streak_level: DEFAULT_MAX_STREAK_LEVEL,
            streak_inactivity_ms: DEFAULT_STREAK_INACTIVITY_MS,
            preload_radius_cap: DEFAULT_PRELOAD_RADIUS_CAP,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ViewerConfig {
    pub fn with_cache_budget(mut self, budget: ByteSize) -> Self {
        self.cache_budget_bytes = budget;
        self
    }

    pub fn with_base_preload_radius(mut self, radius: usize) -> Self {
        self.base_preload_radius = radius;
        self
    }

    pub fn streak_inactivity(&self) -> Duration {
        Duration::from_millis(self.streak_inactivity_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Preload radius for the given streak level:
    /// `min(cap, base + max(0, streak - 1))`.
    pub fn preload_radius(&self, streak_level: u32) -> usize {
        let bonus = streak_level.saturating_sub(1) as usize;
        self.base_preload_radius
            .saturating_add(bonus)
            .min(self.preload_radius_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_viewer_behaviour() {
        let config = ViewerConfig::default();
        assert_eq!(config.cache_budget_bytes.as_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.base_preload_radius, 2);
        assert_eq!(config.max_streak_level, 5);
        assert_eq!(config.streak_inactivity(), Duration::from_millis(1500));
        assert_eq!(config.preload_radius_cap, 10);
    }

    #[test]
    fn preload_radius_grows_with_streak_and_caps() {
        let config = ViewerConfig::default();
        assert_eq!(config.preload_radius(0), 2);
        assert_eq!(config.preload_radius(1), 2);
        assert_eq!(config.preload_radius(2), 3);
        assert_eq!(config.preload_radius(5), 6);

        let tight = ViewerConfig {
            preload_radius_cap: 3,
            ..ViewerConfig::default()
        };
        assert_eq!(tight.preload_radius(5), 3);

        let none = ViewerConfig::default().with_base_preload_radius(0);
        assert_eq!(none.preload_radius(1), 0);
        assert_eq!(none.preload_radius(3), 2);
    }
}
