use std::fmt;

use thiserror::Error;

use crate::models::ViewerConfig;

/// A setting that is accepted but probably not what the operator wants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    #[error("cache_budget_bytes is 0; every unprotected entry is evicted on insert")]
    ZeroBudget,
    #[error(
        "base_preload_radius ({base}) exceeds preload_radius_cap ({cap}); the cap wins"
    )]
    BaseRadiusAboveCap { base: usize, cap: usize },
    #[error("max_streak_level is 0; navigation streaks never widen the preload window")]
    ZeroMaxStreak,
    #[error("streak_inactivity_ms is 0; streaks reset before the next navigation")]
    ZeroInactivityWindow,
}

/// Warnings collected by [`ViewerConfig::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings(Vec<ConfigWarning>);

impl ConfigWarnings {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.0.iter()
    }

    pub fn contains(&self, warning: &ConfigWarning) -> bool {
        self.0.contains(warning)
    }
}

impl fmt::Display for ConfigWarnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, warning) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "- {warning}")?;
        }
        Ok(())
    }
}

impl ViewerConfig {
    /// Check guard rails. Nothing here is fatal.
    pub fn validate(&self) -> ConfigWarnings {
        let mut warnings = Vec::new();
        if self.cache_budget_bytes.is_zero() {
            warnings.push(ConfigWarning::ZeroBudget);
        }
        if self.base_preload_radius > self.preload_radius_cap {
            warnings.push(ConfigWarning::BaseRadiusAboveCap {
                base: self.base_preload_radius,
                cap: self.preload_radius_cap,
            });
        }
        if self.max_streak_level == 0 {
            warnings.push(ConfigWarning::ZeroMaxStreak);
        }
        if self.streak_inactivity_ms == 0 {
            warnings.push(ConfigWarning::ZeroInactivityWindow);
        }
        ConfigWarnings(warnings)
    }
}
