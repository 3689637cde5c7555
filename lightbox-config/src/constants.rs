//! Defaults and environment variable names.

use lightbox_model::ByteSize;

/// Default hard budget for cached resource bytes.
pub const DEFAULT_CACHE_BUDGET: ByteSize = ByteSize::from_mib(50);

/// Neighbors warmed on each side of the current item with no streak.
pub const DEFAULT_BASE_PRELOAD_RADIUS: usize = 2;

/// Upper bound of the navigation streak.
pub const DEFAULT_MAX_STREAK_LEVEL: u32 = 5;

/// Idle time after which the navigation streak resets.
pub const DEFAULT_STREAK_INACTIVITY_MS: u64 = 1_500;

/// Hard cap on the preload radius regardless of streak.
pub const DEFAULT_PRELOAD_RADIUS_CAP: usize = 10;

/// Per-request timeout applied by the HTTP transport.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Path to a TOML or JSON config file.
pub const ENV_CONFIG_PATH: &str = "LIGHTBOX_CONFIG_PATH";

/// Inline JSON config.
pub const ENV_CONFIG_JSON: &str = "LIGHTBOX_CONFIG_JSON";

/// Files probed in the working directory when no env override is set.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "lightbox.toml",
    "lightbox.json",
    "config/lightbox.toml",
    "config/lightbox.json",
];
