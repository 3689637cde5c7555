//! Configuration library for Lightbox.
//!
//! Holds the viewer tuning knobs (cache budget, preload radius, streak
//! behaviour, transport timeout), loads them from the environment or a
//! config file, and reports non-fatal guard-rail warnings.
#![allow(missing_docs)]

pub mod constants;
pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoad, ConfigSource};
pub use models::ViewerConfig;
pub use validation::{ConfigWarning, ConfigWarnings};
