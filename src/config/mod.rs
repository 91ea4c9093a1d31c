//! Engine Configuration Module
//!
//! Provides deployment configuration loaded from TOML files, replacing
//! hardcoded detector thresholds and alerting cut points with
//! operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `PUMP_SENTINEL_CONFIG` environment variable (path to TOML file)
//! 2. `pump_sentinel.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(EngineConfig::load());
//!
//! // Anywhere in the codebase:
//! let threshold = config::get().detection.thresholds.vibration_mm_s;
//! ```
//!
//! Components are constructed from `&EngineConfig` and keep their own
//! section by value, so library users and tests can skip the global.

mod engine_config;
pub mod defaults;

pub use engine_config::*;

use std::sync::OnceLock;

/// Global engine configuration, initialized once at startup.
static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Initialize the global engine configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: EngineConfig) {
    if ENGINE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global engine configuration.
///
/// Falls back to built-in defaults when `init()` was never called.
pub fn get() -> &'static EngineConfig {
    ENGINE_CONFIG.get_or_init(|| {
        tracing::debug!("config::get() before config::init(), using defaults");
        EngineConfig::default()
    })
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    ENGINE_CONFIG.get().is_some()
}
