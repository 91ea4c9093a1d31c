//! Process-wide config install.
//!
//! Kept in its own test binary: the global can only be set once per process.

use pump_sentinel::config::{self, EngineConfig};

#[test]
fn first_init_wins() {
    assert!(!config::is_initialized());

    let mut installed = EngineConfig::default();
    installed.alerting.retention_days = 14;
    config::init(installed);
    assert!(config::is_initialized());
    assert_eq!(config::get().alerting.retention_days, 14);

    // a second install is ignored
    let mut late = EngineConfig::default();
    late.alerting.retention_days = 365;
    config::init(late);
    assert_eq!(config::get().alerting.retention_days, 14);
}
