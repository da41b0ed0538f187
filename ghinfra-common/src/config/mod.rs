//! Configuration system for ghinfra.
//!
//! This module provides:
//! - Operator TOML loading with `GHINFRA_*` environment overrides
//! - Repository descriptor loading from a directory of YAML files
//! - Source tracking for debugging
//! - Non-fatal validation warnings

pub mod env;
pub mod loader;
pub mod source;
pub mod validate;

pub use env::{EnvError, EnvParser};
pub use loader::{LoadError, LoadedConfig, expand_home, load_operator_config, load_repositories};
pub use source::{ConfigSource, Sourced};
pub use validate::{ConfigWarning, Severity, validate_config};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
