//! Source tracking for configuration values.
//!
//! Every value resolved from defaults, the operator file, or the
//! environment remembers where it came from so `ghinfra validate` can
//! explain an unexpected setting.

use serde::Serialize;
use std::fmt;

/// Origin of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Built-in default.
    Default,
    /// Operator TOML file.
    ConfigFile,
    /// `GHINFRA_*` environment variable.
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Environment => write!(f, "environment"),
        }
    }
}

/// A value paired with its origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    /// Name of the environment variable, when `source` is `Environment`.
    pub env_var: Option<String>,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            env_var: None,
        }
    }

    pub fn from_file(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::ConfigFile,
            env_var: None,
        }
    }

    pub fn from_env(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            env_var: Some(var.into()),
        }
    }

    /// True when the value was not left at its built-in default.
    pub fn is_overridden(&self) -> bool {
        self.source != ConfigSource::Default
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_values_record_variable_name() {
        let sourced = Sourced::from_env(true, "GHINFRA_ALLOW_HMAC_KEYS");
        assert_eq!(sourced.source, ConfigSource::Environment);
        assert_eq!(sourced.env_var.as_deref(), Some("GHINFRA_ALLOW_HMAC_KEYS"));
        assert!(sourced.is_overridden());
    }

    #[test]
    fn defaults_are_not_overridden() {
        let sourced = Sourced::default_value("europe-west4".to_string());
        assert!(!sourced.is_overridden());
        assert_eq!(sourced.into_inner(), "europe-west4");
    }
}
