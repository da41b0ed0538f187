//! Environment variable parsing with type safety.
//!
//! Provides a type-safe parser for `GHINFRA_*` overrides with
//! validation, error collection, and source tracking.

use super::source::Sourced;
use std::env;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Invalid log level.
    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Type-safe environment variable parser.
///
/// Collects errors during parsing so all issues can be reported at once.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Create a new parser with the GHINFRA_ prefix.
    pub fn new() -> Self {
        Self {
            prefix: "GHINFRA_",
            errors: Vec::new(),
        }
    }

    /// Get all accumulated errors.
    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take ownership of errors.
    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Get a boolean override.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    ///
    /// Returns `None` when the variable is unset or unparsable.
    pub fn get_bool(&mut self, name: &str) -> Option<Sourced<bool>> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        let parsed = match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                return None;
            }
        };
        Some(Sourced::from_env(parsed, var_name))
    }

    /// Get an optional string (None if not set or empty).
    pub fn get_optional_string(&mut self, name: &str) -> Option<Sourced<String>> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(Sourced::from_env(value.trim().to_string(), var_name)),
            Err(_) => None,
        }
    }

    /// Get a log level value with validation.
    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => {
                let lower = value.to_lowercase();
                match lower.as_str() {
                    "trace" | "debug" | "info" | "warn" | "error" | "off" => {
                        Sourced::from_env(lower, var_name)
                    }
                    _ => {
                        self.errors.push(EnvError::InvalidLogLevel {
                            var: var_name.clone(),
                            value,
                        });
                        Sourced::from_env(default.to_string(), var_name)
                    }
                }
            }
            Err(_) => Sourced::default_value(default.to_string()),
        }
    }

    /// Get one of a fixed set of lower-case choices.
    pub fn get_choice(&mut self, name: &str, choices: &[&str], default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => {
                let lower = value.trim().to_lowercase();
                if choices.contains(&lower.as_str()) {
                    Sourced::from_env(lower, var_name)
                } else {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name.clone(),
                        expected: format!("one of {}", choices.join("/")),
                        value,
                    });
                    Sourced::from_env(default.to_string(), var_name)
                }
            }
            Err(_) => Sourced::default_value(default.to_string()),
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}
