//! Non-fatal checks over the operator configuration.

use crate::types::OperatorConfig;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Severity of a configuration warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

/// A configuration issue that does not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(f, "{label}: {}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &OperatorConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.google.projects.is_empty() {
        warnings.push(ConfigWarning {
            field: "google.projects".to_string(),
            message: "no projects are allowed; every repository with Google access will be rejected"
                .to_string(),
            severity: Severity::Warning,
        });
    }

    let mut seen = BTreeSet::new();
    for project in &config.google.projects {
        if !seen.insert(project.as_str()) {
            warnings.push(ConfigWarning {
                field: "google.projects".to_string(),
                message: format!("project '{project}' is listed more than once"),
                severity: Severity::Info,
            });
        }
    }

    if config.google.default_region.trim().is_empty() {
        warnings.push(ConfigWarning {
            field: "google.default_region".to_string(),
            message: "default region is empty; repositories without a region get none"
                .to_string(),
            severity: Severity::Warning,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GoogleSettings;

    #[test]
    fn clean_config_has_no_warnings() {
        let config = OperatorConfig {
            google: GoogleSettings::new(["core"]),
            ..OperatorConfig::default()
        };
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn empty_and_duplicate_projects_warn() {
        let empty = OperatorConfig::default();
        let warnings = validate_config(&empty);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);

        let duplicated = OperatorConfig {
            google: GoogleSettings::new(["core", "core"]).with_default_region(""),
            ..OperatorConfig::default()
        };
        let warnings = validate_config(&duplicated);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].to_string().contains("listed more than once"));
        assert_eq!(warnings[1].field, "google.default_region");
    }
}
