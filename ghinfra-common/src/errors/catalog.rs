//! Error catalog for ghinfra.
//!
//! Every fatal condition maps to a stable code (GHI-E001 through GHI-E299)
//! with a message and remediation steps, so operators and automation can
//! react to failures without parsing free-form text.
//!
//! # Error Code Ranges
//!
//! | Range      | Category     | Description                              |
//! |------------|--------------|------------------------------------------|
//! | E001-E099  | Config       | Operator file and repository descriptors |
//! | E100-E199  | Resolution   | Access resolution and identity planning  |
//! | E200-E299  | Provisioning | Provisioning sink failures               |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering all ghinfra error scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Operator configuration file not found or unreadable
    ConfigReadError,
    /// Operator configuration contains invalid TOML
    ConfigParseError,
    /// Operator configuration contains invalid values
    ConfigValidationError,
    /// Environment override has an invalid value
    ConfigEnvError,
    /// Repository descriptor directory or file unreadable
    RepositoryReadError,
    /// Repository descriptor contains invalid YAML
    RepositoryParseError,
    /// Two descriptors declare the same repository name
    RepositoryDuplicate,
    /// Suffix state file unreadable or malformed
    SuffixStateError,

    // =========================================================================
    // Resolution Errors (E100-E199)
    // =========================================================================
    /// A resolved project has no provider context
    ResolutionMissingProvider,
    /// A primary project has no workload identity pool
    ResolutionMissingIdentityPool,
    /// A repository has no resolved primary project entry
    ResolutionMissingPrimary,

    // =========================================================================
    // Provisioning Errors (E200-E299)
    // =========================================================================
    /// The provisioning sink rejected an operation
    ProvisioningFailed,
}

impl ErrorCode {
    /// Numeric part of the code.
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ConfigReadError => 1,
            Self::ConfigParseError => 2,
            Self::ConfigValidationError => 3,
            Self::ConfigEnvError => 4,
            Self::RepositoryReadError => 10,
            Self::RepositoryParseError => 11,
            Self::RepositoryDuplicate => 12,
            Self::SuffixStateError => 20,
            Self::ResolutionMissingProvider => 100,
            Self::ResolutionMissingIdentityPool => 101,
            Self::ResolutionMissingPrimary => 102,
            Self::ProvisioningFailed => 200,
        }
    }

    /// Formatted code, e.g. `GHI-E012`.
    pub fn code_string(&self) -> String {
        format!("GHI-E{:03}", self.code_number())
    }

    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            0..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Resolution,
            _ => ErrorCategory::Provisioning,
        }
    }

    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message(),
            remediation: self.remediation(),
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigReadError => "Operator configuration file could not be read",
            Self::ConfigParseError => "Operator configuration is not valid TOML",
            Self::ConfigValidationError => "Operator configuration contains invalid values",
            Self::ConfigEnvError => "Environment override has an invalid value",
            Self::RepositoryReadError => "Repository descriptors could not be read",
            Self::RepositoryParseError => "Repository descriptor is not valid YAML",
            Self::RepositoryDuplicate => "Repository name is declared more than once",
            Self::SuffixStateError => "Suffix state file could not be read or written",
            Self::ResolutionMissingProvider => "Resolved project has no provider context",
            Self::ResolutionMissingIdentityPool => {
                "Primary project has no workload identity pool"
            }
            Self::ResolutionMissingPrimary => "Repository has no resolved primary project",
            Self::ProvisioningFailed => "Provisioning sink rejected an operation",
        }
    }

    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigReadError => &[
                "Check the --config path (or GHINFRA_CONFIG)",
                "Ensure the file is readable by the current user",
            ],
            Self::ConfigParseError => &[
                "Validate the file with a TOML linter",
                "Expected sections: [repositories] and [google]",
            ],
            Self::ConfigValidationError => &[
                "Set [repositories] owner to the GitHub user or organization",
            ],
            Self::ConfigEnvError => &[
                "Unset or correct the GHINFRA_* variable named in the error",
            ],
            Self::RepositoryReadError => &[
                "Check the --repositories path (or GHINFRA_REPOSITORIES_DIR)",
            ],
            Self::RepositoryParseError => &[
                "Fix the YAML syntax in the file named in the error",
                "accessLevel must be 'full' or 'restricted'",
            ],
            Self::RepositoryDuplicate => &[
                "Rename or remove one of the descriptors sharing the name",
            ],
            Self::SuffixStateError => &[
                "Check the --state path is readable and writable",
                "Restore the state file from backup rather than deleting it; new suffixes rename every role",
            ],
            Self::ResolutionMissingProvider | Self::ResolutionMissingIdentityPool => &[
                "This is an internal wiring defect; report it with the plan output",
            ],
            Self::ResolutionMissingPrimary => &[
                "This is an internal wiring defect; report it with the resolve output",
            ],
            Self::ProvisioningFailed => &[
                "Inspect the sink error and re-run once the remote API recovers",
            ],
        }
    }

    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigValidationError,
            Self::ConfigEnvError,
            Self::RepositoryReadError,
            Self::RepositoryParseError,
            Self::RepositoryDuplicate,
            Self::SuffixStateError,
            Self::ResolutionMissingProvider,
            Self::ResolutionMissingIdentityPool,
            Self::ResolutionMissingPrimary,
            Self::ProvisioningFailed,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code_string())
    }
}

/// Subsystem an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Config,
    Resolution,
    Provisioning,
}

impl ErrorCategory {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Resolution => "resolution",
            Self::Provisioning => "provisioning",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Catalog entry for one error code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub code: String,
    pub category: ErrorCategory,
    pub message: &'static str,
    pub remediation: &'static [&'static str],
}

impl ErrorEntry {
    /// Multi-line rendering with remediation steps.
    pub fn format_full(&self) -> String {
        let mut out = format!("[{}] {}", self.code, self.message);
        for step in self.remediation {
            out.push_str("\n  - ");
            out.push_str(step);
        }
        out
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_code_numbers_are_unique() {
        let mut seen = HashSet::new();
        for code in ErrorCode::all() {
            assert!(
                seen.insert(code.code_number()),
                "duplicate code number for {:?}",
                code
            );
        }
    }

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigReadError.code_string(), "GHI-E001");
        assert_eq!(ErrorCode::RepositoryDuplicate.code_string(), "GHI-E012");
        assert_eq!(ErrorCode::ProvisioningFailed.to_string(), "GHI-E200");
    }

    #[test]
    fn test_category_ranges() {
        assert_eq!(ErrorCode::SuffixStateError.category(), ErrorCategory::Config);
        assert_eq!(
            ErrorCode::ResolutionMissingProvider.category(),
            ErrorCategory::Resolution
        );
        assert_eq!(
            ErrorCode::ProvisioningFailed.category(),
            ErrorCategory::Provisioning
        );
    }

    #[test]
    fn test_all_errors_have_remediation() {
        for code in ErrorCode::all() {
            assert!(!code.message().is_empty());
            assert!(!code.remediation().is_empty(), "{:?} lacks remediation", code);
        }
    }

    #[test]
    fn test_format_full() {
        let full = ErrorCode::RepositoryParseError.entry().format_full();
        assert!(full.starts_with("[GHI-E011] Repository descriptor is not valid YAML"));
        assert!(full.contains("\n  - accessLevel must be"));
    }
}
