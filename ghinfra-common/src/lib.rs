//! Shared library for ghinfra.
//!
//! Loads repository descriptors and operator configuration, resolves which
//! Google Cloud projects each repository may act on, and plans the identities
//! a provisioning sink creates for them.

pub mod config;
pub mod errors;
pub mod google;
pub mod logging;
pub mod provisioning;
pub mod report;
pub mod types;

pub use config::{
    ConfigWarning, LoadError, LoadedConfig, load_operator_config, load_repositories,
    validate_config,
};
pub use errors::{ErrorCategory, ErrorCode, ErrorEntry};
pub use google::{
    Diagnostic, HashedSuffix, PlanError, ProjectReverseIndex, Resolution, ResolvedProjectAccess,
    SuffixSource, SuffixStore, ValidationOutcome, build_index, resolve,
};
pub use logging::{LogConfig, LogFormat, LoggingError, LoggingGuards, init_logging};
pub use provisioning::{
    ApplyReport, DryRunSink, ProvisioningPlan, ProvisioningSink, SinkError, SinkEvent,
    apply_plan, build_provisioning_plan,
};
pub use report::{RepositorySummary, RunReport};
pub use types::{
    AccessLevel, GoogleAccess, GoogleSettings, LinkedProject, OperatorConfig, RepositoryDescriptor,
};
