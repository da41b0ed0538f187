//! Validation of repository Google access and per-project permission sets.
//!
//! A repository is admitted only if its primary project and every linked
//! project are allowed by the operator. One bad reference drops that
//! repository's Google resolution and nothing else; the run continues.

use super::{DEFAULT_PERMISSIONS, DEFAULT_SERVICES, with_baseline};
use crate::types::{AccessLevel, GoogleAccess, GoogleSettings, RepositoryDescriptor};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Access granted to one repository on one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedProjectAccess {
    pub repository: String,
    pub project: String,
    pub is_primary: bool,
    /// `Full` for the primary project.
    pub access_level: AccessLevel,
    pub effective_permissions: BTreeSet<String>,
    pub effective_services: BTreeSet<String>,
    pub region: String,
    /// The repository opted into a storage HMAC key.
    pub hmac_key_requested: bool,
}

/// A rejected project reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub repository: String,
    pub project: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[google][{}][{}] the repository references an unconfigured project",
            self.repository, self.project
        )
    }
}

/// Per-repository validation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Admitted {
        repository: String,
    },
    Rejected {
        repository: String,
        diagnostics: Vec<Diagnostic>,
    },
}

impl ValidationOutcome {
    pub fn repository(&self) -> &str {
        match self {
            Self::Admitted { repository } | Self::Rejected { repository, .. } => repository,
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Rejected { diagnostics, .. } => diagnostics,
            Self::Admitted { .. } => &[],
        }
    }
}

/// Resolver output: admitted access plus one outcome per repository with a
/// Google block. Callers must inspect both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub access: Vec<ResolvedProjectAccess>,
    pub outcomes: Vec<ValidationOutcome>,
}

impl Resolution {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.outcomes
            .iter()
            .flat_map(ValidationOutcome::diagnostics)
    }

    pub fn is_admitted(&self, repository: &str) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| outcome.is_admitted() && outcome.repository() == repository)
    }

    pub fn admitted_repositories(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_admitted())
            .map(ValidationOutcome::repository)
    }

    pub fn access_for<'a>(
        &'a self,
        repository: &'a str,
    ) -> impl Iterator<Item = &'a ResolvedProjectAccess> + 'a {
        self.access
            .iter()
            .filter(move |entry| entry.repository == repository)
    }
}

pub fn resolve(repositories: &[RepositoryDescriptor], settings: &GoogleSettings) -> Resolution {
    let mut resolution = Resolution::default();

    for repository in repositories {
        let Some(google) = repository.google() else {
            continue;
        };

        let diagnostics = unconfigured_references(&repository.name, google, settings);
        if !diagnostics.is_empty() {
            debug!(
                repository = %repository.name,
                rejected_references = diagnostics.len(),
                "repository rejected from google resolution"
            );
            resolution.outcomes.push(ValidationOutcome::Rejected {
                repository: repository.name.clone(),
                diagnostics,
            });
            continue;
        }

        let before = resolution.access.len();
        resolution
            .access
            .extend(resolve_admitted(&repository.name, google, settings));
        debug!(
            repository = %repository.name,
            projects = resolution.access.len() - before,
            "repository admitted to google resolution"
        );
        resolution.outcomes.push(ValidationOutcome::Admitted {
            repository: repository.name.clone(),
        });
    }

    resolution
}

fn unconfigured_references(
    repository: &str,
    google: &GoogleAccess,
    settings: &GoogleSettings,
) -> Vec<Diagnostic> {
    google
        .referenced_projects()
        .filter(|project| !settings.is_allowed(project))
        .map(|project| Diagnostic {
            repository: repository.to_string(),
            project: project.to_string(),
        })
        .collect()
}

fn resolve_admitted(
    repository: &str,
    google: &GoogleAccess,
    settings: &GoogleSettings,
) -> Vec<ResolvedProjectAccess> {
    let region = google
        .region
        .clone()
        .unwrap_or_else(|| settings.default_region.clone());
    let full_permissions = with_baseline(DEFAULT_PERMISSIONS, &google.extra_iam_permissions);
    let full_services = with_baseline(DEFAULT_SERVICES, &google.extra_services);

    let entry = |project: &str,
                 is_primary: bool,
                 access_level: AccessLevel,
                 permissions: BTreeSet<String>,
                 services: BTreeSet<String>| {
        ResolvedProjectAccess {
            repository: repository.to_string(),
            project: project.to_string(),
            is_primary,
            access_level,
            effective_permissions: permissions,
            effective_services: services,
            region: region.clone(),
            hmac_key_requested: google.allow_hmac_key,
        }
    };

    let mut access = Vec::with_capacity(1 + google.linked_projects.len());
    access.push(entry(
        &google.primary_project,
        true,
        AccessLevel::Full,
        full_permissions.clone(),
        full_services.clone(),
    ));

    for (project, linked) in &google.linked_projects {
        let (permissions, services) = match linked.access_level {
            AccessLevel::Full => (full_permissions.clone(), full_services.clone()),
            AccessLevel::Restricted => (
                with_baseline(DEFAULT_PERMISSIONS, &linked.extra_iam_permissions),
                with_baseline(DEFAULT_SERVICES, &linked.extra_services),
            ),
        };
        access.push(entry(
            project,
            false,
            linked.access_level,
            permissions,
            services,
        ));
    }

    access
}
