//! Per-repository identity planning.
//!
//! Turns a repository's resolved access into the concrete identities the
//! provisioning sink creates: one CI service account in the primary project,
//! one custom role per touched project, the role bindings tying them
//! together, and the workload identity binding that lets GitHub Actions in
//! that repository impersonate the account.
//!
//! Planning is all-or-nothing per repository: a missing provider or pool is
//! a [`PlanError`].

use super::identity_pool::WorkloadIdentityPool;
use super::resolver::ResolvedProjectAccess;
use super::suffix::SuffixSource;
use super::truncate_repository;
use crate::errors::ErrorCode;
use crate::types::OperatorConfig;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

pub const WORKLOAD_IDENTITY_USER_ROLE: &str = "roles/iam.workloadIdentityUser";
pub const GOOGLE_SECRET_KEY: &str = "google-cloud";
pub const STORAGE_SECRET_KEY: &str = "google-cloud-storage";
pub const ROLE_STAGE: &str = "GA";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("no provider configured for project {project} (repository {repository})")]
    MissingProvider { repository: String, project: String },
    #[error("no workload identity pool for primary project {project} (repository {repository})")]
    MissingIdentityPool { repository: String, project: String },
    #[error("repository {repository} has no primary project entry")]
    MissingPrimary { repository: String },
}

impl PlanError {
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingProvider { .. } => ErrorCode::ResolutionMissingProvider,
            Self::MissingIdentityPool { .. } => ErrorCode::ResolutionMissingIdentityPool,
            Self::MissingPrimary { .. } => ErrorCode::ResolutionMissingPrimary,
        }
    }
}

/// Projects the sink holds a provider for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderIndex(BTreeSet<String>);

impl ProviderIndex {
    pub fn new<I, S>(projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(projects.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, project: &str) -> bool {
        self.0.contains(project)
    }
}

/// Shared inputs for planning every repository in a run.
#[derive(Debug, Clone)]
pub struct PlannerContext {
    pub owner: String,
    pub allow_hmac_keys: bool,
    pub providers: ProviderIndex,
    /// Identity pool per primary project.
    pub pools: BTreeMap<String, WorkloadIdentityPool>,
}

impl PlannerContext {
    /// One provider per allowed project, plus the pools planned for the run.
    pub fn new(config: &OperatorConfig, pools: &[WorkloadIdentityPool]) -> Self {
        Self {
            owner: config.repositories.owner.clone(),
            allow_hmac_keys: config.google.allow_hmac_keys,
            providers: ProviderIndex::new(config.google.allowed_projects()),
            pools: pools
                .iter()
                .map(|pool| (pool.project.clone(), pool.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceAccount {
    pub project: String,
    pub account_id: String,
    pub display_name: String,
}

impl ServiceAccount {
    pub fn email(&self) -> String {
        format!("{}@{}.iam.gserviceaccount.com", self.account_id, self.project)
    }

    pub fn resource_name(&self) -> String {
        format!("projects/{}/serviceAccounts/{}", self.project, self.email())
    }

    pub fn member(&self) -> String {
        format!("serviceAccount:{}", self.email())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomRole {
    pub project: String,
    pub role_id: String,
    pub title: String,
    pub stage: String,
    pub permissions: BTreeSet<String>,
}

impl CustomRole {
    pub fn resource_name(&self) -> String {
        format!("projects/{}/roles/{}", self.project, self.role_id)
    }
}

/// Project-level grant of a custom role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleBinding {
    pub project: String,
    pub role: String,
    pub member: String,
}

/// Grant on the service account itself, scoped to one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadIdentityBinding {
    pub service_account: String,
    pub role: String,
    pub member: String,
}

/// Contents of the `google-cloud` repository secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretPayload {
    pub workload_identity_provider: String,
    pub ci_service_account: String,
    pub region: String,
}

impl SecretPayload {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A storage HMAC key for the CI service account.
///
/// The key itself only exists after the sink creates it; the sink stores it
/// under [`HmacKeyRequest::secret_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HmacKeyRequest {
    pub project: String,
    pub service_account_email: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityBindingPlan {
    pub repository: String,
    pub suffix: String,
    pub service_account: ServiceAccount,
    pub roles: Vec<CustomRole>,
    pub role_bindings: Vec<RoleBinding>,
    pub workload_identity: WorkloadIdentityBinding,
    pub secret_key: String,
    pub secret: SecretPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hmac_key: Option<HmacKeyRequest>,
}

impl IdentityBindingPlan {
    /// Suffix key shared by a repository's service account and roles.
    pub fn suffix_key(repository: &str, primary_project: &str) -> String {
        format!("gcp-iam-role-ci-{repository}-{primary_project}")
    }
}

/// Plan one admitted repository.
///
/// `entries` may include other repositories' access; only entries for
/// `repository` are used.
pub fn plan_repository(
    entries: &[ResolvedProjectAccess],
    repository: &str,
    ctx: &PlannerContext,
    suffixes: &mut dyn SuffixSource,
) -> Result<IdentityBindingPlan, PlanError> {
    let entries = entries
        .iter()
        .filter(|entry| entry.repository == repository)
        .collect::<Vec<_>>();
    let primary = entries
        .iter()
        .find(|entry| entry.is_primary)
        .ok_or_else(|| PlanError::MissingPrimary {
            repository: repository.to_string(),
        })?;

    if let Some(entry) = entries
        .iter()
        .find(|entry| !ctx.providers.contains(&entry.project))
    {
        return Err(PlanError::MissingProvider {
            repository: repository.to_string(),
            project: entry.project.clone(),
        });
    }

    let pool = ctx
        .pools
        .get(&primary.project)
        .ok_or_else(|| PlanError::MissingIdentityPool {
            repository: repository.to_string(),
            project: primary.project.clone(),
        })?;

    let suffix = suffixes.suffix_for(&IdentityBindingPlan::suffix_key(
        repository,
        &primary.project,
    ));
    let truncated = truncate_repository(repository);
    let title = format!("GitHub Repository: {repository}");

    let service_account = ServiceAccount {
        project: primary.project.clone(),
        account_id: format!("ci-{truncated}-{suffix}"),
        display_name: title.clone(),
    };
    let member = service_account.member();

    let mut permissions_by_project = BTreeMap::<&str, BTreeSet<String>>::new();
    for entry in &entries {
        permissions_by_project
            .entry(entry.project.as_str())
            .or_default()
            .extend(entry.effective_permissions.iter().cloned());
    }

    let role_id = format!("ci.{}.{suffix}", truncated.replace('-', "_"));
    let roles = permissions_by_project
        .into_iter()
        .map(|(project, permissions)| CustomRole {
            project: project.to_string(),
            role_id: role_id.clone(),
            title: title.clone(),
            stage: ROLE_STAGE.to_string(),
            permissions,
        })
        .collect::<Vec<_>>();
    let role_bindings = roles
        .iter()
        .map(|role| RoleBinding {
            project: role.project.clone(),
            role: role.resource_name(),
            member: member.clone(),
        })
        .collect::<Vec<_>>();

    let workload_identity = WorkloadIdentityBinding {
        service_account: service_account.resource_name(),
        role: WORKLOAD_IDENTITY_USER_ROLE.to_string(),
        member: format!(
            "principalSet://iam.googleapis.com/{}/attribute.repository/{}/{}",
            pool.resource_name(),
            ctx.owner,
            repository
        ),
    };

    let secret = SecretPayload {
        workload_identity_provider: pool.provider_name(),
        ci_service_account: service_account.email(),
        region: primary.region.clone(),
    };

    let hmac_key = (primary.hmac_key_requested && ctx.allow_hmac_keys).then(|| HmacKeyRequest {
        project: primary.project.clone(),
        service_account_email: service_account.email(),
        secret_key: STORAGE_SECRET_KEY.to_string(),
    });

    debug!(
        repository,
        account = %service_account.account_id,
        roles = roles.len(),
        hmac = hmac_key.is_some(),
        "planned repository identity"
    );

    Ok(IdentityBindingPlan {
        repository: repository.to_string(),
        suffix,
        service_account,
        roles,
        role_bindings,
        workload_identity,
        secret_key: GOOGLE_SECRET_KEY.to_string(),
        secret,
        hmac_key,
    })
}
