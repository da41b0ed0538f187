//! Provisioning plan assembly and the two-phase apply driver.
//!
//! Phase one enables services and creates workload identity pools; phase two
//! applies per-repository identities and writes their secrets. Operations in
//! a phase run concurrently and the first failure aborts the run.

use crate::errors::ErrorCode;
use crate::google::{
    HmacKeyRequest, IdentityBindingPlan, PlanError, PlannerContext, ProjectServices, Resolution,
    SuffixSource, WorkloadIdentityPool, plan_identity_pools, plan_repository,
    plan_service_enablement,
};
use crate::types::OperatorConfig;
use futures::future::try_join_all;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Everything the sink is asked to create in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningPlan {
    pub services: Vec<ProjectServices>,
    pub identity_pools: Vec<WorkloadIdentityPool>,
    pub identities: Vec<IdentityBindingPlan>,
}

impl ProvisioningPlan {
    pub fn identity_for(&self, repository: &str) -> Option<&IdentityBindingPlan> {
        self.identities
            .iter()
            .find(|identity| identity.repository == repository)
    }
}

/// Plan every admitted repository in resolution order.
pub fn build_provisioning_plan(
    resolution: &Resolution,
    config: &OperatorConfig,
    suffixes: &mut dyn SuffixSource,
) -> Result<ProvisioningPlan, PlanError> {
    let services = plan_service_enablement(&resolution.access);
    let identity_pools = plan_identity_pools(&resolution.access, suffixes);
    let ctx = PlannerContext::new(config, &identity_pools);

    let identities = resolution
        .admitted_repositories()
        .map(|repository| plan_repository(&resolution.access, repository, &ctx, suffixes))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        projects = services.len(),
        pools = identity_pools.len(),
        identities = identities.len(),
        "built provisioning plan"
    );
    Ok(ProvisioningPlan {
        services,
        identity_pools,
        identities,
    })
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{operation} failed for {target}: {reason}")]
    Rejected {
        operation: &'static str,
        target: String,
        reason: String,
    },
    #[error("failed to encode secret {key} for {repository}: {source}")]
    Encode {
        repository: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SinkError {
    pub const fn error_code(&self) -> ErrorCode {
        ErrorCode::ProvisioningFailed
    }
}

/// A created storage HMAC key pair.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct HmacCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for HmacCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Receiver of provisioning operations.
///
/// Implementations talk to the cloud and secret store; the driver only
/// guarantees ordering between phases.
#[allow(async_fn_in_trait)]
pub trait ProvisioningSink: Send + Sync {
    async fn enable_services(&self, services: &ProjectServices) -> Result<(), SinkError>;

    async fn create_identity_pool(&self, pool: &WorkloadIdentityPool) -> Result<(), SinkError>;

    /// Service account, custom roles, role bindings, and the workload
    /// identity binding of one repository.
    async fn apply_identity(&self, identity: &IdentityBindingPlan) -> Result<(), SinkError>;

    async fn create_hmac_key(&self, request: &HmacKeyRequest)
    -> Result<HmacCredential, SinkError>;

    async fn write_secret(&self, repository: &str, key: &str, value: &str)
    -> Result<(), SinkError>;
}

/// Counts of applied operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub services_enabled: usize,
    pub pools_created: usize,
    pub identities_applied: usize,
    pub secrets_written: usize,
    pub hmac_keys_created: usize,
}

/// Apply `plan` to `sink`. Phase two starts only after phase one succeeded.
pub async fn apply_plan<S: ProvisioningSink>(
    sink: &S,
    plan: &ProvisioningPlan,
) -> Result<ApplyReport, SinkError> {
    let mut report = ApplyReport::default();

    try_join_all(plan.services.iter().map(|services| sink.enable_services(services))).await?;
    report.services_enabled = plan.services.len();

    try_join_all(
        plan.identity_pools
            .iter()
            .map(|pool| sink.create_identity_pool(pool)),
    )
    .await?;
    report.pools_created = plan.identity_pools.len();
    info!(
        services = report.services_enabled,
        pools = report.pools_created,
        "phase one complete"
    );

    let hmac_created =
        try_join_all(plan.identities.iter().map(|identity| apply_repository(sink, identity)))
            .await?;
    report.identities_applied = plan.identities.len();
    report.hmac_keys_created = hmac_created.iter().filter(|created| **created).count();
    report.secrets_written = report.identities_applied + report.hmac_keys_created;
    info!(
        identities = report.identities_applied,
        hmac_keys = report.hmac_keys_created,
        "phase two complete"
    );

    Ok(report)
}

/// Returns whether an HMAC key was created.
async fn apply_repository<S: ProvisioningSink>(
    sink: &S,
    identity: &IdentityBindingPlan,
) -> Result<bool, SinkError> {
    sink.apply_identity(identity).await?;

    let secret = identity
        .secret
        .to_json()
        .map_err(|source| SinkError::Encode {
            repository: identity.repository.clone(),
            key: identity.secret_key.clone(),
            source,
        })?;
    sink.write_secret(&identity.repository, &identity.secret_key, &secret)
        .await?;

    let Some(request) = &identity.hmac_key else {
        return Ok(false);
    };
    let credential = sink.create_hmac_key(request).await?;
    let value = serde_json::to_string(&credential).map_err(|source| SinkError::Encode {
        repository: identity.repository.clone(),
        key: request.secret_key.clone(),
        source,
    })?;
    sink.write_secret(&identity.repository, &request.secret_key, &value)
        .await?;
    Ok(true)
}

/// One operation received by [`DryRunSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SinkEvent {
    EnableServices {
        project: String,
        services: Vec<String>,
    },
    CreateIdentityPool {
        project: String,
        pool: String,
        provider: String,
    },
    ApplyIdentity {
        repository: String,
        service_account: String,
        roles: Vec<String>,
        workload_identity_member: String,
    },
    CreateHmacKey {
        project: String,
        service_account: String,
    },
    WriteSecret {
        repository: String,
        key: String,
        value: String,
    },
}

/// Sink that records and logs operations instead of applying them.
#[derive(Debug, Clone, Default)]
pub struct DryRunSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded operations in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

impl ProvisioningSink for DryRunSink {
    async fn enable_services(&self, services: &ProjectServices) -> Result<(), SinkError> {
        info!(
            project = %services.project,
            count = services.services.len(),
            "dry-run: enable services"
        );
        self.record(SinkEvent::EnableServices {
            project: services.project.clone(),
            services: services.services.iter().cloned().collect(),
        });
        Ok(())
    }

    async fn create_identity_pool(&self, pool: &WorkloadIdentityPool) -> Result<(), SinkError> {
        info!(project = %pool.project, pool = %pool.pool_id, "dry-run: create identity pool");
        self.record(SinkEvent::CreateIdentityPool {
            project: pool.project.clone(),
            pool: pool.resource_name(),
            provider: pool.provider_name(),
        });
        Ok(())
    }

    async fn apply_identity(&self, identity: &IdentityBindingPlan) -> Result<(), SinkError> {
        info!(
            repository = %identity.repository,
            account = %identity.service_account.account_id,
            roles = identity.roles.len(),
            "dry-run: apply identity"
        );
        self.record(SinkEvent::ApplyIdentity {
            repository: identity.repository.clone(),
            service_account: identity.service_account.email(),
            roles: identity.roles.iter().map(|role| role.resource_name()).collect(),
            workload_identity_member: identity.workload_identity.member.clone(),
        });
        Ok(())
    }

    async fn create_hmac_key(
        &self,
        request: &HmacKeyRequest,
    ) -> Result<HmacCredential, SinkError> {
        info!(
            project = %request.project,
            account = %request.service_account_email,
            "dry-run: create hmac key"
        );
        self.record(SinkEvent::CreateHmacKey {
            project: request.project.clone(),
            service_account: request.service_account_email.clone(),
        });
        Ok(HmacCredential {
            access_key_id: "dry-run".to_string(),
            secret_access_key: "dry-run".to_string(),
        })
    }

    async fn write_secret(&self, repository: &str, key: &str, value: &str) -> Result<(), SinkError> {
        info!(repository, key, "dry-run: write secret");
        self.record(SinkEvent::WriteSecret {
            repository: repository.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}
