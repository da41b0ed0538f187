//! Google Cloud access resolution.
//!
//! The pipeline is pure and runs once per invocation:
//!
//! 1. [`resolver::resolve`] validates repositories against the allowed
//!    projects and computes per-project permission and service sets.
//! 2. [`services::plan_service_enablement`] and
//!    [`identity_pool::plan_identity_pools`] derive the phase-one work.
//! 3. [`planner::plan_repository`] derives service accounts, custom roles,
//!    bindings, and secret payloads per repository.
//! 4. [`index::build_index`] transposes the resolved access into a
//!    project → repositories map for reporting.

pub mod identity_pool;
pub mod index;
pub mod planner;
pub mod resolver;
pub mod services;
pub mod suffix;

use std::collections::BTreeSet;

pub use identity_pool::{WorkloadIdentityPool, plan_identity_pools};
pub use index::{ProjectReverseIndex, build_index};
pub use planner::{
    CustomRole, HmacKeyRequest, IdentityBindingPlan, PlanError, PlannerContext, ProviderIndex,
    RoleBinding, SecretPayload, ServiceAccount, WorkloadIdentityBinding, plan_repository,
};
pub use resolver::{Diagnostic, Resolution, ResolvedProjectAccess, ValidationOutcome, resolve};
pub use services::{ProjectServices, plan_service_enablement};
pub use suffix::{HashedSuffix, SuffixSource, SuffixStateError, SuffixStore};

/// Repository names are cut to this length inside generated identifiers.
pub const MAX_REPOSITORY_LENGTH: usize = 18;

/// Length of the per-repository and per-pool suffix.
pub const SUFFIX_LENGTH: usize = 8;

/// Permissions every project grant carries.
pub const DEFAULT_PERMISSIONS: &[&str] = &[
    "cloudkms.cryptoKeyVersions.useToDecrypt",
    "cloudkms.cryptoKeyVersions.useToEncrypt",
    "cloudkms.cryptoKeys.getIamPolicy",
    "cloudkms.cryptoKeys.setIamPolicy",
    "cloudkms.locations.get",
    "cloudkms.locations.list",
    "compute.regions.list",
    "iam.serviceAccountKeys.create",
    "iam.serviceAccountKeys.delete",
    "iam.serviceAccountKeys.disable",
    "iam.serviceAccountKeys.enable",
    "iam.serviceAccountKeys.get",
    "iam.serviceAccountKeys.list",
    "iam.serviceAccounts.create",
    "iam.serviceAccounts.delete",
    "iam.serviceAccounts.disable",
    "iam.serviceAccounts.enable",
    "iam.serviceAccounts.get",
    "iam.serviceAccounts.getIamPolicy",
    "iam.serviceAccounts.list",
    "iam.serviceAccounts.setIamPolicy",
    "iam.serviceAccounts.undelete",
    "iam.serviceAccounts.update",
    "resourcemanager.projects.get",
    "resourcemanager.projects.getIamPolicy",
    "resourcemanager.projects.setIamPolicy",
    "resourcemanager.projects.update",
    "storage.hmacKeys.create",
    "storage.hmacKeys.delete",
    "storage.hmacKeys.get",
    "storage.hmacKeys.list",
    "storage.hmacKeys.update",
    "storage.buckets.create",
    "storage.buckets.createTagBinding",
    "storage.buckets.delete",
    "storage.buckets.deleteTagBinding",
    "storage.buckets.get",
    "storage.buckets.getIamPolicy",
    "storage.buckets.getObjectInsights",
    "storage.buckets.list",
    "storage.buckets.listEffectiveTags",
    "storage.buckets.listTagBindings",
    "storage.buckets.setIamPolicy",
    "storage.buckets.update",
    "storage.multipartUploads.abort",
    "storage.multipartUploads.create",
    "storage.multipartUploads.list",
    "storage.multipartUploads.listParts",
    "storage.objects.create",
    "storage.objects.delete",
    "storage.objects.get",
    "storage.objects.getIamPolicy",
    "storage.objects.list",
    "storage.objects.setIamPolicy",
    "storage.objects.update",
];

/// Services enabled on every touched project.
pub const DEFAULT_SERVICES: &[&str] = &[
    "iam.googleapis.com",
    "iamcredentials.googleapis.com",
    "cloudresourcemanager.googleapis.com",
    "cloudkms.googleapis.com",
    "storage.googleapis.com",
    "storage-component.googleapis.com",
    "compute.googleapis.com",
];

/// `baseline ∪ extras` as an ordered set.
pub(crate) fn with_baseline(baseline: &[&str], extras: &BTreeSet<String>) -> BTreeSet<String> {
    baseline
        .iter()
        .map(|item| (*item).to_string())
        .chain(extras.iter().cloned())
        .collect()
}

/// First [`MAX_REPOSITORY_LENGTH`] characters of a repository name.
pub(crate) fn truncate_repository(repository: &str) -> &str {
    match repository.char_indices().nth(MAX_REPOSITORY_LENGTH) {
        Some((end, _)) => &repository[..end],
        None => repository,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_union_is_deduplicated() {
        let extras = BTreeSet::from(["compute.regions.list".to_string(), "x.y.z".to_string()]);
        let merged = with_baseline(DEFAULT_PERMISSIONS, &extras);
        assert_eq!(merged.len(), DEFAULT_PERMISSIONS.len() + 1);
        assert!(merged.contains("x.y.z"));
    }

    #[test]
    fn truncation_keeps_short_names() {
        assert_eq!(truncate_repository("site"), "site");
        assert_eq!(
            truncate_repository("a-very-long-repository-name"),
            "a-very-long-reposi"
        );
        assert_eq!(truncate_repository("exactly-eighteen-c"), "exactly-eighteen-c");
    }
}
