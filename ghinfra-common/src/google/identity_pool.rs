//! Workload identity pools federating GitHub Actions into each primary project.

use super::resolver::ResolvedProjectAccess;
use super::suffix::SuffixSource;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const GITHUB_ISSUER_URI: &str = "https://token.actions.githubusercontent.com";

/// One pool and its OIDC provider in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadIdentityPool {
    pub project: String,
    pub pool_id: String,
    pub provider_id: String,
    pub display_name: String,
    pub issuer_uri: String,
    /// Google attribute → token assertion.
    pub attribute_mapping: BTreeMap<String, String>,
}

impl WorkloadIdentityPool {
    pub fn new(project: impl Into<String>, suffix: &str) -> Self {
        let attribute_mapping = [
            ("google.subject", "assertion.sub"),
            ("attribute.actor", "assertion.actor"),
            ("attribute.repository_owner", "assertion.repository_owner"),
            ("attribute.repository", "assertion.repository"),
        ]
        .into_iter()
        .map(|(attribute, assertion)| (attribute.to_string(), assertion.to_string()))
        .collect();

        Self {
            project: project.into(),
            pool_id: format!("github-{suffix}"),
            provider_id: format!("github-actions-{suffix}"),
            display_name: "GitHub Identity Pool".to_string(),
            issuer_uri: GITHUB_ISSUER_URI.to_string(),
            attribute_mapping,
        }
    }

    /// `projects/<project>/locations/global/workloadIdentityPools/<pool>`
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/locations/global/workloadIdentityPools/{}",
            self.project, self.pool_id
        )
    }

    /// Full provider name, as consumed by `google-github-actions/auth`.
    pub fn provider_name(&self) -> String {
        format!("{}/providers/{}", self.resource_name(), self.provider_id)
    }

    /// Suffix key for a project's pool.
    pub fn suffix_key(project: &str) -> String {
        format!("gcp-iam-identity-pool-{project}")
    }
}

/// One pool per distinct primary project, sorted by project.
pub fn plan_identity_pools(
    access: &[ResolvedProjectAccess],
    suffixes: &mut dyn SuffixSource,
) -> Vec<WorkloadIdentityPool> {
    access
        .iter()
        .filter(|entry| entry.is_primary)
        .map(|entry| entry.project.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|project| {
            let suffix = suffixes.suffix_for(&WorkloadIdentityPool::suffix_key(project));
            WorkloadIdentityPool::new(project, &suffix)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::resolve;
    use crate::google::suffix::HashedSuffix;
    use crate::types::{GoogleAccess, GoogleSettings, LinkedProject, RepositoryDescriptor};

    #[test]
    fn pools_exist_only_for_primary_projects() {
        let repositories = vec![
            RepositoryDescriptor::new("a").with_google(
                GoogleAccess::new("core").with_linked("dns", LinkedProject::full()),
            ),
            RepositoryDescriptor::new("b").with_google(GoogleAccess::new("core")),
            RepositoryDescriptor::new("c").with_google(GoogleAccess::new("apps")),
        ];
        let resolution = resolve(&repositories, &GoogleSettings::new(["core", "dns", "apps"]));

        let pools = plan_identity_pools(&resolution.access, &mut HashedSuffix);
        let projects = pools
            .iter()
            .map(|pool| pool.project.as_str())
            .collect::<Vec<_>>();
        assert_eq!(projects, vec!["apps", "core"]);
    }

    #[test]
    fn pool_names_share_the_suffix() {
        let pool = WorkloadIdentityPool::new("core", "abcd1234");
        assert_eq!(pool.pool_id, "github-abcd1234");
        assert_eq!(pool.provider_id, "github-actions-abcd1234");
        assert_eq!(
            pool.provider_name(),
            "projects/core/locations/global/workloadIdentityPools/github-abcd1234/providers/github-actions-abcd1234"
        );
        assert_eq!(
            pool.attribute_mapping["attribute.repository"],
            "assertion.repository"
        );
    }
}
