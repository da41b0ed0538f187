//! Top-level run summary.

use crate::google::{ProjectReverseIndex, Resolution, build_index};
use crate::provisioning::ProvisioningPlan;
use crate::types::{OperatorConfig, RepositoryDescriptor};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub google: GoogleReport,
    pub repositories: BTreeMap<String, RepositorySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoogleReport {
    /// Sorted allowed projects.
    pub allowed: Vec<String>,
    /// Project → repositories permitted on it.
    pub configured: ProjectReverseIndex,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepositorySummary {
    /// Google access was resolved.
    pub google: bool,
    /// A storage HMAC key is planned.
    pub gcs: bool,
}

impl RunReport {
    /// Every descriptor gets a summary, with or without a Google block.
    pub fn build(
        config: &OperatorConfig,
        descriptors: &[RepositoryDescriptor],
        resolution: &Resolution,
        plan: &ProvisioningPlan,
    ) -> Self {
        let repositories = descriptors
            .iter()
            .map(|descriptor| {
                let google = resolution.is_admitted(&descriptor.name);
                let gcs = google
                    && plan
                        .identity_for(&descriptor.name)
                        .is_some_and(|identity| identity.hmac_key.is_some());
                (descriptor.name.clone(), RepositorySummary { google, gcs })
            })
            .collect();

        Self {
            google: GoogleReport {
                allowed: config.google.allowed_projects(),
                configured: build_index(&resolution.access),
            },
            repositories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::{HashedSuffix, resolve};
    use crate::provisioning::build_provisioning_plan;
    use crate::types::{GoogleAccess, GoogleSettings, RepositoriesConfig};

    #[test]
    fn report_summarizes_each_repository() {
        let config = OperatorConfig {
            repositories: RepositoriesConfig {
                owner: "acme".to_string(),
            },
            google: GoogleSettings::new(["web", "core"]).with_hmac_keys(true),
        };
        let descriptors = vec![
            RepositoryDescriptor::new("docs"),
            RepositoryDescriptor::new("site")
                .with_google(GoogleAccess::new("web").with_hmac_key(true)),
            RepositoryDescriptor::new("api").with_google(GoogleAccess::new("core")),
            RepositoryDescriptor::new("rogue")
                .with_google(GoogleAccess::new("nowhere").with_hmac_key(true)),
        ];
        let resolution = resolve(&descriptors, &config.google);
        let plan =
            build_provisioning_plan(&resolution, &config, &mut HashedSuffix).expect("plan");

        let report = RunReport::build(&config, &descriptors, &resolution, &plan);

        assert_eq!(report.google.allowed, vec!["core", "web"]);
        assert_eq!(report.google.configured.repositories_for("web"), ["site"]);
        assert_eq!(report.repositories["docs"], RepositorySummary::default());
        assert_eq!(
            report.repositories["site"],
            RepositorySummary {
                google: true,
                gcs: true
            }
        );
        assert_eq!(
            report.repositories["api"],
            RepositorySummary {
                google: true,
                gcs: false
            }
        );
        assert_eq!(report.repositories["rogue"], RepositorySummary::default());

        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["google"]["configured"]["core"][0], "api");
        assert_eq!(json["repositories"]["site"]["gcs"], true);
    }
}
