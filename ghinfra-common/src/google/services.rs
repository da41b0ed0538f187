//! Service enablement per touched project.

use super::resolver::ResolvedProjectAccess;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectServices {
    pub project: String,
    pub services: BTreeSet<String>,
}

/// Union of effective services per project, sorted by project.
///
/// Every project that appears in `access` is touched, primary or linked.
pub fn plan_service_enablement(access: &[ResolvedProjectAccess]) -> Vec<ProjectServices> {
    let mut by_project: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for entry in access {
        by_project
            .entry(entry.project.as_str())
            .or_default()
            .extend(entry.effective_services.iter().cloned());
    }

    by_project
        .into_iter()
        .map(|(project, services)| ProjectServices {
            project: project.to_string(),
            services,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::{DEFAULT_SERVICES, resolve};
    use crate::types::{GoogleAccess, GoogleSettings, LinkedProject, RepositoryDescriptor};

    #[test]
    fn services_are_merged_across_repositories() {
        let repositories = vec![
            RepositoryDescriptor::new("api").with_google(
                GoogleAccess::new("core").with_services(["run.googleapis.com"]),
            ),
            RepositoryDescriptor::new("web").with_google(
                GoogleAccess::new("core")
                    .with_services(["dns.googleapis.com"])
                    .with_linked(
                        "logs",
                        LinkedProject::restricted().with_services(["logging.googleapis.com"]),
                    ),
            ),
        ];
        let resolution = resolve(&repositories, &GoogleSettings::new(["core", "logs"]));
        let plan = plan_service_enablement(&resolution.access);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].project, "core");
        assert!(plan[0].services.contains("run.googleapis.com"));
        assert!(plan[0].services.contains("dns.googleapis.com"));
        assert_eq!(plan[0].services.len(), DEFAULT_SERVICES.len() + 2);
        assert_eq!(plan[1].project, "logs");
        assert!(plan[1].services.contains("logging.googleapis.com"));
        assert!(!plan[1].services.contains("run.googleapis.com"));
    }

    #[test]
    fn no_access_means_no_services() {
        assert!(plan_service_enablement(&[]).is_empty());
    }
}
