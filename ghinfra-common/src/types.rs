//! Declarative input types shared by the loader, resolver, and CLI.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One managed repository, as declared in `assets/repositories/*.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDescriptor {
    /// Repository name; unique across all descriptors.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_permissions: Option<AccessPermissions>,
}

impl RepositoryDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            access_permissions: None,
        }
    }

    /// Attach a Google access block.
    pub fn with_google(mut self, google: GoogleAccess) -> Self {
        self.access_permissions
            .get_or_insert_with(AccessPermissions::default)
            .google = Some(google);
        self
    }

    /// The declared Google access block, if any.
    ///
    /// A block without a primary project counts as no Google access.
    pub fn google(&self) -> Option<&GoogleAccess> {
        self.access_permissions
            .as_ref()
            .and_then(|permissions| permissions.google.as_ref())
            .filter(|google| !google.primary_project.is_empty())
    }
}

/// Per-cloud access blocks of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleAccess>,
}

/// Google Cloud access requested by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAccess {
    /// Primary project; hosts the CI service account. Empty when absent.
    #[serde(default, rename = "project", alias = "primaryProject")]
    pub primary_project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(
        default,
        rename = "iamPermissions",
        alias = "extraIamPermissions",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub extra_iam_permissions: BTreeSet<String>,
    #[serde(
        default,
        rename = "enabledServices",
        alias = "extraServices",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub extra_services: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub linked_projects: BTreeMap<String, LinkedProject>,
    /// Opt-in for a storage HMAC key pair.
    #[serde(default, rename = "hmacKey", alias = "allowHmacKey")]
    pub allow_hmac_key: bool,
}

impl GoogleAccess {
    pub fn new(primary_project: impl Into<String>) -> Self {
        Self {
            primary_project: primary_project.into(),
            region: None,
            extra_iam_permissions: BTreeSet::new(),
            extra_services: BTreeSet::new(),
            linked_projects: BTreeMap::new(),
            allow_hmac_key: false,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_iam_permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_services
            .extend(services.into_iter().map(Into::into));
        self
    }

    pub fn with_linked(mut self, project: impl Into<String>, linked: LinkedProject) -> Self {
        self.linked_projects.insert(project.into(), linked);
        self
    }

    pub fn with_hmac_key(mut self, enabled: bool) -> Self {
        self.allow_hmac_key = enabled;
        self
    }

    /// Primary project followed by linked projects in sorted order.
    pub fn referenced_projects(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_project.as_str())
            .chain(self.linked_projects.keys().map(String::as_str))
    }
}

/// Access level granted on a linked project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Same permission and service set as the primary project.
    Full,
    /// Baseline plus the linked project's own extras.
    #[default]
    Restricted,
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Restricted => write!(f, "restricted"),
        }
    }
}

/// An additional project a repository may act on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedProject {
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(
        default,
        rename = "iamPermissions",
        alias = "extraIamPermissions",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub extra_iam_permissions: BTreeSet<String>,
    #[serde(
        default,
        rename = "enabledServices",
        alias = "extraServices",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub extra_services: BTreeSet<String>,
}

impl LinkedProject {
    pub fn full() -> Self {
        Self {
            access_level: AccessLevel::Full,
            ..Self::default()
        }
    }

    pub fn restricted() -> Self {
        Self::default()
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_iam_permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_services
            .extend(services.into_iter().map(Into::into));
        self
    }
}

/// Operator configuration (`ghinfra.toml`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default)]
    pub repositories: RepositoriesConfig,
    #[serde(default)]
    pub google: GoogleSettings,
}

/// Source-control owner settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoriesConfig {
    /// GitHub user or organization owning every managed repository.
    #[serde(default)]
    pub owner: String,
}

/// Global Google Cloud settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleSettings {
    /// Allowed project identifiers.
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default = "default_region")]
    pub default_region: String,
    #[serde(default)]
    pub allow_hmac_keys: bool,
}

impl GoogleSettings {
    pub fn new<I, S>(projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            projects: projects.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_hmac_keys(mut self, allowed: bool) -> Self {
        self.allow_hmac_keys = allowed;
        self
    }

    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    pub fn is_allowed(&self, project: &str) -> bool {
        self.projects.iter().any(|allowed| allowed == project)
    }

    /// Sorted, de-duplicated allowed projects.
    pub fn allowed_projects(&self) -> Vec<String> {
        self.projects
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            default_region: default_region(),
            allow_hmac_keys: false,
        }
    }
}

fn default_region() -> String {
    "europe-west4".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_parses_original_yaml_keys() {
        let yaml = r#"
name: infrastructure
description: Infra repository
accessPermissions:
  google:
    project: core-prod
    region: us-central1
    iamPermissions: [run.services.create]
    enabledServices: [run.googleapis.com]
    hmacKey: true
    linkedProjects:
      shared-dns:
        accessLevel: full
      logs:
        iamPermissions: [logging.logEntries.list]
"#;
        let descriptor: RepositoryDescriptor = serde_yaml_ng::from_str(yaml).expect("parse");
        let google = descriptor.google().expect("google block");
        assert_eq!(google.primary_project, "core-prod");
        assert!(google.allow_hmac_key);
        assert_eq!(google.linked_projects["shared-dns"].access_level, AccessLevel::Full);
        assert_eq!(google.linked_projects["logs"].access_level, AccessLevel::Restricted);
        assert!(
            google.linked_projects["logs"]
                .extra_iam_permissions
                .contains("logging.logEntries.list")
        );
    }

    #[test]
    fn descriptor_accepts_descriptive_aliases() {
        let yaml = r#"
name: site
accessPermissions:
  google:
    primaryProject: web
    extraIamPermissions: [a.b.c]
    extraServices: [dns.googleapis.com]
    allowHmacKey: false
"#;
        let descriptor: RepositoryDescriptor = serde_yaml_ng::from_str(yaml).expect("parse");
        let google = descriptor.google().expect("google block");
        assert_eq!(google.primary_project, "web");
        assert!(google.extra_iam_permissions.contains("a.b.c"));
        assert!(google.extra_services.contains("dns.googleapis.com"));
    }

    #[test]
    fn google_block_without_project_is_no_google_access() {
        let yaml = r#"
name: partial
accessPermissions:
  google:
    hmacKey: true
"#;
        let descriptor: RepositoryDescriptor = serde_yaml_ng::from_str(yaml).expect("parse");
        assert!(descriptor.access_permissions.is_some());
        assert!(descriptor.google().is_none());

        let empty = RepositoryDescriptor::new("empty").with_google(GoogleAccess::new(""));
        assert!(empty.google().is_none());
    }

    #[test]
    fn unknown_access_level_is_rejected() {
        let yaml = "accessLevel: admin\n";
        assert!(serde_yaml_ng::from_str::<LinkedProject>(yaml).is_err());
    }

    #[test]
    fn referenced_projects_lists_primary_first() {
        let google = GoogleAccess::new("main")
            .with_linked("zeta", LinkedProject::restricted())
            .with_linked("alpha", LinkedProject::full());
        let projects = google.referenced_projects().collect::<Vec<_>>();
        assert_eq!(projects, vec!["main", "alpha", "zeta"]);
    }

    #[test]
    fn operator_config_defaults() {
        let config: OperatorConfig = toml::from_str(
            r#"
[repositories]
owner = "acme"

[google]
projects = ["b", "a", "b"]
"#,
        )
        .expect("parse");
        assert_eq!(config.google.default_region, "europe-west4");
        assert!(!config.google.allow_hmac_keys);
        assert_eq!(config.google.allowed_projects(), vec!["a", "b"]);
        assert!(config.google.is_allowed("a"));
        assert!(!config.google.is_allowed("c"));
    }
}
