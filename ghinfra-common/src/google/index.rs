//! Project → repositories reverse index.

use super::resolver::ResolvedProjectAccess;
use serde::Serialize;
use std::collections::BTreeMap;

/// Repositories permitted on each project, in the order they were resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProjectReverseIndex(BTreeMap<String, Vec<String>>);

impl ProjectReverseIndex {
    pub fn repositories_for(&self, project: &str) -> &[String] {
        self.0.get(project).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(project, repositories)| (project.as_str(), repositories.as_slice()))
    }
}

/// Transpose resolved access. Entries are appended as seen; a repository
/// that lists a project twice appears twice.
pub fn build_index(access: &[ResolvedProjectAccess]) -> ProjectReverseIndex {
    let mut index = BTreeMap::<String, Vec<String>>::new();
    for entry in access {
        index
            .entry(entry.project.clone())
            .or_default()
            .push(entry.repository.clone());
    }
    ProjectReverseIndex(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::resolve;
    use crate::types::{GoogleAccess, GoogleSettings, LinkedProject, RepositoryDescriptor};

    #[test]
    fn index_keeps_resolution_order() {
        let repositories = vec![
            RepositoryDescriptor::new("zeta").with_google(GoogleAccess::new("core")),
            RepositoryDescriptor::new("alpha").with_google(
                GoogleAccess::new("apps").with_linked("core", LinkedProject::restricted()),
            ),
        ];
        let resolution = resolve(&repositories, &GoogleSettings::new(["core", "apps"]));
        let index = build_index(&resolution.access);

        assert_eq!(index.repositories_for("core"), ["zeta", "alpha"]);
        assert_eq!(index.repositories_for("apps"), ["alpha"]);
        assert!(index.repositories_for("missing").is_empty());
        assert_eq!(index.projects().collect::<Vec<_>>(), vec!["apps", "core"]);
    }

    #[test]
    fn duplicate_project_reference_is_kept() {
        let repositories = vec![RepositoryDescriptor::new("self").with_google(
            GoogleAccess::new("core").with_linked("core", LinkedProject::full()),
        )];
        let resolution = resolve(&repositories, &GoogleSettings::new(["core"]));
        let index = build_index(&resolution.access);

        assert_eq!(index.repositories_for("core"), ["self", "self"]);
    }

    #[test]
    fn index_serializes_as_a_plain_map() {
        let repositories =
            vec![RepositoryDescriptor::new("api").with_google(GoogleAccess::new("core"))];
        let resolution = resolve(&repositories, &GoogleSettings::new(["core"]));
        let json = serde_json::to_string(&build_index(&resolution.access)).expect("serialize");
        assert_eq!(json, r#"{"core":["api"]}"#);
    }
}
