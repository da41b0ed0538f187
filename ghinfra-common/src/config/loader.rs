//! Loading of the operator configuration and repository descriptors.

use super::env::EnvParser;
use super::source::Sourced;
use crate::errors::ErrorCode;
use crate::types::{OperatorConfig, RepositoryDescriptor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Fatal errors while loading declarative input.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read operator configuration {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse operator configuration {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("operator configuration {path} has an empty [repositories] owner")]
    MissingOwner { path: PathBuf },
    #[error("invalid environment overrides: {}", .0.join("; "))]
    Env(Vec<String>),
    #[error("failed to read repository descriptors at {path}: {source}")]
    ReadRepositories {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse repository descriptor {path}: {source}")]
    ParseRepository {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    #[error("repository '{name}' is declared in both {first} and {second}")]
    DuplicateRepository {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl LoadError {
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ReadConfig { .. } => ErrorCode::ConfigReadError,
            Self::ParseConfig { .. } => ErrorCode::ConfigParseError,
            Self::MissingOwner { .. } => ErrorCode::ConfigValidationError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
            Self::ReadRepositories { .. } => ErrorCode::RepositoryReadError,
            Self::ParseRepository { .. } => ErrorCode::RepositoryParseError,
            Self::DuplicateRepository { .. } => ErrorCode::RepositoryDuplicate,
        }
    }
}

/// Keys actually written in the `[google]` table, as opposed to serde defaults.
#[derive(Debug, Default, Deserialize)]
struct ExplicitKeys {
    #[serde(default)]
    google: ExplicitGoogleKeys,
}

#[derive(Debug, Default, Deserialize)]
struct ExplicitGoogleKeys {
    default_region: Option<String>,
    allow_hmac_keys: Option<bool>,
}

fn file_or_default<T>(value: T, in_file: bool) -> Sourced<T> {
    if in_file {
        Sourced::from_file(value)
    } else {
        Sourced::default_value(value)
    }
}

/// Operator configuration with environment overrides applied.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: OperatorConfig,
    pub default_region: Sourced<String>,
    pub allow_hmac_keys: Sourced<bool>,
}

/// Read `ghinfra.toml` and apply `GHINFRA_DEFAULT_REGION` / `GHINFRA_ALLOW_HMAC_KEYS`.
pub fn load_operator_config(path: &Path) -> Result<LoadedConfig, LoadError> {
    let path = expand_home(path);
    let contents = fs::read_to_string(&path).map_err(|source| LoadError::ReadConfig {
        path: path.clone(),
        source,
    })?;
    let mut config =
        toml::from_str::<OperatorConfig>(&contents).map_err(|source| LoadError::ParseConfig {
            path: path.clone(),
            source,
        })?;

    if config.repositories.owner.trim().is_empty() {
        return Err(LoadError::MissingOwner { path });
    }

    let explicit =
        toml::from_str::<ExplicitKeys>(&contents).map_err(|source| LoadError::ParseConfig {
            path: path.clone(),
            source,
        })?;

    let mut parser = EnvParser::new();
    let default_region = parser
        .get_optional_string("DEFAULT_REGION")
        .unwrap_or_else(|| {
            file_or_default(
                config.google.default_region.clone(),
                explicit.google.default_region.is_some(),
            )
        });
    let allow_hmac_keys = parser.get_bool("ALLOW_HMAC_KEYS").unwrap_or_else(|| {
        file_or_default(
            config.google.allow_hmac_keys,
            explicit.google.allow_hmac_keys.is_some(),
        )
    });
    if parser.has_errors() {
        let errors = parser
            .take_errors()
            .into_iter()
            .map(|error| error.to_string())
            .collect();
        return Err(LoadError::Env(errors));
    }

    config.google.default_region = default_region.value.clone();
    config.google.allow_hmac_keys = allow_hmac_keys.value;
    debug!(
        path = %path.display(),
        projects = config.google.projects.len(),
        default_region = %default_region.value,
        region_source = %default_region.source,
        allow_hmac_keys = allow_hmac_keys.value,
        "loaded operator configuration"
    );

    Ok(LoadedConfig {
        path,
        config,
        default_region,
        allow_hmac_keys,
    })
}

/// Parse every `.yaml`/`.yml` file in `dir`, in file-name order.
pub fn load_repositories(dir: &Path) -> Result<Vec<RepositoryDescriptor>, LoadError> {
    let dir = expand_home(dir);
    let read_error = |source| LoadError::ReadRepositories {
        path: dir.clone(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(&dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let is_yaml = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| matches!(extension, "yaml" | "yml"));
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut repositories = Vec::with_capacity(files.len());
    for path in files {
        let contents = fs::read_to_string(&path).map_err(|source| LoadError::ReadRepositories {
            path: path.clone(),
            source,
        })?;
        let descriptor = serde_yaml_ng::from_str::<RepositoryDescriptor>(&contents).map_err(
            |source| LoadError::ParseRepository {
                path: path.clone(),
                source,
            },
        )?;

        if let Some(first) = seen.get(&descriptor.name) {
            return Err(LoadError::DuplicateRepository {
                name: descriptor.name,
                first: first.clone(),
                second: path,
            });
        }
        debug!(
            repository = %descriptor.name,
            file = %path.display(),
            google = descriptor.google().is_some(),
            "parsed repository descriptor"
        );
        seen.insert(descriptor.name.clone(), path);
        repositories.push(descriptor);
    }

    Ok(repositories)
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
