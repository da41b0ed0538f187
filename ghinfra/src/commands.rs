//! Subcommand implementations.

use anyhow::{Context, Result};
use colored::Colorize;
use ghinfra_common::config::{Sourced, expand_home};
use ghinfra_common::google::{HashedSuffix, SuffixSource, SuffixStore};
use ghinfra_common::{
    DryRunSink, LoadedConfig, ProvisioningPlan, RepositoryDescriptor, Resolution, RunReport,
    SinkEvent, apply_plan, build_index, build_provisioning_plan, load_operator_config,
    load_repositories, resolve, validate_config,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Inputs shared by every subcommand.
pub struct Workspace {
    pub loaded: LoadedConfig,
    pub descriptors: Vec<RepositoryDescriptor>,
    pub resolution: Resolution,
    pub json: bool,
}

impl Workspace {
    pub fn load(config: &Path, repositories: &Path, json: bool) -> Result<Self> {
        let loaded = load_operator_config(config)?;
        let descriptors = load_repositories(repositories)?;
        info!(
            config = %loaded.path.display(),
            repositories = descriptors.len(),
            "loaded inputs"
        );

        for warning in validate_config(&loaded.config) {
            warn!(field = %warning.field, "{}", warning.message);
        }

        let resolution = resolve(&descriptors, &loaded.config.google);
        for diagnostic in resolution.diagnostics() {
            error!(
                repository = %diagnostic.repository,
                project = %diagnostic.project,
                "{diagnostic}"
            );
        }

        Ok(Self {
            loaded,
            descriptors,
            resolution,
            json,
        })
    }

    fn plan(&self, suffixes: &mut Suffixes) -> Result<ProvisioningPlan> {
        let plan =
            build_provisioning_plan(&self.resolution, &self.loaded.config, suffixes.source())?;
        suffixes.persist()?;
        Ok(plan)
    }
}

/// Suffix source selected by `--state`.
pub enum Suffixes {
    Hashed(HashedSuffix),
    Stored { store: SuffixStore, path: PathBuf },
}

impl Suffixes {
    pub fn open(state: Option<&Path>) -> Result<Self> {
        match state {
            None => Ok(Self::Hashed(HashedSuffix)),
            Some(path) => {
                let path = expand_home(path);
                let store = SuffixStore::load(&path)?;
                Ok(Self::Stored { store, path })
            }
        }
    }

    fn source(&mut self) -> &mut dyn SuffixSource {
        match self {
            Self::Hashed(hashed) => hashed,
            Self::Stored { store, .. } => store,
        }
    }

    /// Save newly assigned suffixes.
    fn persist(&self) -> Result<()> {
        let Self::Stored { store, path } = self else {
            return Ok(());
        };
        if !store.is_dirty() {
            return Ok(());
        }
        let fresh = store.fresh_keys().collect::<Vec<_>>();
        store.save(path)?;
        info!(path = %path.display(), fresh = ?fresh, "saved suffix state");
        Ok(())
    }
}

/// `value (origin)`, naming the variable for environment overrides.
fn describe_setting<T: std::fmt::Display>(setting: &Sourced<T>) -> String {
    let origin = match &setting.env_var {
        Some(var) => format!("{} {var}", setting.source),
        None => setting.source.to_string(),
    };
    let value = if setting.is_overridden() {
        setting.value.to_string().cyan()
    } else {
        setting.value.to_string().normal()
    };
    format!("{value} ({origin})")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{json}");
    Ok(())
}

/// Returns whether every repository was admitted.
pub fn validate(workspace: &Workspace) -> Result<bool> {
    let warnings = validate_config(&workspace.loaded.config);
    let all_admitted = workspace.resolution.diagnostics().next().is_none();

    if workspace.json {
        #[derive(Serialize)]
        struct Settings<'a> {
            default_region: &'a Sourced<String>,
            allow_hmac_keys: &'a Sourced<bool>,
        }
        #[derive(Serialize)]
        struct Output<'a> {
            settings: Settings<'a>,
            outcomes: &'a [ghinfra_common::ValidationOutcome],
            warnings: &'a [ghinfra_common::ConfigWarning],
        }
        print_json(&Output {
            settings: Settings {
                default_region: &workspace.loaded.default_region,
                allow_hmac_keys: &workspace.loaded.allow_hmac_keys,
            },
            outcomes: &workspace.resolution.outcomes,
            warnings: &warnings,
        })?;
        return Ok(all_admitted);
    }

    let loaded = &workspace.loaded;
    for (name, setting) in [
        ("default_region", describe_setting(&loaded.default_region)),
        ("allow_hmac_keys", describe_setting(&loaded.allow_hmac_keys)),
    ] {
        println!("{} = {setting}", name.bold());
    }
    for warning in &warnings {
        println!("{}", warning.to_string().yellow());
    }
    for outcome in &workspace.resolution.outcomes {
        if outcome.is_admitted() {
            println!("{} {}", "admitted".green(), outcome.repository());
        } else {
            println!("{} {}", "rejected".red().bold(), outcome.repository());
            for diagnostic in outcome.diagnostics() {
                println!("  {diagnostic}");
            }
        }
    }
    let skipped = workspace.descriptors.len() - workspace.resolution.outcomes.len();
    if skipped > 0 {
        println!("{skipped} repositories declare no Google access");
    }
    Ok(all_admitted)
}

pub fn resolve_access(workspace: &Workspace) -> Result<()> {
    if workspace.json {
        return print_json(&workspace.resolution.access);
    }

    for entry in &workspace.resolution.access {
        let role = if entry.is_primary {
            "primary".bold().to_string()
        } else {
            entry.access_level.to_string()
        };
        println!(
            "{} → {} ({role}, {}): {} permissions, {} services",
            entry.repository,
            entry.project.cyan(),
            entry.region,
            entry.effective_permissions.len(),
            entry.effective_services.len()
        );
    }
    Ok(())
}

pub fn index(workspace: &Workspace) -> Result<()> {
    let index = build_index(&workspace.resolution.access);
    if workspace.json {
        return print_json(&index);
    }

    for (project, repositories) in index.iter() {
        println!("{}: {}", project.cyan(), repositories.join(", "));
    }
    Ok(())
}

pub fn plan(workspace: &Workspace, suffixes: &mut Suffixes) -> Result<()> {
    let plan = workspace.plan(suffixes)?;
    print_json(&plan)
}

pub async fn dry_run(workspace: &Workspace, suffixes: &mut Suffixes) -> Result<()> {
    let plan = workspace.plan(suffixes)?;
    let sink = DryRunSink::new();
    let report = apply_plan(&sink, &plan).await?;

    if workspace.json {
        #[derive(Serialize)]
        struct Output {
            events: Vec<SinkEvent>,
            report: ghinfra_common::ApplyReport,
        }
        return print_json(&Output {
            events: sink.events(),
            report,
        });
    }

    for event in sink.events() {
        println!("{}", describe(&event));
    }
    println!(
        "{} {} projects, {} pools, {} identities, {} secrets, {} hmac keys",
        "dry-run:".bold(),
        report.services_enabled,
        report.pools_created,
        report.identities_applied,
        report.secrets_written,
        report.hmac_keys_created
    );
    Ok(())
}

fn describe(event: &SinkEvent) -> String {
    match event {
        SinkEvent::EnableServices { project, services } => {
            format!("enable {} services on {project}", services.len())
        }
        SinkEvent::CreateIdentityPool { pool, .. } => format!("create pool {pool}"),
        SinkEvent::ApplyIdentity {
            repository,
            service_account,
            roles,
            ..
        } => format!(
            "apply identity {service_account} for {repository} ({} roles)",
            roles.len()
        ),
        SinkEvent::CreateHmacKey {
            service_account, ..
        } => format!("create hmac key for {service_account}"),
        SinkEvent::WriteSecret {
            repository, key, ..
        } => format!("write secret {key} to {repository}"),
    }
}

pub fn report(workspace: &Workspace, suffixes: &mut Suffixes) -> Result<()> {
    let plan = workspace.plan(suffixes)?;
    let report = RunReport::build(
        &workspace.loaded.config,
        &workspace.descriptors,
        &workspace.resolution,
        &plan,
    );
    print_json(&report)
}
