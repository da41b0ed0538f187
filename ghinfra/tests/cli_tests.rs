use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CONFIG: &str = r#"
[repositories]
owner = "acme"

[google]
projects = ["core", "dns"]
allow_hmac_keys = true
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("ghinfra.toml"), CONFIG).expect("write config");
        fs::create_dir(dir.path().join("repositories")).expect("create repositories");
        Self { dir }
    }

    fn repository(self, file: &str, yaml: &str) -> Self {
        fs::write(self.dir.path().join("repositories").join(file), yaml).expect("write yaml");
        self
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_ghinfra"))
            .arg("--config")
            .arg(self.path().join("ghinfra.toml"))
            .arg("--repositories")
            .arg(self.path().join("repositories"))
            .args(args)
            .env_remove("GHINFRA_ALLOW_HMAC_KEYS")
            .env_remove("GHINFRA_DEFAULT_REGION")
            .env_remove("GHINFRA_LOG_LEVEL")
            .env_remove("GHINFRA_LOG_FORMAT")
            .env("NO_COLOR", "1")
            .output()
            .expect("run ghinfra")
    }
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn standard() -> Fixture {
    Fixture::new()
        .repository(
            "api.yaml",
            "name: api\naccessPermissions:\n  google:\n    project: core\n    hmacKey: true\n    linkedProjects:\n      dns:\n        accessLevel: full\n",
        )
        .repository("docs.yaml", "name: docs\ndescription: no cloud access\n")
}

#[test]
fn validate_succeeds_when_every_repository_is_admitted() {
    let output = standard().run(&["validate"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("admitted api"));
}

#[test]
fn validate_explains_where_settings_came_from() {
    let fixture = standard();
    let output = Command::new(env!("CARGO_BIN_EXE_ghinfra"))
        .arg("--config")
        .arg(fixture.path().join("ghinfra.toml"))
        .arg("--repositories")
        .arg(fixture.path().join("repositories"))
        .arg("validate")
        .env("GHINFRA_DEFAULT_REGION", "us-east1")
        .env_remove("GHINFRA_ALLOW_HMAC_KEYS")
        .env_remove("GHINFRA_LOG_LEVEL")
        .env_remove("GHINFRA_LOG_FORMAT")
        .env("NO_COLOR", "1")
        .output()
        .expect("run ghinfra");
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("default_region = us-east1 (environment GHINFRA_DEFAULT_REGION)"),
        "{stdout}"
    );
    assert!(stdout.contains("allow_hmac_keys = true (config file)"), "{stdout}");
}

#[test]
fn validate_json_reports_default_settings() {
    let output = standard().run(&["--json", "validate"]);
    assert!(output.status.success(), "{output:?}");

    let result = stdout_json(&output);
    assert_eq!(result["settings"]["default_region"]["source"], "default");
    assert_eq!(result["settings"]["default_region"]["value"], "europe-west4");
    assert_eq!(result["settings"]["allow_hmac_keys"]["source"], "config_file");
}

#[test]
fn validate_reports_unconfigured_project_and_exits_one() {
    let fixture = standard().repository(
        "rogue.yaml",
        "name: rogue\naccessPermissions:\n  google:\n    project: elsewhere\n",
    );
    let output = fixture.run(&["validate"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = "[google][rogue][elsewhere] the repository references an unconfigured project";
    assert_eq!(stderr.matches(line).count(), 1, "{stderr}");
}

#[test]
fn google_block_without_project_is_skipped() {
    let fixture = standard().repository(
        "partial.yaml",
        "name: partial\naccessPermissions:\n  google:\n    hmacKey: true\n",
    );
    let output = fixture.run(&["report"]);
    assert!(output.status.success(), "{output:?}");

    let report = stdout_json(&output);
    assert_eq!(report["repositories"]["partial"]["google"], false);
    assert_eq!(report["repositories"]["api"]["google"], true);
}

#[test]
fn report_lists_allowed_projects_and_repositories() {
    let output = standard().run(&["report"]);
    assert!(output.status.success(), "{output:?}");

    let report = stdout_json(&output);
    assert_eq!(report["google"]["allowed"], serde_json::json!(["core", "dns"]));
    assert_eq!(report["google"]["configured"]["dns"], serde_json::json!(["api"]));
    assert_eq!(report["repositories"]["api"]["google"], true);
    assert_eq!(report["repositories"]["api"]["gcs"], true);
    assert_eq!(report["repositories"]["docs"]["google"], false);
}

#[test]
fn plan_names_identities_from_suffix() {
    let output = standard().run(&["plan"]);
    assert!(output.status.success(), "{output:?}");

    let plan = stdout_json(&output);
    let identity = &plan["identities"][0];
    let suffix = identity["suffix"].as_str().expect("suffix");
    assert_eq!(suffix.len(), 8);
    assert_eq!(
        identity["service_account"]["account_id"],
        format!("ci-api-{suffix}")
    );
    assert_eq!(identity["secret_key"], "google-cloud");
    assert_eq!(identity["hmac_key"]["secret_key"], "google-cloud-storage");
    assert_eq!(plan["identity_pools"].as_array().map(Vec::len), Some(1));
}

#[test]
fn state_file_keeps_suffixes_stable() {
    let fixture = standard();
    let state = fixture.path().join("suffixes.json");
    let state_arg = state.to_str().expect("utf-8 path");

    let first = fixture.run(&["--state", state_arg, "plan"]);
    assert!(first.status.success(), "{first:?}");
    assert!(state.exists());
    let second = fixture.run(&["--state", state_arg, "plan"]);
    assert!(second.status.success(), "{second:?}");

    assert_eq!(stdout_json(&first), stdout_json(&second));
}

#[test]
fn dry_run_emits_actions_in_phase_order() {
    let output = standard().run(&["--json", "dry-run"]);
    assert!(output.status.success(), "{output:?}");

    let result = stdout_json(&output);
    let actions = result["events"]
        .as_array()
        .expect("events")
        .iter()
        .map(|event| event["action"].as_str().expect("action").to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        actions,
        vec![
            "enable_services",
            "enable_services",
            "create_identity_pool",
            "apply_identity",
            "write_secret",
            "create_hmac_key",
            "write_secret",
        ]
    );
    assert_eq!(result["report"]["hmac_keys_created"], 1);
}

#[test]
fn duplicate_repository_names_fail_with_error_code() {
    let fixture = standard().repository("api-copy.yml", "name: api\n");
    let output = fixture.run(&["index"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GHI-E012"), "{stderr}");
}

#[test]
fn missing_config_is_reported() {
    let fixture = standard();
    fs::remove_file(fixture.path().join("ghinfra.toml")).expect("remove config");
    let output = fixture.run(&["validate"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GHI-E001"), "{stderr}");
}
