//! End-to-end tests for the `kiln` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `kiln` command isolated from the user's config, cache and log settings.
fn kiln(temp: &TempDir) -> Command {
    let config = temp.path().join("kiln.toml");
    if !config.exists() {
        fs::write(&config, "[cache]\nbackend = \"memory\"\n").unwrap();
    }
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .arg("--config")
        .arg(&config);
    cmd
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

// ── top level ─────────────────────────────────────────────────────────────────

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Compose projects"))
        .stdout(predicate::str::contains("new"))
        .stdout(predicate::str::contains("modules"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn version_flag() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn malformed_dotenv_is_reported_but_not_fatal() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(".env"), "THIS IS NOT VALID\n").unwrap();
    kiln(&temp)
        .current_dir(temp.path())
        .args(["config", "get", "pipeline.max_retries"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3"))
        .stderr(predicate::str::contains("ignoring unreadable .env file"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.assert().failure().code(2);
}

#[test]
fn unknown_framework_is_a_usage_error() {
    let temp = TempDir::new().unwrap();
    kiln(&temp)
        .args(["new", "shop", "--framework", "mainframe"])
        .assert()
        .failure()
        .code(2);
}

// ── modules ───────────────────────────────────────────────────────────────────

#[test]
fn modules_lists_catalog_without_baselines() {
    let temp = TempDir::new().unwrap();
    kiln(&temp)
        .arg("modules")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth-jwt"))
        .stdout(predicate::str::contains("payment-stripe"))
        .stdout(predicate::str::contains("baseline-").not());
}

#[test]
fn modules_json_is_parseable() {
    let temp = TempDir::new().unwrap();
    let out = kiln(&temp)
        .args(["modules", "--framework", "mobile", "--format", "json"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let ids: Vec<&str> = doc
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"database-sqlite"));
    assert!(!ids.contains(&"payment-stripe"));
}

#[test]
fn describing_a_module_shows_its_dependencies() {
    let temp = TempDir::new().unwrap();
    kiln(&temp)
        .args(["modules", "auth-jwt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config-env"))
        .stdout(predicate::str::contains("JWT_SECRET"));
}

#[test]
fn describing_an_unknown_module_exits_not_found() {
    let temp = TempDir::new().unwrap();
    kiln(&temp)
        .args(["modules", "auth-magic"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("auth-magic"))
        .stderr(predicate::str::contains("kiln modules"));
}

// ── new ───────────────────────────────────────────────────────────────────────

#[test]
fn new_writes_composed_project() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    fs::create_dir(&out).unwrap();

    kiln(&temp)
        .args(["new", "shop", "-a", "business", "-m", "auth-jwt,payment-stripe", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Project created"));

    let root = out.join("shop");
    let package: serde_json::Value = serde_json::from_str(&read(root.join("package.json"))).unwrap();
    assert_eq!(package["dependencies"]["stripe"], "^14.0.0");
    assert!(package["dependencies"]["jose"].is_string());
    assert!(read(root.join(".env.example")).contains("JWT_SECRET=\"change-me\""));
    assert!(root.join("src/index.ts").is_file());
}

#[test]
fn variables_flow_into_files() {
    let temp = TempDir::new().unwrap();
    kiln(&temp)
        .args(["new", "shop", "-m", "auth-jwt", "--var", "JWT_SECRET=from-cli", "-o"])
        .arg(temp.path())
        .assert()
        .success();

    assert!(read(temp.path().join("shop/.env.example")).contains("JWT_SECRET=\"from-cli\""));
}

#[test]
fn strict_conflict_fails_without_writing() {
    let temp = TempDir::new().unwrap();
    kiln(&temp)
        .args(["new", "app", "-m", "auth-provider-a,auth-provider-b", "-o"])
        .arg(temp.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("auth-provider-a"))
        .stderr(predicate::str::contains("auth-provider-b"));

    assert!(!temp.path().join("app").exists());
}

#[test]
fn auto_mode_resolves_conflict_with_a_warning() {
    let temp = TempDir::new().unwrap();
    kiln(&temp)
        .args([
            "new",
            "app",
            "-m",
            "auth-provider-a",
            "-m",
            "auth-provider-b",
            "--strictness",
            "auto",
            "-o",
        ])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("'auth-provider-b' superseded by 'auth-provider-a'"));

    assert!(temp.path().join("app/src/auth/auth-provider-a.ts").is_file());
    assert!(!temp.path().join("app/src/auth/auth-provider-b.ts").exists());
}

#[test]
fn unknown_module_exits_not_found() {
    let temp = TempDir::new().unwrap();
    kiln(&temp)
        .args(["new", "app", "-m", "auth-magic", "-o"])
        .arg(temp.path())
        .assert()
        .failure()
        .code(3);
    assert!(!temp.path().join("app").exists());
}

#[test]
fn existing_project_is_never_overwritten() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("shop");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("keep.txt"), "mine").unwrap();

    kiln(&temp)
        .args(["new", "shop", "-o"])
        .arg(temp.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(read(root.join("keep.txt")), "mine");
    assert!(!root.join("package.json").exists());
}

#[test]
fn dry_run_writes_nothing() {
    let temp = TempDir::new().unwrap();
    kiln(&temp)
        .args(["new", "shop", "-m", "auth-jwt", "--dry-run", "-o"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"))
        .stdout(predicate::str::contains("package.json"));

    assert!(!temp.path().join("shop").exists());
}

#[test]
fn json_output_describes_the_run() {
    let temp = TempDir::new().unwrap();
    let out = kiln(&temp)
        .args([
            "--output-format",
            "json",
            "new",
            "shop",
            "-f",
            "mobile",
            "-m",
            "database-postgres",
            "--dry-run",
            "-o",
        ])
        .arg(temp.path())
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(doc["success"], true);
    assert_eq!(doc["dry_run"], true);
    let modules: Vec<&str> = doc["modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap())
        .collect();
    assert!(modules.iter().any(|m| m.starts_with("database-sqlite@")));
    assert!(!modules.iter().any(|m| m.starts_with("database-postgres@")));
    assert_eq!(doc["warnings"][0]["kind"], "variant-substituted");
    assert_eq!(doc["fingerprint"].as_str().map(str::len), Some(64));
}

#[test]
fn json_errors_go_to_stdout() {
    let temp = TempDir::new().unwrap();
    let out = kiln(&temp)
        .args(["--output-format", "json", "new", "app", "-m", "auth-magic", "-o"])
        .arg(temp.path())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));

    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(doc["success"], false);
    assert_eq!(doc["error"]["kind"], "module-not-found");
}

#[test]
fn directory_modules_are_available() {
    let temp = TempDir::new().unwrap();
    let module_dir = temp.path().join("modules/audit-log");
    fs::create_dir_all(&module_dir).unwrap();
    fs::write(
        module_dir.join("module.toml"),
        "[module]\nid = \"audit-log\"\n\n[defaults]\nAUDIT_LEVEL = \"info\"\n\n[[files]]\npath = \"audit.env\"\n",
    )
    .unwrap();
    fs::write(module_dir.join("audit.env"), "AUDIT_LEVEL={{AUDIT_LEVEL}}\n").unwrap();

    kiln(&temp)
        .args(["new", "shop", "-m", "audit-log", "--var", "AUDIT_LEVEL=debug", "--modules-dir"])
        .arg(temp.path().join("modules"))
        .arg("-o")
        .arg(temp.path())
        .assert()
        .success();

    assert_eq!(read(temp.path().join("shop/audit.env")), "AUDIT_LEVEL=debug\n");
}

// ── config & completions ──────────────────────────────────────────────────────

#[test]
fn config_get_reads_file_and_environment() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("kiln.toml"),
        "[pipeline]\nmax_retries = 7\n\n[cache]\nbackend = \"memory\"\n",
    )
    .unwrap();

    kiln(&temp)
        .args(["config", "get", "pipeline.max_retries"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pipeline.max_retries = 7"));

    kiln(&temp)
        .env("KILN_PIPELINE__MAX_RETRIES", "5")
        .args(["config", "get", "pipeline.max_retries"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pipeline.max_retries = 5"));
}

#[test]
fn missing_config_file_exits_configuration_error() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.env("NO_COLOR", "1")
        .args(["--config", "/definitely/not/here/kiln.toml", "modules"])
        .assert()
        .failure()
        .code(4);
}

#[test]
fn bash_completions_mention_binary() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kiln"));
}
