use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn wa_cli() -> Command {
    let mut cmd = Command::cargo_bin("wa-cli").unwrap();
    for var in [
        "WA_APIKEY",
        "WA_URL",
        "WA_APIKEY_SRC",
        "WA_URL_SRC",
        "WA_CLI_CONFIG",
        "WAW_PATH",
        "WA_TEST_TOOL_PATH",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn init_project(dir: &std::path::Path) {
    wa_cli()
        .current_dir(dir)
        .args([
            "--apikey",
            "target-key",
            "--url",
            "https://assistant.test",
            "init",
            "--no-prompt",
            "--main-branch",
            "main",
            "--src-apikey",
            "source-key",
        ])
        .assert()
        .success();
}

#[test]
fn test_cli_help() {
    wa_cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("sandbox"));
}

#[test]
fn test_cli_version() {
    wa_cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_env_prints_setup_line() {
    wa_cli()
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "set -o allexport; source .env; set +o allexport",
        ));
}

#[test]
fn test_env_json() {
    let output = wa_cli().args(["--json", "env"]).output().unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["data"]["setup"].as_str().unwrap().contains("source .env"));
}

#[test]
fn test_commands_outside_project_fail() {
    let dir = tempdir().unwrap();
    wa_cli()
        .current_dir(dir.path())
        .args(["skill", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not a wa-cli project"));
}

#[test]
fn test_init_creates_project_layout() {
    let dir = tempdir().unwrap();
    init_project(dir.path());

    let root = dir.path();
    let main_branch = std::fs::read_to_string(root.join(".wa-cli/main_branch.txt")).unwrap();
    assert_eq!(main_branch.trim(), "main");

    let registry = std::fs::read_to_string(root.join(".wa-cli/readonly_services.txt")).unwrap();
    assert!(registry.lines().any(|line| line == "source-key"));

    let env = std::fs::read_to_string(root.join(".env")).unwrap();
    assert!(env.contains("WA_APIKEY=target-key"));
    assert!(env.contains("WA_URL=https://assistant.test"));
    assert!(env.contains("WA_APIKEY_SRC=source-key"));

    let gitignore = std::fs::read_to_string(root.join(".gitignore")).unwrap();
    assert!(gitignore.lines().any(|line| line.trim() == "/.env"));

    for folder in ["skills", "test", "waw"] {
        assert!(root.join(folder).is_dir(), "{folder} missing");
    }
}

#[test]
fn test_init_twice_keeps_single_registry_entry() {
    let dir = tempdir().unwrap();
    init_project(dir.path());
    init_project(dir.path());

    let registry =
        std::fs::read_to_string(dir.path().join(".wa-cli/readonly_services.txt")).unwrap();
    assert_eq!(
        registry.lines().filter(|line| *line == "source-key").count(),
        1
    );
}

#[test]
fn test_delete_refused_on_readonly_service() {
    let dir = tempdir().unwrap();
    init_project(dir.path());

    // The guard runs before any request, so the unreachable URL is never hit.
    wa_cli()
        .current_dir(dir.path())
        .args([
            "--apikey",
            "source-key",
            "--url",
            "http://127.0.0.1:9",
            "skill",
            "delete",
            "ws-1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("write-protected"));
}

#[test]
fn test_delete_all_refused_on_readonly_service_json() {
    let dir = tempdir().unwrap();
    init_project(dir.path());

    let output = wa_cli()
        .current_dir(dir.path())
        .args([
            "--json",
            "--apikey",
            "source-key",
            "--url",
            "http://127.0.0.1:9",
            "service",
            "delete-all",
            "--force",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"]["error"]["code"], "permission_denied");
}

#[test]
fn test_sandbox_mutations_refused_on_readonly_service() {
    let dir = tempdir().unwrap();
    init_project(dir.path());

    for action in ["push", "delete", "deploy"] {
        wa_cli()
            .current_dir(dir.path())
            .args([
                "--apikey",
                "source-key",
                "--url",
                "http://127.0.0.1:9",
                "sandbox",
                action,
                "billing",
            ])
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("write-protected"))
            .stderr(predicate::str::contains("WAW_PATH").not());
    }
}

#[test]
fn test_sandbox_push_on_writable_service_reaches_toolkit_config() {
    let dir = tempdir().unwrap();
    init_project(dir.path());

    // Without WAW_PATH the first collaborator fails, after the guard passed.
    wa_cli()
        .current_dir(dir.path())
        .args([
            "--apikey",
            "target-key",
            "--url",
            "http://127.0.0.1:9",
            "sandbox",
            "push",
            "billing",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("WAW_PATH"))
        .stderr(predicate::str::contains("write-protected").not());
}
