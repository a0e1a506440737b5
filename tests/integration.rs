use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
        .status;
    assert!(status.success(), "git {:?} failed", args);
}

fn exporter_source(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("pub fn export_snapshot_{}(exporter: &Exporter) {{ exporter.write({}); }}\n", i, i))
        .collect()
}

/// A committed repo with docs, then a working tree holding a mix of trivial,
/// renamed, high priority and substantial changes.
fn setup_test_repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    git(root, &["init", "-q"]);
    git(root, &["config", "user.email", "test@example.com"]);
    git(root, &["config", "user.name", "Test User"]);

    fs::write(root.join("README.md"), "# Test Project\n\nRun the exporter.\n").unwrap();
    fs::create_dir(root.join("docs")).unwrap();
    fs::write(
        root.join("docs/exporter.md"),
        "# Exporter\n\nThe exporter writes each snapshot to disk.\n",
    )
    .unwrap();
    fs::write(root.join("docs/install.md"), "# Install\n\nDownload the binary.\n").unwrap();
    fs::create_dir(root.join("src")).unwrap();
    fs::write(root.join("src/exporter.rs"), "pub struct Exporter;\n").unwrap();
    fs::write(root.join("src/legacy.rs"), exporter_source(30)).unwrap();
    fs::write(root.join("Cargo.lock"), "# lock v1\n").unwrap();

    git(root, &["add", "-A"]);
    git(root, &["commit", "-q", "-m", "initial"]);

    fs::write(
        root.join("src/exporter.rs"),
        format!("pub struct Exporter;\n{}", exporter_source(60)),
    )
    .unwrap();
    fs::write(root.join("Cargo.lock"), "# lock v2\n").unwrap();
    fs::write(root.join("README.md"), "# Test Project\n\nRun the exporter daily.\n").unwrap();
    git(root, &["mv", "src/legacy.rs", "src/archive.rs"]);

    tmp
}

fn docsieve(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docsieve").unwrap();
    cmd.env("HOME", home).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_filter_text() {
    let tmp = setup_test_repo();

    docsieve(tmp.path())
        .args(["filter", "--base", "HEAD", "--no-color", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("PROCESS src/exporter.rs"))
        .stdout(predicate::str::contains("PROCESS README.md"))
        .stdout(predicate::str::contains("Cargo.lock"))
        .stdout(predicate::str::contains("trivial path"))
        .stdout(predicate::str::contains("trivial rename"))
        .stdout(predicate::str::contains("2 processed, 2 skipped"));
}

#[test]
fn test_filter_payload() {
    let tmp = setup_test_repo();

    docsieve(tmp.path())
        .args(["filter", "--base", "HEAD", "--no-color", "--payload", "--tokens", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("file_path: README.md"))
        .stdout(predicate::str::contains("file_path: src/exporter.rs"))
        .stdout(predicate::str::contains("<src/exporter.rs>"))
        .stdout(predicate::str::contains("payload tokens"))
        .stdout(predicate::str::contains("file_path: Cargo.lock").not());
}

#[test]
fn test_filter_disabled() {
    let tmp = setup_test_repo();

    docsieve(tmp.path())
        .args(["filter", "--base", "HEAD", "--no-color", "--no-filter", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("4 processed, 0 skipped"))
        .stdout(predicate::str::contains("filtering disabled"));
}

#[test]
fn test_filter_scope_file() {
    let tmp = setup_test_repo();
    let scope = tmp.path().join("scope.json");
    fs::write(&scope, r#"{"src/exporter.rs": 0.9}"#).unwrap();

    docsieve(tmp.path())
        .args(["filter", "--base", "HEAD", "--format", "json", "--path"])
        .arg(tmp.path())
        .arg("--scope")
        .arg(&scope)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""detail": "FULL""#));
}

#[test]
fn test_invalid_config_fails_fast() {
    let tmp = setup_test_repo();
    fs::write(
        tmp.path().join(".docsieve.toml"),
        "high_detail_threshold = 0.2\nmedium_detail_threshold = 0.5\n",
    )
    .unwrap();

    docsieve(tmp.path())
        .args(["filter", "--base", "HEAD", "--path"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("high_detail_threshold"));
}

#[test]
fn test_unknown_base_fails() {
    let tmp = setup_test_repo();

    docsieve(tmp.path())
        .args(["filter", "--base", "no-such-branch", "--path"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("git command failed"));
}

#[test]
fn test_not_a_repo() {
    let tmp = TempDir::new().unwrap();

    docsieve(tmp.path())
        .args(["filter", "--path"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a git repository"));
}

#[test]
fn test_index_then_fresh() {
    let tmp = setup_test_repo();

    docsieve(tmp.path())
        .args(["index", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 3 docs"));

    assert!(tmp.path().join(".docsieve/doc-terms.json").exists());

    docsieve(tmp.path())
        .args(["index", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    fs::write(tmp.path().join("docs/install.md"), "# Install\n\nUse cargo.\n").unwrap();

    docsieve(tmp.path())
        .args(["index", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 3 docs"));
}

#[test]
fn test_index_ignore_file() {
    let tmp = setup_test_repo();
    fs::write(tmp.path().join(".docsieveignore"), "docs/install.md\n").unwrap();

    docsieve(tmp.path())
        .args(["index", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 2 docs"));
}

#[test]
fn test_docs_relevant_to_changes() {
    let tmp = setup_test_repo();

    docsieve(tmp.path())
        .args(["docs", "--base", "HEAD", "--no-color", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("docs/exporter.md"))
        .stdout(predicate::str::contains("term match"))
        .stdout(predicate::str::contains("3 of 3 docs"));
}

#[test]
fn test_docs_high_priority() {
    let tmp = setup_test_repo();

    docsieve(tmp.path())
        .args(["docs", "--base", "HEAD", "--no-color", "--min-docs", "0"])
        .args(["--high", "docs/install.md", "--path"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("high priority"))
        .stdout(predicate::str::contains("docs/install.md"));
}

#[test]
fn test_init_creates_config() {
    let tmp = TempDir::new().unwrap();

    docsieve(tmp.path())
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created local config"));

    let content = fs::read_to_string(tmp.path().join(".docsieve.toml")).unwrap();
    assert!(content.contains("magnitude_floor = 0.2"));

    docsieve(tmp.path())
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    docsieve(tmp.path())
        .current_dir(tmp.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_init_global() {
    let tmp = TempDir::new().unwrap();

    docsieve(tmp.path())
        .current_dir(tmp.path())
        .args(["init", "--global"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created global config"));

    assert!(tmp.path().join(".docsieve/config.toml").exists());
}

#[test]
fn test_docs_scope_file() {
    let tmp = setup_test_repo();
    let scope = tmp.path().join("scope.json");
    fs::write(&scope, r#"["docs/install.md"]"#).unwrap();

    docsieve(tmp.path())
        .args(["docs", "--base", "HEAD", "--no-color", "--min-docs", "0", "--scope"])
        .arg(&scope)
        .arg("--path")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"scope relevant\s+\d+\s+docs/install\.md").unwrap());
}

#[test]
fn test_docs_invalid_scope_file() {
    let tmp = setup_test_repo();
    let scope = tmp.path().join("scope.json");
    fs::write(&scope, r#"{"docs/install.md": 1.0}"#).unwrap();

    docsieve(tmp.path())
        .args(["docs", "--base", "HEAD", "--scope"])
        .arg(&scope)
        .arg("--path")
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid scope file"));
}
