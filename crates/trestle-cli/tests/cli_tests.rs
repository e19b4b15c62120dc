//! End-to-end tests against the built `trestle` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A catalogue with one good blueprint (`greeter`) and one broken one.
fn catalog() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let greeter = dir.path().join("greeter");
    write(
        &greeter,
        "blueprint.toml",
        r#"
[blueprint]
name = "greeter"
version = "0.3.0"
description = "Prints a greeting"
architecture = "layered"
tags = ["demo"]

[[variables]]
name = "project_name"
required = true
pattern = "[a-z][a-z0-9-]*"

[[variables]]
name = "loud"
type = "bool"
default = false

[[files]]
source = "README.md"

[[files]]
source = "src/main.rs"
destination = "src/{{ project_name | snake_case }}.rs"

[[files]]
source = "SHOUT.txt"
when = "loud"

[[dependencies]]
module = "clap"
version = "4"
features = ["derive"]
"#,
    );
    write(&greeter, "files/README.md", "# {{ project_name }}\n");
    write(&greeter, "files/src/main.rs", "fn main() { println!(\"hi\"); }\n");
    write(&greeter, "files/SHOUT.txt", "HI\n");

    write(
        &dir.path().join("broken"),
        "blueprint.toml",
        "[blueprint]\nname = \"broken\"\n",
    );
    dir
}

/// `trestle` isolated from the user's config and log settings.
fn trestle(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("trestle").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let home = tempfile::tempdir().unwrap();
    trestle(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("new"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn version_flag() {
    let home = tempfile::tempdir().unwrap();
    trestle(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn list_shows_good_and_broken_blueprints() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    trestle(home.path())
        .args(["list", "--catalog"])
        .arg(catalog.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("greeter@0.3.0"))
        .stdout(predicate::str::contains("Prints a greeting [layered]"))
        .stdout(predicate::str::contains("broken"));
}

#[test]
fn list_as_json() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    let output = trestle(home.path())
        .args(["--output-format", "json", "list", "--catalog"])
        .arg(catalog.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listing["blueprints"][0]["id"], "greeter@0.3.0");
    assert_eq!(listing["broken"][0]["name"], "broken");
}

#[test]
fn list_filters_by_tag() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    trestle(home.path())
        .args(["list", "--tag", "nothing-has-this", "--catalog"])
        .arg(catalog.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No blueprints found"));
}

#[test]
fn catalog_dir_can_come_from_the_environment() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    trestle(home.path())
        .env("TRESTLE__CATALOG__DIR", catalog.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("greeter"));
}

#[test]
fn missing_catalog_is_not_found() {
    let home = tempfile::tempdir().unwrap();
    trestle(home.path())
        .args(["list", "--catalog"])
        .arg(home.path().join("nowhere"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("catalogue not found"));
}

#[test]
fn new_generates_the_project() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    let out = home.path().join("hello-app");

    trestle(home.path())
        .args(["new", "greeter"])
        .arg(&out)
        .args(["--set", "project_name=hello-app", "--set", "loud=true", "--catalog"])
        .arg(catalog.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated greeter@0.3.0"))
        .stdout(predicate::str::contains("src/hello_app.rs"));

    assert_eq!(
        fs::read_to_string(out.join("README.md")).unwrap(),
        "# hello-app\n"
    );
    assert!(out.join("SHOUT.txt").exists());
    let manifest = fs::read_to_string(out.join("Cargo.toml")).unwrap();
    assert!(manifest.contains("clap"), "{manifest}");

    let leftovers: Vec<_> = fs::read_dir(home.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().contains("trestle-staging"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn new_reports_json() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    let out = home.path().join("json-app");

    let output = trestle(home.path())
        .args(["--output-format", "json", "new", "greeter"])
        .arg(&out)
        .args(["--set", "project_name=json-app", "--catalog"])
        .arg(catalog.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "completed");
    assert_eq!(report["dependencies"][0]["module"], "clap");
    assert!(!out.join("SHOUT.txt").exists());
}

#[test]
fn missing_required_variable_exits_incomplete_without_writing() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    let out = home.path().join("never");

    trestle(home.path())
        .args(["new", "greeter"])
        .arg(&out)
        .arg("--catalog")
        .arg(catalog.path())
        .assert()
        .code(5)
        .stdout(predicate::str::contains("project_name"));

    assert!(!out.exists());
}

#[test]
fn existing_output_needs_force() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    let out = home.path().join("taken");
    write(&out, "README.md", "mine\n");

    trestle(home.path())
        .args(["new", "greeter"])
        .arg(&out)
        .args(["--set", "project_name=taken", "--catalog"])
        .arg(catalog.path())
        .assert()
        .code(5);
    assert_eq!(fs::read_to_string(out.join("README.md")).unwrap(), "mine\n");

    trestle(home.path())
        .args(["new", "greeter"])
        .arg(&out)
        .args(["--set", "project_name=taken", "--force", "--catalog"])
        .arg(catalog.path())
        .assert()
        .success();
    assert_eq!(fs::read_to_string(out.join("README.md")).unwrap(), "# taken\n");
}

#[test]
fn unknown_blueprint_is_not_found() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    trestle(home.path())
        .args(["new", "ghost"])
        .arg(home.path().join("out"))
        .arg("--catalog")
        .arg(catalog.path())
        .assert()
        .code(3);
}

#[test]
fn malformed_override_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    trestle(home.path())
        .args(["new", "greeter", "out", "--set", "no-equals-sign"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn validate_accepts_a_good_blueprint() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    trestle(home.path())
        .arg("validate")
        .arg(catalog.path().join("greeter"))
        .assert()
        .success()
        .stdout(predicate::str::contains("greeter@0.3.0 is valid"));
}

#[test]
fn validate_rejects_unresolved_references() {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join("typo");
    write(
        &dir,
        "blueprint.toml",
        "[blueprint]\nname = \"typo\"\nversion = \"1.0.0\"\n\n[[files]]\nsource = \"a.txt\"\ndestination = \"{{ Nmae }}.txt\"\n",
    );
    write(&dir, "files/a.txt", "a");

    trestle(home.path())
        .arg("validate")
        .arg(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Nmae"));
}

#[test]
fn explicit_config_file_must_exist() {
    let home = tempfile::tempdir().unwrap();
    trestle(home.path())
        .arg("--config")
        .arg(home.path().join("absent.toml"))
        .arg("list")
        .assert()
        .code(4);
}

#[test]
fn config_file_supplies_the_catalog() {
    let home = tempfile::tempdir().unwrap();
    let catalog = catalog();
    let config = home.path().join("trestle.toml");
    fs::write(
        &config,
        format!("[catalog]\ndir = {:?}\n", catalog.path().display().to_string()),
    )
    .unwrap();

    trestle(home.path())
        .arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("greeter"));
}

#[cfg(unix)]
#[test]
fn hooks_run_inside_the_generated_project() {
    let home = tempfile::tempdir().unwrap();
    let catalog = tempfile::tempdir().unwrap();
    let bp = catalog.path().join("hooked");
    write(
        &bp,
        "blueprint.toml",
        r#"
[blueprint]
name = "hooked"
version = "1.0.0"

[[files]]
source = "a.txt"

[[hooks]]
name = "mark"
command = ["sh", "-c", "echo done > marker"]
required = true
"#,
    );
    write(&bp, "files/a.txt", "a");
    let out = home.path().join("hooked-out");

    trestle(home.path())
        .args(["new", "hooked"])
        .arg(&out)
        .arg("--catalog")
        .arg(catalog.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("mark: ok"));
    assert_eq!(fs::read_to_string(out.join("marker")).unwrap(), "done\n");

    let skipped = home.path().join("no-hooks");
    trestle(home.path())
        .args(["new", "hooked"])
        .arg(&skipped)
        .args(["--no-hooks", "--catalog"])
        .arg(catalog.path())
        .assert()
        .success();
    assert!(!skipped.join("marker").exists());
}
