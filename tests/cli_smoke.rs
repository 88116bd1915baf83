use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_run_command() {
    Command::cargo_bin("kubecheck")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"));
}

#[test]
fn run_help_documents_the_tool_overrides() {
    Command::cargo_bin("kubecheck")
        .unwrap()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--fail-fast"))
        .stdout(predicate::str::contains("--kubeval-binary"))
        .stdout(predicate::str::contains("--polaris-version"));
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("kubecheck")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}
