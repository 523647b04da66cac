//! CLI and basic command tests

mod common;

use common::relcheck;
use predicates::prelude::*;

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    relcheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Release-engineering checks"))
        .stdout(predicate::str::contains("restricted"))
        .stdout(predicate::str::contains("drift"));
}

#[test]
fn test_version_displays() {
    relcheck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("relcheck"));
}

#[test]
fn test_unknown_command_fails() {
    relcheck()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_command_fails() {
    relcheck().assert().failure();
}

#[test]
fn test_restricted_help_lists_options() {
    relcheck()
        .args(["restricted", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--manifest-project"))
        .stdout(predicate::str::contains("--tickets-file"))
        .stdout(predicate::str::contains("--strict-lookups"));
}

#[test]
fn test_jira_token_value_is_hidden_in_help() {
    relcheck()
        .args(["restricted", "--help"])
        .env("JIRA_TOKEN", "s3cret-token")
        .assert()
        .success()
        .stdout(predicate::str::contains("s3cret-token").not());
}

// ============================================================================
// Completions
// ============================================================================

#[test]
fn test_completions_bash() {
    relcheck()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("relcheck"));
}

#[test]
fn test_completions_unknown_shell_fails() {
    relcheck()
        .args(["completions", "tcsh"])
        .assert()
        .failure();
}

#[test]
fn test_drift_version_is_a_package_version_option() {
    relcheck()
        .args(["drift", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--version <VERSION>"));
}
