//! Shared test helpers for integration tests
//!
//! This module provides common utilities used across all test files.

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Environment variables that must not leak in from the machine running the tests
const SCRUBBED_VARS: &[&str] = &[
    "GERRIT_PROJECT",
    "GERRIT_BRANCH",
    "GERRIT_CHANGE_COMMIT_MESSAGE",
    "GERRIT_CHANGE_URL",
    "GERRIT_PATCHSET_NUMBER",
    "GERRIT_EVENT_TYPE",
    "JIRA_URL",
    "JIRA_USER",
    "JIRA_TOKEN",
    "RELCHECK_CONFIG",
    "RELCHECK_MANIFEST_PROJECT",
    "RELCHECK_REPORT",
    "RUST_LOG",
];

/// Manifest tree used by most restricted-branch tests:
///
/// - `server/trinity.xml` restricted, approval CBD-100
/// - `server/trinity/7.6.0.xml` restricted child of trinity, approval CBD-200
/// - `server/morpheus.xml` unrestricted, on master
pub const MANIFESTS: &str = r#"
manifests:
  server/trinity.xml:
    release_name: Trinity
    restricted: true
    approval_ticket: CBD-100
    default_branch: release/7.6
    projects:
      kv_engine: ~
      tlm: ~
  server/trinity/7.6.0.xml:
    release_name: Couchbase Server 7.6.0
    restricted: true
    approval_ticket: CBD-200
    parent: server/trinity.xml
    default_branch: release/7.6
    unrestricted_projects: [testrunner]
    projects:
      kv_engine: ~
      testrunner: ~
  server/morpheus.xml:
    release_name: Morpheus
    restricted: false
    projects:
      kv_engine: ~
"#;

/// Ticket snapshot matching [`MANIFESTS`]
pub const TICKETS: &str = r#"
tickets:
  CBD-200:
    depends: [MB-1]
    subtasks: [CBD-201]
  CBD-201:
    relates: [MB-2]
  MB-1:
  MB-2:
  MB-3:
    labels: [doc-change-only]
  MB-4:
    labels: [customer-escalation]
"#;

/// Helper to get a relcheck command with a clean environment
pub fn relcheck() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("relcheck"));
    for var in SCRUBBED_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper to create a temp directory with the standard manifests and tickets
pub fn setup_fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp, "manifest/server/product-config.yaml", MANIFESTS);
    write_file(&tmp, "tickets.yaml", TICKETS);
    tmp
}

/// Write a file below the temp directory, creating parent directories
pub fn write_file(tmp: &TempDir, relative: &str, content: &str) -> PathBuf {
    let path = tmp.path().join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Base64-encode a commit message the way the Gerrit trigger does
pub fn encode_message(message: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(message)
}

/// Helper to build a `relcheck restricted` run for a change, without any
/// manifest or tracker options
pub fn gerrit_change(
    tmp: &TempDir,
    project: &str,
    branch: &str,
    message: &str,
    event_type: &str,
) -> Command {
    let mut cmd = relcheck();
    cmd.current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env("XDG_CONFIG_HOME", tmp.path().join(".config"))
        .env("GERRIT_PROJECT", project)
        .env("GERRIT_BRANCH", branch)
        .env("GERRIT_CHANGE_COMMIT_MESSAGE", encode_message(message))
        .env("GERRIT_CHANGE_URL", "https://review.example.com/c/kv_engine/+/4242")
        .env("GERRIT_PATCHSET_NUMBER", "1")
        .env("GERRIT_EVENT_TYPE", event_type)
        .arg("restricted");
    cmd
}

/// Helper to build a `relcheck restricted` run against the fixture manifests
/// and ticket snapshot
pub fn restricted_check(
    tmp: &TempDir,
    project: &str,
    branch: &str,
    message: &str,
    event_type: &str,
) -> Command {
    let mut cmd = gerrit_change(tmp, project, branch, message, event_type);
    cmd.args(["-p", "manifest", "--tickets-file", "tickets.yaml"]);
    cmd
}

/// Run git in a directory, panicking on failure
pub fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        status.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&status.stderr)
    );
}

/// Create a git repository holding the fixture manifests on `master`, and
/// return its `file://` URL
pub fn manifest_repo(tmp: &TempDir, relative: &str) -> String {
    let dir = tmp.path().join(relative);
    fs::create_dir_all(&dir).unwrap();
    git(&dir, &["init", "-q"]);
    git(&dir, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    fs::create_dir_all(dir.join("server")).unwrap();
    fs::write(dir.join("server/product-config.yaml"), MANIFESTS).unwrap();
    git(&dir, &["add", "."]);
    git(
        &dir,
        &[
            "-c",
            "user.name=relcheck",
            "-c",
            "user.email=relcheck@example.com",
            "-c",
            "commit.gpgsign=false",
            "commit",
            "-q",
            "-m",
            "Add server manifests",
        ],
    );
    format!("file://{}", dir.display())
}

/// Path of the report file a restricted check writes by default
pub fn report_path(tmp: &TempDir) -> PathBuf {
    tmp.path().join("restricted.html")
}

/// Write a package archive holding one environment listing
pub fn write_package_archive(dir: &Path, package: &str, platform: &str, version: &str, env: &str) {
    let archive = dir.join(format!("{}-{}-{}.tgz", package, platform, version));
    let file = fs::File::create(archive).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let mut header = tar::Header::new_gnu();
    header.set_size(env.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(
            &mut header,
            format!("env/environment-{}.txt", platform),
            env.as_bytes(),
        )
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap();
}

/// Helper to lay out the compliance files of a package source tree
pub fn setup_compliance_sources(tmp: &TempDir, manifest: &str, ignore: &str, stubs: &str) -> PathBuf {
    let src = tmp.path().join("src");
    write_file(tmp, "src/blackduck/black-duck-manifest.yaml.in", manifest);
    write_file(tmp, "src/blackduck-ignore.txt", ignore);
    write_file(tmp, "src/cb-stubs.txt", stubs);
    src
}
