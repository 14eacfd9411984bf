#![allow(dead_code)]

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::predicate;
use std::path::Path;

/// `bit` command running against the repository at `dir`
pub fn bit(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bit").expect("bit binary is built for tests");
    cmd.current_dir(dir).env_remove("BIT_OBJECT_FORMAT");
    cmd
}

/// A fresh directory with an initialized repository
pub fn init_repository() -> TempDir {
    let dir = TempDir::new().expect("temp dir");

    bit(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized empty Git repository in"));

    dir
}

/// Whether a `git` binary is available to cross-check the on-disk formats
pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Stdout of a successful command, trimmed
pub fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf-8 output").trim().to_string()
}
