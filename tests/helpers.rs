//! Shared test utilities for image-factory tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Path of the helper binary built for this test run.
pub fn helper_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_image-factory-sudo-helper"))
}

/// Path of the main binary built for this test run.
pub fn factory_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_image-factory"))
}

/// Run the helper in dry-run mode with an otherwise empty environment.
pub fn run_helper(args: &[&str]) -> Output {
    run_helper_in(args, None)
}

/// Like `run_helper`, with the working directory set to `dir`.
pub fn run_helper_in(args: &[&str], dir: Option<&Path>) -> Output {
    let mut cmd = Command::new(helper_bin());
    cmd.args(args)
        .env_clear()
        .env("DRYRUN", "1")
        .stdin(Stdio::null());
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    cmd.output().expect("Failed to run helper")
}

/// Exit code of a helper run in dry-run mode.
pub fn helper_code(args: &[&str]) -> i32 {
    run_helper(args).status.code().expect("Helper killed by signal")
}

/// The example config shipped at the repository root.
pub fn example_config() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("image-factory.toml")
}

/// Write `content` as a config file inside `dir`.
pub fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("image-factory.toml");
    fs::write(&path, content).expect("Failed to write config");
    path
}

/// Assert that `output` exited with `code`, showing stderr if not.
pub fn assert_exit(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "unexpected exit status, stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
}
