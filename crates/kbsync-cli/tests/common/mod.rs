//! Shared test utilities for kbsync-cli integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Get a Command for the kbsync binary.
///
/// # Panics
///
/// Panics if the kbsync binary cannot be found. This should not happen
/// in a properly configured test environment.
#[allow(deprecated)]
pub fn kbsync_cmd() -> Command {
    Command::cargo_bin("kbsync").expect("kbsync binary should exist")
}

/// A temporary home with an offline config, store, and token.
///
/// Offline delays are zero so writes land in the store immediately.
pub struct OfflineEnv {
    pub dir: TempDir,
}

impl OfflineEnv {
    pub fn new() -> Self {
        Self::with_page_size(10)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let env = Self {
            dir: TempDir::new().expect("create temp dir"),
        };
        env.write_config(&format!(
            "online: false\n\
             pollIntervalMs: 250\n\
             searchDebounceMs: 50\n\
             pageSize: {page_size}\n\
             storePath: {store}\n\
             tokenPath: {token}\n\
             offline:\n  latencyMs: 0\n  applyDelayMs: 0\n  syncDelayMs: 0\n",
            page_size = page_size,
            store = env.store_path().display(),
            token = env.token_path().display(),
        ));
        fs::write(env.token_path(), "offline-token\n").expect("write token");
        env
    }

    pub fn write_config(&self, yaml: &str) {
        fs::write(self.config_path(), yaml).expect("write config");
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yaml")
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("kb_resources.json")
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.path().join("token")
    }

    pub fn home(&self) -> &Path {
        self.dir.path()
    }

    /// `kbsync --config <tmp>/config.yaml --color never` with a clean environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = kbsync_cmd();
        for var in [
            "KBSYNC_CONFIG",
            "KBSYNC_TOKEN",
            "KBSYNC_OFFLINE",
            "KBSYNC_BACKEND_URL",
            "KBSYNC_VERBOSE",
            "KBSYNC_QUIET",
            "KBSYNC_COLOR",
            "KBSYNC_EMAIL",
            "KBSYNC_PASSWORD",
        ] {
            cmd.env_remove(var);
        }
        cmd.env("HOME", self.home())
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(self.config_path())
            .arg("--color")
            .arg("never");
        cmd
    }

    /// Stdout of a successful `ls --json` with extra arguments, parsed.
    pub fn ls_json(&self, args: &[&str]) -> serde_json::Value {
        let output = self
            .cmd()
            .arg("ls")
            .arg("--json")
            .args(args)
            .output()
            .expect("run kbsync ls");
        assert!(
            output.status.success(),
            "ls failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("ls --json prints JSON")
    }
}

/// `(resource_id, status)` pairs of an `ls --json` view.
pub fn statuses(view: &serde_json::Value) -> Vec<(String, String)> {
    view["resources"]
        .as_array()
        .expect("resources array")
        .iter()
        .map(|row| {
            (
                row["resource_id"].as_str().unwrap_or_default().to_string(),
                row["status"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}
