//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory with isolated prefix, config
/// and data paths.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// A source tree under `sources/<name>`.
  pub fn source_dir(&self, name: &str) -> PathBuf {
    let p = self.temp.path().join("sources").join(name);
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Install prefix (isolated per test).
  pub fn prefix_path(&self) -> PathBuf {
    let p = self.temp.path().join("prefix");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn config_path(&self) -> PathBuf {
    let p = self.temp.path().join("config");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn data_path(&self) -> PathBuf {
    let p = self.temp.path().join("data");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Get a pre-configured Command for the keg binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `KEG_PREFIX`: Isolated install prefix
  /// - `XDG_CONFIG_HOME` / `APPDATA`: Isolated config directory
  /// - `XDG_DATA_HOME` / `LOCALAPPDATA`: Isolated data directory
  pub fn keg_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("keg");
    cmd.env("KEG_PREFIX", self.prefix_path());
    cmd.env("XDG_CONFIG_HOME", self.config_path());
    cmd.env("XDG_DATA_HOME", self.data_path());
    cmd.env("APPDATA", self.config_path()); // For Windows
    cmd.env("LOCALAPPDATA", self.data_path()); // For Windows
    cmd.env_remove("FC");
    cmd.env_remove("KEG_PARALLELISM");
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// Install a copy-only formula from a small fake source tree.
  pub fn install_tree(&self, formula: &str, files: &[(&str, &str)]) {
    for (path, content) in files {
      self.write_file(&format!("sources/{}/{}", formula, path), content);
    }
    self
      .keg_cmd()
      .args(["install", formula, "--build-dir"])
      .arg(self.source_dir(formula))
      .assert()
      .success();
  }
}
