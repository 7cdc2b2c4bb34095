//! Types for plan execution.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

/// Environment bound by a plan and handed to every process it spawns.
///
/// Built up from `SetEnv` steps; keg never writes these into its own process
/// environment.
pub type BuildEnv = BTreeMap<String, String>;

/// Captured result of one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
  /// Exit code, `None` when the process was killed by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// Stdout followed by stderr, exactly as captured.
  pub fn combined(&self) -> String {
    let mut combined = self.stdout.clone();
    combined.push_str(&self.stderr);
    combined
  }
}

/// Errors that can occur while executing a plan.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// A plan step exited unsuccessfully. `output` is the tool's captured
  /// stdout and stderr, unmodified.
  #[error("{command} failed with exit code {code:?}\n{output}")]
  UpstreamInstallFailure {
    command: String,
    code: Option<i32>,
    output: String,
  },

  /// The process could not be started at all.
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot open stdin file {path}: {source}")]
  Stdin {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Configuration for spawning processes.
#[derive(Debug, Clone, Default)]
pub struct ExecuteConfig {
  /// Run invocations through this shell instead of spawning them directly.
  pub shell: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn combined_keeps_stream_order() {
    let output = ProcessOutput {
      code: Some(2),
      stdout: "checking compilers\n".to_string(),
      stderr: "error: no fortran\n".to_string(),
    };
    assert!(!output.success());
    assert_eq!(output.combined(), "checking compilers\nerror: no fortran\n");
  }

  #[test]
  fn default_config_spawns_directly() {
    assert!(ExecuteConfig::default().shell.is_none());
  }
}
