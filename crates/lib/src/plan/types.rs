//! Build plan types.
//!
//! A plan is plain data: nothing in here spawns processes or touches the
//! filesystem, so plans can be inspected, printed and compared in tests.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::platform::PlatformFacts;
use crate::variant::Variant;

use super::table::{MachineTriple, TableKey};

/// A process to run, relative to the plan's working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  /// File (relative to the working directory) fed to the process on stdin.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stdin: Option<PathBuf>,
  /// Subdirectory to run in; defaults to the working directory.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cwd: Option<PathBuf>,
}

impl Invocation {
  pub fn new(program: &str) -> Self {
    Self {
      program: program.to_string(),
      args: Vec::new(),
      stdin: None,
      cwd: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn stdin(mut self, path: impl Into<PathBuf>) -> Self {
    self.stdin = Some(path.into());
    self
  }

  pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
    self.cwd = Some(path.into());
    self
  }

  /// Shell-like rendering for logs and plan output.
  pub fn display(&self) -> String {
    let mut rendered = self.program.clone();
    for arg in &self.args {
      rendered.push(' ');
      rendered.push_str(arg);
    }
    if let Some(stdin) = &self.stdin {
      rendered.push_str(&format!(" < {}", stdin.display()));
    }
    rendered
  }
}

/// One step of a build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
  /// Bind an environment variable for every later `Run` step.
  SetEnv { key: String, value: String },
  /// Write a file relative to the working directory.
  WriteFile { path: PathBuf, contents: String },
  /// Run a process.
  Run(Invocation),
}

/// Inputs the planner takes from outside the formula.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanInputs {
  /// `libexec` directories of installed formulas, by formula name.
  pub dependency_paths: BTreeMap<String, PathBuf>,
  /// Fortran driver exported as `FC`.
  pub fortran: Option<String>,
  /// Check the sources out from the formula's head before building.
  pub fetch: bool,
}

/// A concrete, ordered build plan for one formula on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
  pub formula: String,
  pub platform: PlatformFacts,
  pub machine: MachineTriple,
  pub variants: Vec<Variant>,
  pub installer_input: String,
  pub steps: Vec<Step>,
}

impl BuildPlan {
  /// Environment bound by the plan's `SetEnv` steps, last binding wins.
  pub fn env(&self) -> BTreeMap<String, String> {
    self
      .steps
      .iter()
      .filter_map(|step| match step {
        Step::SetEnv { key, value } => Some((key.clone(), value.clone())),
        _ => None,
      })
      .collect()
  }

  /// Fortran driver the plan binds, if any.
  pub fn fortran(&self) -> Option<String> {
    self.env().get("FC").cloned()
  }

  /// Stable content hash of the plan.
  pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
    let serialized = serde_json::to_string(self)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
  #[error("unsupported platform: {0}")]
  UnsupportedPlatform(TableKey),

  #[error("installer table has no entry for declared platform {0}")]
  IncompleteTable(TableKey),

  #[error("installer table entry {0} is not a declared platform")]
  UndeclaredTableEntry(TableKey),

  #[error("installer menu refers to undeclared option {0}")]
  UnknownMenuOption(String),

  #[error("{var} needs formula {formula}, which is not installed")]
  MissingBinding { var: String, formula: String },

  #[error("formula {0} has no installer recipe")]
  NotBuildable(String),

  #[error("formula {0} has no head source to fetch")]
  NoHeadSource(String),
}
