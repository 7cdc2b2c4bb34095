//! Formula declaration types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{DependencyEdge, GraphError};
use crate::options::{OptionSpec, ResolveError};
use crate::plan::{InstallerTable, PlanError, TableKey};

/// Where a formula's head sources come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadSource {
  pub url: String,
  pub strategy: FetchStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FetchStrategy {
  /// Subversion checkout. Some servers only allow `--username anonymous`.
  Subversion { anonymous: bool },
}

/// A unified diff applied to the sources with `patch -p1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
  pub name: String,
  pub diff: String,
}

/// An environment variable the installer reads, pointing at a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBinding {
  pub var: String,
  pub formula: String,
}

/// Shared directory a keg file may be exposed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedDir {
  Bin,
  Include,
  Man1,
  Man3,
  Lib,
  Doc,
}

impl SharedDir {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Bin => "bin",
      Self::Include => "include",
      Self::Man1 => "man1",
      Self::Man3 => "man3",
      Self::Lib => "lib",
      Self::Doc => "doc",
    }
  }
}

/// Selects files directly inside `source` (relative to `libexec`), either by
/// exact name or by name `prefix` and `suffix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
  pub target: SharedDir,
  pub source: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub names: Vec<String>,
  #[serde(default)]
  pub prefix: String,
  #[serde(default)]
  pub suffix: String,
  /// Subdirectory of the shared directory to place links in.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subdir: Option<String>,
}

impl Selector {
  pub fn new(target: SharedDir, source: &str) -> Self {
    Self {
      target,
      source: source.to_string(),
      names: Vec::new(),
      prefix: String::new(),
      suffix: String::new(),
      subdir: None,
    }
  }

  pub fn named(mut self, names: &[&str]) -> Self {
    self.names = names.iter().map(|n| n.to_string()).collect();
    self
  }

  pub fn prefix(mut self, prefix: &str) -> Self {
    self.prefix = prefix.to_string();
    self
  }

  pub fn suffix(mut self, suffix: &str) -> Self {
    self.suffix = suffix.to_string();
    self
  }

  pub fn subdir(mut self, subdir: &str) -> Self {
    self.subdir = Some(subdir.to_string());
    self
  }

  pub fn matches(&self, file_name: &str) -> bool {
    if !self.names.is_empty() {
      return self.names.iter().any(|n| n == file_name);
    }
    file_name.len() >= self.prefix.len() + self.suffix.len()
      && file_name.starts_with(&self.prefix)
      && file_name.ends_with(&self.suffix)
  }
}

/// Matlab-specific additions to the environment script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatlabEnv {
  pub option: String,
  pub arch_var: String,
  pub path_suffix: String,
  /// Doc file pointing at mex setup notes, shown in caveats.
  pub readme: String,
}

/// The shell script users source to pick up the install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvScript {
  pub file: String,
  pub export_var: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub matlab: Option<MatlabEnv>,
}

/// How to exercise an installed formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSpec {
  /// Runner binary, relative to `libexec/bin`.
  pub runner: String,
  pub packages: Vec<String>,
  /// Test problem, relative to `libexec`.
  pub problem: String,
  /// Extra runner flag selecting single precision.
  pub single_flag: String,
  /// Variable pointing at the problem data directory.
  pub data_var: String,
  /// Data directory relative to `libexec`.
  pub data_dir: String,
  /// Variable carrying the dotted machine triple.
  pub arch_var: String,
}

/// Everything needed to drive an upstream, menu-driven installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerRecipe {
  pub program: String,
  pub input_file: String,
  /// The upstream build is order-sensitive and must run with `-j1`.
  pub deparallelize: bool,
  pub patches: Vec<Patch>,
  pub table: InstallerTable,
  pub supported: Vec<TableKey>,
  pub bindings: Vec<EnvBinding>,
  pub single_option: Option<String>,
  /// Boolean option that switches the toolchain to PGI.
  pub pgi_option: Option<String>,
  pub objects_dir: String,
  /// Stem of the static archives, e.g. `libcutest`.
  pub library: String,
  pub exposed: Vec<Selector>,
  pub env_script: EnvScript,
  pub record_file: String,
  pub verification: VerificationSpec,
}

/// A keg-only data formula: copy everything, export one variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataArchive {
  pub env_var: String,
  pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormulaKind {
  /// Provided by the system; ordered but never installed by keg.
  External,
  /// Copied verbatim into the keg's `libexec`.
  Libexec,
  DataArchive(DataArchive),
  Installer(Box<InstallerRecipe>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
  pub name: String,
  pub description: String,
  pub homepage: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub head: Option<HeadSource>,
  /// Reason the formula is never linked into shared directories.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub keg_only: Option<String>,
  pub options: Vec<OptionSpec>,
  pub dependencies: Vec<DependencyEdge>,
  pub kind: FormulaKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
  #[error("formula {formula}: {source}")]
  Options {
    formula: String,
    #[source]
    source: ResolveError,
  },

  #[error("formula {formula}: {source}")]
  Table {
    formula: String,
    #[source]
    source: PlanError,
  },

  #[error(transparent)]
  Graph(#[from] GraphError),
}
