//! Types for the installation layout.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::formula::SharedDir;
use crate::record::RecordError;

/// Logical kind of an exposed artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
  Binary,
  Header,
  Library,
  Man,
  Doc,
}

impl From<SharedDir> for ArtifactKind {
  fn from(dir: SharedDir) -> Self {
    match dir {
      SharedDir::Bin => Self::Binary,
      SharedDir::Include => Self::Header,
      SharedDir::Lib => Self::Library,
      SharedDir::Man1 | SharedDir::Man3 => Self::Man,
      SharedDir::Doc => Self::Doc,
    }
  }
}

/// Where an install put things.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledLayout {
  pub formula: String,
  /// The keg directory, `Cellar/<formula>/HEAD`.
  pub keg: PathBuf,
  /// Directory holding the copied build tree.
  pub root: PathBuf,
  /// Symlinks created in shared directories, by kind.
  pub artifacts: BTreeMap<ArtifactKind, Vec<PathBuf>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env_script: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub record: Option<PathBuf>,
}

impl InstalledLayout {
  pub fn links(&self) -> impl Iterator<Item = &PathBuf> {
    self.artifacts.values().flatten()
  }

  pub(crate) fn add(&mut self, kind: ArtifactKind, links: impl IntoIterator<Item = PathBuf>) {
    let entry = self.artifacts.entry(kind).or_default();
    entry.extend(links);
    entry.sort();
    entry.dedup();
  }
}

#[derive(Debug, Error)]
pub enum InstallError {
  #[error("build directory {0} does not exist")]
  MissingBuildDir(PathBuf),

  #[error("formula {0} is provided by the system and cannot be installed")]
  NotInstallable(String),

  #[error("formula {0} needs a build plan to install")]
  MissingPlan(String),

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Record(#[from] RecordError),
}

impl InstallError {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { path, source }
  }
}
