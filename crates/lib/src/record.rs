//! Persisted machine record.
//!
//! The install phase writes which machine/arch/compiler triple and which
//! precisions it built; the verification phase, usually a separate process,
//! reads it back. The file is newline-separated:
//!
//! ```text
//! pc64
//! lnx
//! gfo
//! single,double
//! ```
//!
//! Older installs wrote only the first two lines. Those read back as compiler
//! `gfo` with both precisions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::plan::MachineTriple;
use crate::util::fs::atomic_write;
use crate::variant::Precision;

/// Compiler tag assumed for records that predate the compiler line.
pub const LEGACY_COMPILER: &str = "gfo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
  pub machine: MachineTriple,
  /// Sorted, without duplicates.
  pub precisions: Vec<Precision>,
}

#[derive(Debug, Error)]
pub enum RecordError {
  #[error("machine record {path} not found; is the formula installed?")]
  NotFound { path: PathBuf },

  #[error("failed to read machine record {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write machine record {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed machine record: {0}")]
  Malformed(String),
}

impl MachineRecord {
  pub fn new(machine: MachineTriple, precisions: impl IntoIterator<Item = Precision>) -> Self {
    let mut precisions: Vec<Precision> = precisions.into_iter().collect();
    precisions.sort();
    precisions.dedup();
    Self { machine, precisions }
  }

  /// The dotted triple used for `MYARCH`.
  pub fn myarch(&self) -> String {
    self.machine.myarch()
  }

  pub fn render(&self) -> String {
    let precisions: Vec<&str> = self.precisions.iter().map(Precision::as_str).collect();
    format!(
      "{}\n{}\n{}\n{}\n",
      self.machine.machine,
      self.machine.arch,
      self.machine.compiler,
      precisions.join(",")
    )
  }

  pub fn parse(text: &str) -> Result<Self, RecordError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
      [machine, arch] => Ok(Self::new(
        MachineTriple::new(machine, arch, LEGACY_COMPILER),
        [Precision::Double, Precision::Single],
      )),
      [machine, arch, compiler] => Ok(Self::new(
        MachineTriple::new(machine, arch, compiler),
        [Precision::Double],
      )),
      [machine, arch, compiler, precisions] => {
        let precisions = precisions
          .split(',')
          .map(|p| p.parse::<Precision>().map_err(RecordError::Malformed))
          .collect::<Result<Vec<_>, _>>()?;
        if precisions.is_empty() {
          return Err(RecordError::Malformed("empty precision list".to_string()));
        }
        Ok(Self::new(MachineTriple::new(machine, arch, compiler), precisions))
      }
      other => Err(RecordError::Malformed(format!(
        "expected 2 to 4 tokens, found {}",
        other.len()
      ))),
    }
  }

  /// Write the record atomically.
  pub fn write(&self, path: &Path) -> Result<(), RecordError> {
    debug!(path = ?path, machine = %self.machine, "writing machine record");
    atomic_write(path, &self.render()).map_err(|source| RecordError::Write {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn read(path: &Path) -> Result<Self, RecordError> {
    let text = fs::read_to_string(path).map_err(|source| {
      if source.kind() == std::io::ErrorKind::NotFound {
        RecordError::NotFound {
          path: path.to_path_buf(),
        }
      } else {
        RecordError::Read {
          path: path.to_path_buf(),
          source,
        }
      }
    })?;
    Self::parse(&text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn render_layout() {
    let record = MachineRecord::new(
      MachineTriple::new("mac64", "osx", "gfo"),
      [Precision::Double, Precision::Single],
    );
    assert_eq!(record.render(), "mac64\nosx\ngfo\nsingle,double\n");
    assert_eq!(record.myarch(), "mac64.osx.gfo");
  }

  #[test]
  fn survives_separate_reads() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cutest.machine");
    let record = MachineRecord::new(MachineTriple::new("pc64", "lnx", "pgf"), [Precision::Double]);

    record.write(&path).unwrap();

    assert_eq!(MachineRecord::read(&path).unwrap(), record);
  }

  #[test]
  fn legacy_two_line_record() {
    let record = MachineRecord::parse("pc64\nlnx\n").unwrap();
    assert_eq!(record.machine, MachineTriple::new("pc64", "lnx", "gfo"));
    assert_eq!(record.precisions, vec![Precision::Single, Precision::Double]);
  }

  #[test]
  fn malformed_records() {
    assert!(matches!(MachineRecord::parse(""), Err(RecordError::Malformed(_))));
    assert!(matches!(
      MachineRecord::parse("pc64\nlnx\ngfo\nquad\n"),
      Err(RecordError::Malformed(_))
    ));
    assert!(matches!(
      MachineRecord::parse("a b c d e"),
      Err(RecordError::Malformed(_))
    ));
  }

  #[test]
  fn missing_record() {
    let temp = TempDir::new().unwrap();
    assert!(matches!(
      MachineRecord::read(&temp.path().join("cutest.machine")),
      Err(RecordError::NotFound { .. })
    ));
  }
}
