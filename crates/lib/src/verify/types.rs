//! Types for verification runs.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::RecordError;
use crate::variant::Precision;

/// One package kind exercised at one precision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fixture {
  pub package: String,
  pub precision: Precision,
}

impl fmt::Display for Fixture {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.package, self.precision)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureOutcome {
  pub fixture: Fixture,
  pub passed: bool,
  /// Exit code, `None` when the runner did not exit normally or never started.
  pub code: Option<i32>,
  /// Captured stdout and stderr of the runner.
  pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
  pub formula: String,
  /// Dotted machine triple read from the install record.
  pub machine: String,
  pub outcomes: Vec<FixtureOutcome>,
}

impl VerificationReport {
  pub fn is_success(&self) -> bool {
    self.outcomes.iter().all(|o| o.passed)
  }

  pub fn failures(&self) -> impl Iterator<Item = &FixtureOutcome> {
    self.outcomes.iter().filter(|o| !o.passed)
  }

  pub fn passed(&self) -> usize {
    self.outcomes.iter().filter(|o| o.passed).count()
  }

  /// Turn a report with failing fixtures into an error.
  pub fn ensure_success(&self) -> Result<(), VerifyError> {
    let failed: Vec<String> = self.failures().map(|o| o.fixture.to_string()).collect();
    if failed.is_empty() {
      Ok(())
    } else {
      Err(VerifyError::VerificationFailure {
        formula: self.formula.clone(),
        failed,
        total: self.outcomes.len(),
      })
    }
  }
}

#[derive(Debug, Error)]
pub enum VerifyError {
  #[error("formula {0} is not installed")]
  NotInstalled(String),

  #[error("formula {0} has no verification fixtures")]
  NotVerifiable(String),

  #[error("{var} needs formula {formula}, which is not installed")]
  MissingBinding { var: String, formula: String },

  #[error(transparent)]
  Record(#[from] RecordError),

  #[error("{formula}: {} of {total} fixtures failed: {}", .failed.len(), .failed.join(", "))]
  VerificationFailure {
    formula: String,
    failed: Vec<String>,
    total: usize,
  },
}
