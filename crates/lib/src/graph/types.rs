//! Dependency edge declarations and graph errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::ResolvedOptions;

/// When a dependency is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredAt {
  Build,
  Run,
}

impl fmt::Display for RequiredAt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Build => write!(f, "build"),
      Self::Run => write!(f, "run"),
    }
  }
}

/// Predicate over resolved options deciding whether an edge participates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "when", content = "option", rename_all = "snake_case")]
pub enum Activation {
  Always,
  Enabled(String),
  Disabled(String),
}

impl Activation {
  pub fn holds(&self, resolved: &ResolvedOptions) -> bool {
    match self {
      Self::Always => true,
      Self::Enabled(option) => resolved.enabled(option),
      Self::Disabled(option) => !resolved.enabled(option),
    }
  }
}

/// A declared dependency on another formula. Never mutated after declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
  pub formula: String,
  pub required_at: RequiredAt,
  pub activation: Activation,
}

impl DependencyEdge {
  pub fn build(formula: &str) -> Self {
    Self {
      formula: formula.to_string(),
      required_at: RequiredAt::Build,
      activation: Activation::Always,
    }
  }

  pub fn run(formula: &str) -> Self {
    Self {
      formula: formula.to_string(),
      required_at: RequiredAt::Run,
      activation: Activation::Always,
    }
  }

  /// Only activate this edge when `option` is enabled.
  pub fn when_enabled(mut self, option: &str) -> Self {
    self.activation = Activation::Enabled(option.to_string());
    self
  }

  pub fn when_disabled(mut self, option: &str) -> Self {
    self.activation = Activation::Disabled(option.to_string());
    self
  }
}

/// A dependency cycle, listed so that each entry depends on the next and the
/// last depends on the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle(pub Vec<String>);

impl fmt::Display for Cycle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut path = self.0.join(" -> ");
    if let Some(first) = self.0.first() {
      path.push_str(" -> ");
      path.push_str(first);
    }
    write!(f, "{}", path)
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
  #[error("dependency cycle detected: {0}")]
  CycleDetected(Cycle),

  #[error("unknown formula: {0}")]
  UnknownFormula(String),

  #[error("{dependent} depends on undeclared formula {dependency}")]
  UndeclaredDependency { dependent: String, dependency: String },
}
