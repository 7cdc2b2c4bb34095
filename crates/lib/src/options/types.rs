//! Types for declaring and resolving build options.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The shape of values an option accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OptionKind {
  Boolean,
  Enum { choices: Vec<String> },
}

/// A concrete option value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
  Bool(bool),
  Choice(String),
}

impl OptionValue {
  /// A value as typed on the command line. Resolution interprets it against
  /// the option's kind.
  pub fn raw(raw: &str) -> Self {
    Self::Choice(raw.to_string())
  }
}

fn parse_bool(raw: &str) -> Option<bool> {
  match raw {
    "true" | "yes" | "on" => Some(true),
    "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

impl fmt::Display for OptionValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Bool(b) => write!(f, "{}", b),
      Self::Choice(c) => write!(f, "{}", c),
    }
  }
}

/// A soft conflict: selecting both options is allowed but worth a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caution {
  pub peer: String,
  pub message: String,
}

/// Declaration of a single build option. Immutable once declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
  pub name: String,
  pub description: String,
  pub kind: OptionKind,
  pub default: OptionValue,
  /// Options that may not be selected together with this one.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub exclusive_with: Vec<String>,
  /// Option that must be selected for this one to stay on.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub requires: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cautions: Vec<Caution>,
}

impl OptionSpec {
  /// Declare a boolean option that defaults to off.
  pub fn boolean(name: &str, description: &str) -> Self {
    Self {
      name: name.to_string(),
      description: description.to_string(),
      kind: OptionKind::Boolean,
      default: OptionValue::Bool(false),
      exclusive_with: Vec::new(),
      requires: None,
      cautions: Vec::new(),
    }
  }

  /// Declare an enum option with its allowed choices and default.
  pub fn choice(name: &str, description: &str, choices: &[&str], default: &str) -> Self {
    Self {
      name: name.to_string(),
      description: description.to_string(),
      kind: OptionKind::Enum {
        choices: choices.iter().map(|c| c.to_string()).collect(),
      },
      default: OptionValue::Choice(default.to_string()),
      exclusive_with: Vec::new(),
      requires: None,
      cautions: Vec::new(),
    }
  }

  pub fn exclusive_with(mut self, peer: &str) -> Self {
    self.exclusive_with.push(peer.to_string());
    self
  }

  pub fn requires(mut self, prerequisite: &str) -> Self {
    self.requires = Some(prerequisite.to_string());
    self
  }

  pub fn caution(mut self, peer: &str, message: &str) -> Self {
    self.cautions.push(Caution {
      peer: peer.to_string(),
      message: message.to_string(),
    });
    self
  }

  /// Whether `value` counts as "selected" for constraint purposes.
  ///
  /// Booleans are selected when true; enums when they differ from the default.
  pub fn is_selected(&self, value: &OptionValue) -> bool {
    match value {
      OptionValue::Bool(b) => *b,
      OptionValue::Choice(_) => value != &self.default,
    }
  }

  /// The value that turns this option off.
  pub fn off_value(&self) -> OptionValue {
    match self.kind {
      OptionKind::Boolean => OptionValue::Bool(false),
      OptionKind::Enum { .. } => self.default.clone(),
    }
  }

  /// Check that `value` fits this option's kind, coercing where unambiguous.
  pub fn accept(&self, value: &OptionValue) -> Option<OptionValue> {
    match (&self.kind, value) {
      (OptionKind::Boolean, OptionValue::Bool(b)) => Some(OptionValue::Bool(*b)),
      (OptionKind::Boolean, OptionValue::Choice(raw)) => parse_bool(raw).map(OptionValue::Bool),
      (OptionKind::Enum { choices }, OptionValue::Choice(c)) if choices.contains(c) => Some(value.clone()),
      (OptionKind::Enum { choices }, OptionValue::Bool(b)) if choices.contains(&b.to_string()) => {
        Some(OptionValue::Choice(b.to_string()))
      }
      _ => None,
    }
  }
}

/// Severity of a non-fatal resolution note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryLevel {
  Notice,
  Warning,
}

/// A non-fatal message produced while resolving options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
  pub level: AdvisoryLevel,
  pub options: Vec<String>,
  pub message: String,
}

impl fmt::Display for Advisory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}] {}", self.options.join(" + "), self.message)
  }
}

/// User-supplied option values, keyed by option name.
pub type Overrides = BTreeMap<String, OptionValue>;

/// The outcome of option resolution.
///
/// Every mutual-exclusion constraint holds and every dependent option either
/// has its prerequisite selected or has been forced off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOptions {
  pub values: BTreeMap<String, OptionValue>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub advisories: Vec<Advisory>,
}

impl ResolvedOptions {
  /// True when a boolean option is on.
  pub fn enabled(&self, name: &str) -> bool {
    matches!(self.values.get(name), Some(OptionValue::Bool(true)))
  }

  pub fn value(&self, name: &str) -> Option<&OptionValue> {
    self.values.get(name)
  }

  pub fn choice(&self, name: &str) -> Option<&str> {
    match self.values.get(name) {
      Some(OptionValue::Choice(c)) => Some(c),
      _ => None,
    }
  }

  pub fn warnings(&self) -> impl Iterator<Item = &Advisory> {
    self.advisories.iter().filter(|a| a.level == AdvisoryLevel::Warning)
  }
}

/// Errors that can occur while resolving options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
  #[error("unknown option: {0}")]
  UnknownOption(String),

  #[error("options {first} and {second} are mutually exclusive")]
  ConstraintViolation { first: String, second: String },

  #[error("invalid value '{value}' for option {option}")]
  InvalidValue { option: String, value: String },

  #[error("invalid declaration for option {option}: {reason}")]
  InvalidSpec { option: String, reason: String },
}
