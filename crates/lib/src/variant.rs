//! Build variants: one concrete (precision, compiler) configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::options::ResolvedOptions;
use crate::platform::CompilerFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
  Single,
  Double,
}

impl Precision {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Single => "single",
      Self::Double => "double",
    }
  }
}

impl fmt::Display for Precision {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Precision {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "single" => Ok(Self::Single),
      "double" => Ok(Self::Double),
      other => Err(format!("unknown precision: {}", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Variant {
  pub precision: Precision,
  pub compiler: CompilerFamily,
}

impl Variant {
  pub fn new(precision: Precision, compiler: CompilerFamily) -> Self {
    Self { precision, compiler }
  }
}

impl fmt::Display for Variant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.precision, self.compiler)
  }
}

/// Derive the variant set for a build.
///
/// Double precision is always built. Single precision is built only when
/// `single_option` names an enabled option. The result is sorted and free of
/// duplicates.
pub fn derive_variants(resolved: &ResolvedOptions, single_option: Option<&str>, compiler: CompilerFamily) -> Vec<Variant> {
  let mut variants = vec![Variant::new(Precision::Double, compiler)];
  if single_option.is_some_and(|option| resolved.enabled(option)) {
    variants.push(Variant::new(Precision::Single, compiler));
  }
  variants.sort();
  variants
}
