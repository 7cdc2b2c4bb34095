//! Installer lookup table.
//!
//! The upstream installer asks a fixed sequence of menu questions whose
//! answers depend on the host. Instead of branching on the platform, every
//! supported (OS, word size, compiler) combination has an explicit entry here.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::options::ResolvedOptions;
use crate::platform::arch::WordSize;
use crate::platform::os::Os;
use crate::platform::{CompilerFamily, PlatformFacts};

use super::types::PlanError;

/// Key of the installer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableKey {
  pub os: Os,
  pub word_size: WordSize,
  pub compiler: CompilerFamily,
}

impl TableKey {
  pub fn new(os: Os, word_size: WordSize, compiler: CompilerFamily) -> Self {
    Self { os, word_size, compiler }
  }
}

impl From<&PlatformFacts> for TableKey {
  fn from(facts: &PlatformFacts) -> Self {
    Self::new(facts.os, facts.word_size, facts.compiler)
  }
}

impl fmt::Display for TableKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {}", self.os, self.word_size, self.compiler)
  }
}

/// The machine/arch/compiler naming the installer uses for its object tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineTriple {
  pub machine: String,
  pub arch: String,
  pub compiler: String,
}

impl MachineTriple {
  pub fn new(machine: &str, arch: &str, compiler: &str) -> Self {
    Self {
      machine: machine.to_string(),
      arch: arch.to_string(),
      compiler: compiler.to_string(),
    }
  }

  /// Dotted form used for object directories and `MYARCH`, e.g. `pc64.lnx.gfo`.
  pub fn myarch(&self) -> String {
    format!("{}.{}.{}", self.machine, self.arch, self.compiler)
  }
}

impl fmt::Display for MachineTriple {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.myarch())
  }
}

/// One answer line in the installer input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MenuLine {
  /// A fixed answer.
  Literal { value: String },
  /// `prefix` followed by `on` or `off` depending on a boolean option.
  Switch {
    prefix: String,
    option: String,
    on: String,
    off: String,
  },
}

impl MenuLine {
  pub fn literal(value: &str) -> Self {
    Self::Literal {
      value: value.to_string(),
    }
  }

  pub fn switch(prefix: &str, option: &str, on: &str, off: &str) -> Self {
    Self::Switch {
      prefix: prefix.to_string(),
      option: option.to_string(),
      on: on.to_string(),
      off: off.to_string(),
    }
  }

  pub fn render(&self, resolved: &ResolvedOptions) -> String {
    match self {
      Self::Literal { value } => value.clone(),
      Self::Switch { prefix, option, on, off } => {
        let answer = if resolved.enabled(option) { on } else { off };
        format!("{}{}", prefix, answer)
      }
    }
  }

  fn option(&self) -> Option<&str> {
    match self {
      Self::Literal { .. } => None,
      Self::Switch { option, .. } => Some(option),
    }
  }
}

/// Everything the table knows about one supported platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerProfile {
  pub machine: MachineTriple,
  pub menu: Vec<MenuLine>,
}

impl InstallerProfile {
  /// Render the installer's stdin script. Each answer ends with a newline.
  pub fn render_input(&self, resolved: &ResolvedOptions) -> String {
    let mut input = String::new();
    for line in &self.menu {
      input.push_str(&line.render(resolved));
      input.push('\n');
    }
    input
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerTable {
  entries: BTreeMap<TableKey, InstallerProfile>,
}

impl InstallerTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, key: TableKey, profile: InstallerProfile) -> Self {
    self.entries.insert(key, profile);
    self
  }

  pub fn keys(&self) -> impl Iterator<Item = &TableKey> {
    self.entries.keys()
  }

  /// Look up the profile for `facts`. Never falls back to a neighbouring entry.
  pub fn lookup(&self, facts: &PlatformFacts) -> Result<&InstallerProfile, PlanError> {
    self
      .entries
      .get(&TableKey::from(facts))
      .ok_or(PlanError::UnsupportedPlatform(TableKey::from(facts)))
  }

  /// Check the table against the platforms a formula claims to support and
  /// the options it declares.
  pub fn validate(&self, supported: &[TableKey], declared_options: &[&str]) -> Result<(), PlanError> {
    for key in supported {
      if !self.entries.contains_key(key) {
        return Err(PlanError::IncompleteTable(*key));
      }
    }
    for key in self.entries.keys() {
      if !supported.contains(key) {
        return Err(PlanError::UndeclaredTableEntry(*key));
      }
    }
    for profile in self.entries.values() {
      for option in profile.menu.iter().filter_map(MenuLine::option) {
        if !declared_options.contains(&option) {
          return Err(PlanError::UnknownMenuOption(option.to_string()));
        }
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::OptionValue;

  fn linux64() -> TableKey {
    TableKey::new(Os::Linux, WordSize::Bits64, CompilerFamily::Gnu)
  }

  fn table() -> InstallerTable {
    InstallerTable::new().with(
      linux64(),
      InstallerProfile {
        machine: MachineTriple::new("pc64", "lnx", "gfo"),
        menu: vec![MenuLine::literal("6"), MenuLine::switch("nnyd", "with-single", "y", "n")],
      },
    )
  }

  #[test]
  fn render_switches_on_options() {
    let profile = table().lookup(&PlatformFacts::new(Os::Linux, WordSize::Bits64, CompilerFamily::Gnu)).unwrap().clone();

    assert_eq!(profile.render_input(&ResolvedOptions::default()), "6\nnnydn\n");

    let mut resolved = ResolvedOptions::default();
    resolved.values.insert("with-single".to_string(), OptionValue::Bool(true));
    assert_eq!(profile.render_input(&resolved), "6\nnnydy\n");
  }

  #[test]
  fn lookup_misses_are_unsupported() {
    let facts = PlatformFacts::new(Os::Linux, WordSize::Bits32, CompilerFamily::Gnu);
    let err = table().lookup(&facts).unwrap_err();
    assert_eq!(err, PlanError::UnsupportedPlatform(TableKey::from(&facts)));
  }

  #[test]
  fn validation_catches_gaps_and_strays() {
    let darwin = TableKey::new(Os::MacOs, WordSize::Bits64, CompilerFamily::Gnu);
    assert_eq!(
      table().validate(&[linux64(), darwin], &["with-single"]),
      Err(PlanError::IncompleteTable(darwin))
    );
    assert_eq!(
      table().validate(&[], &["with-single"]),
      Err(PlanError::UndeclaredTableEntry(linux64()))
    );
    assert_eq!(
      table().validate(&[linux64()], &[]),
      Err(PlanError::UnknownMenuOption("with-single".to_string()))
    );
    assert!(table().validate(&[linux64()], &["with-single"]).is_ok());
  }

  #[test]
  fn myarch_is_dotted() {
    assert_eq!(MachineTriple::new("mac64", "osx", "gfo").myarch(), "mac64.osx.gfo");
  }
}
