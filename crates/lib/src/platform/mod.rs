pub mod arch;
pub mod os;
pub mod paths;

use std::fmt;

use serde::{Deserialize, Serialize};

use arch::{Arch, WordSize};
use os::Os;

/// Fortran toolchain family used to compile and relink a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerFamily {
  Gnu,
  Pgi,
}

impl CompilerFamily {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Gnu => "gnu",
      Self::Pgi => "pgi",
    }
  }

  /// Default Fortran driver for this family, used when no `FC` is configured.
  pub fn default_fortran(&self) -> &'static str {
    match self {
      Self::Gnu => "gfortran",
      Self::Pgi => "pgfortran",
    }
  }
}

impl fmt::Display for CompilerFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Everything the planner needs to know about the build host.
///
/// Captured once per invocation and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformFacts {
  pub os: Os,
  pub word_size: WordSize,
  pub compiler: CompilerFamily,
}

impl PlatformFacts {
  pub fn new(os: Os, word_size: WordSize, compiler: CompilerFamily) -> Self {
    Self { os, word_size, compiler }
  }

  pub fn is_64_bit(&self) -> bool {
    self.word_size == WordSize::Bits64
  }
}

impl fmt::Display for PlatformFacts {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {}", self.os, self.word_size, self.compiler)
  }
}

/// Returns the platform triple for the current system (e.g., "aarch64-darwin")
///
/// Returns `None` if the current platform is not supported
pub fn platform_triple() -> Option<String> {
  Platform::current().map(|p| p.triple())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn platform_triple_format() {
    let platform = Platform::new(Arch::Aarch64, Os::MacOs);
    assert_eq!(platform.triple(), "aarch64-darwin");

    let platform = Platform::new(Arch::X86_64, Os::Linux);
    assert_eq!(platform.triple(), "x86_64-linux");
  }

  #[test]
  fn facts_word_size_follows_arch() {
    assert_eq!(Arch::X86.word_size(), WordSize::Bits32);
    let facts = PlatformFacts::new(Os::Linux, Arch::Aarch64.word_size(), CompilerFamily::Gnu);
    assert!(facts.is_64_bit());
    assert_eq!(facts.to_string(), "linux 64-bit gnu");
  }
}
