//! Types for shared-object linking.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::execute::ExecuteError;
use crate::platform::os::Os;
use crate::variant::Variant;

/// Platform-specific linker flags for turning a static archive into a
/// shared object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFlags {
  /// Pull in every object of the following archive.
  pub force_all: &'static str,
  pub stop_force_all: &'static str,
  /// Appended after the output name.
  pub extra: &'static [&'static str],
  pub suffix: &'static str,
}

impl LinkFlags {
  pub fn for_os(os: Os) -> Self {
    match os {
      Os::MacOs => Self {
        force_all: "-Wl,-all_load",
        stop_force_all: "-Wl,-noall_load",
        extra: &[
          "-Wl,-undefined",
          "-Wl,dynamic_lookup",
          "-Wl,-headerpad_max_install_names",
        ],
        suffix: "dylib",
      },
      Os::Linux | Os::Windows => Self {
        force_all: "-Wl,-whole-archive",
        stop_force_all: "-Wl,-no-whole-archive",
        extra: &[],
        suffix: "so",
      },
    }
  }
}

/// Outcome of linking a set of variants.
///
/// Every requested variant ends up in exactly one of the two maps.
#[derive(Debug, Default)]
pub struct LinkReport {
  pub produced: BTreeMap<Variant, Vec<PathBuf>>,
  pub failures: BTreeMap<Variant, LinkError>,
}

impl LinkReport {
  pub fn is_success(&self) -> bool {
    self.failures.is_empty()
  }

  /// All produced shared objects, ordered by variant then archive name.
  pub fn artifacts(&self) -> impl Iterator<Item = &PathBuf> {
    self.produced.values().flatten()
  }
}

/// A link failure, scoped to one variant.
#[derive(Debug, Error)]
pub enum LinkError {
  #[error("no static archives for {variant} in {dir}")]
  MissingArchives { variant: Variant, dir: PathBuf },

  #[error("linking {archive} for {variant} failed with exit code {code:?}")]
  LinkerFailed {
    variant: Variant,
    archive: String,
    code: Option<i32>,
    output: String,
  },

  #[error("cannot scan {dir} for {variant}: {message}")]
  Scan {
    variant: Variant,
    dir: PathBuf,
    message: String,
  },

  #[error("linker for {variant} could not run: {source}")]
  Execute {
    variant: Variant,
    #[source]
    source: ExecuteError,
  },

  #[error("link job for {variant} was cancelled")]
  Cancelled { variant: Variant },
}

impl LinkError {
  pub fn variant(&self) -> Variant {
    match self {
      Self::MissingArchives { variant, .. }
      | Self::LinkerFailed { variant, .. }
      | Self::Scan { variant, .. }
      | Self::Execute { variant, .. }
      | Self::Cancelled { variant } => *variant,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn darwin_and_linux_flags() {
    let darwin = LinkFlags::for_os(Os::MacOs);
    assert_eq!(darwin.suffix, "dylib");
    assert_eq!(darwin.force_all, "-Wl,-all_load");
    assert_eq!(darwin.extra.len(), 3);

    let linux = LinkFlags::for_os(Os::Linux);
    assert_eq!(linux.suffix, "so");
    assert_eq!(linux.stop_force_all, "-Wl,-no-whole-archive");
    assert!(linux.extra.is_empty());
  }
}
