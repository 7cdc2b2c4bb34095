//! Install prefix layout.
//!
//! ```text
//! {prefix}/
//! ├── Cellar/<formula>/HEAD/   # isolated keg, owned by one formula
//! ├── opt/<formula>            # stable symlink to the current keg
//! ├── bin/ include/ lib/       # shared directories, file symlinks only
//! └── share/man/man{1,3}/ share/doc/<formula>/
//! ```

use std::path::{Path, PathBuf};

/// Formulas are head-only, so every keg lives under this version directory.
pub const HEAD_VERSION: &str = "HEAD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
  root: PathBuf,
}

impl Prefix {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn cellar(&self) -> PathBuf {
    self.root.join("Cellar")
  }

  pub fn keg(&self, formula: &str) -> Keg {
    Keg {
      name: formula.to_string(),
      path: self.cellar().join(formula).join(HEAD_VERSION),
      opt: self.root.join("opt").join(formula),
    }
  }

  pub fn bin(&self) -> PathBuf {
    self.root.join("bin")
  }

  pub fn include(&self) -> PathBuf {
    self.root.join("include")
  }

  pub fn lib(&self) -> PathBuf {
    self.root.join("lib")
  }

  pub fn man(&self, section: u8) -> PathBuf {
    self.root.join("share").join("man").join(format!("man{}", section))
  }

  pub fn doc(&self, formula: &str) -> PathBuf {
    self.root.join("share").join("doc").join(formula)
  }
}

/// The isolated directory tree owned by one formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keg {
  pub name: String,
  pub path: PathBuf,
  pub opt: PathBuf,
}

impl Keg {
  pub fn libexec(&self) -> PathBuf {
    self.path.join("libexec")
  }

  /// `libexec` reached through the `opt` link, stable across reinstalls.
  pub fn opt_libexec(&self) -> PathBuf {
    self.opt.join("libexec")
  }

  pub fn is_installed(&self) -> bool {
    self.path.is_dir()
  }
}
