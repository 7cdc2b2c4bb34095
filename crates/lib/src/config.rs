//! User configuration.
//!
//! Read from `<config_dir>/config.toml` when present, then overridden by the
//! environment:
//!
//! | Variable          | Field         |
//! |-------------------|---------------|
//! | `KEG_PREFIX`      | `prefix`      |
//! | `KEG_PARALLELISM` | `parallelism` |
//! | `FC`              | `fortran`     |
//!
//! ```toml
//! prefix = "/opt/keg"
//! parallelism = 4
//! fortran = "gfortran-13"
//! shell = "/bin/bash"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::execute::ExecuteConfig;
use crate::platform::paths::{PREFIX_ENV, config_dir, default_prefix};

pub const CONFIG_FILE: &str = "config.toml";
pub const PARALLELISM_ENV: &str = "KEG_PARALLELISM";
pub const FORTRAN_ENV: &str = "FC";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  /// Install prefix holding `Cellar`, `opt` and the shared directories.
  pub prefix: PathBuf,
  /// Maximum concurrent link jobs.
  pub parallelism: usize,
  /// Fortran driver; the compiler family's default when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fortran: Option<String>,
  /// Shell to run build steps through instead of spawning them directly.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub shell: Option<String>,
}

/// On-disk form; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
  prefix: Option<PathBuf>,
  parallelism: Option<usize>,
  fortran: Option<String>,
  shell: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid {var} value '{value}': expected a positive integer")]
  InvalidParallelism { var: String, value: String },
}

impl Default for Config {
  fn default() -> Self {
    Self {
      prefix: default_prefix(),
      parallelism: num_cpus(),
      fortran: None,
      shell: None,
    }
  }
}

impl Config {
  /// Default location of the config file.
  pub fn default_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
  }

  /// Load from the default location.
  pub fn load() -> Result<Self, ConfigError> {
    Self::load_from(&Self::default_path())
  }

  /// Load from `path`, which may not exist, then apply environment overrides.
  pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let mut config = Self::default();

    if path.exists() {
      debug!(path = ?path, "loading config");
      let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
      })?;
      let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
      })?;
      config.merge(file);
    }

    config.apply_env()?;
    Ok(config)
  }

  fn merge(&mut self, file: ConfigFile) {
    if let Some(prefix) = file.prefix {
      self.prefix = prefix;
    }
    if let Some(parallelism) = file.parallelism {
      self.parallelism = parallelism.max(1);
    }
    if file.fortran.is_some() {
      self.fortran = file.fortran;
    }
    if file.shell.is_some() {
      self.shell = file.shell;
    }
  }

  fn apply_env(&mut self) -> Result<(), ConfigError> {
    if let Some(prefix) = std::env::var_os(PREFIX_ENV).filter(|v| !v.is_empty()) {
      self.prefix = PathBuf::from(prefix);
    }
    if let Ok(value) = std::env::var(PARALLELISM_ENV) {
      self.parallelism = match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
          return Err(ConfigError::InvalidParallelism {
            var: PARALLELISM_ENV.to_string(),
            value,
          });
        }
      };
    }
    if let Ok(fortran) = std::env::var(FORTRAN_ENV)
      && !fortran.is_empty()
    {
      self.fortran = Some(fortran);
    }
    Ok(())
  }

  pub fn execute_config(&self) -> ExecuteConfig {
    ExecuteConfig {
      shell: self.shell.clone(),
    }
  }
}

/// Number of CPUs, the default link parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  const CLEAR: [(&str, Option<&str>); 3] = [(PREFIX_ENV, None), (PARALLELISM_ENV, None), (FORTRAN_ENV, None)];

  #[test]
  #[serial]
  fn missing_file_gives_defaults() {
    let temp = TempDir::new().unwrap();
    temp_env::with_vars(CLEAR, || {
      let config = Config::load_from(&temp.path().join("config.toml")).unwrap();
      assert!(config.parallelism >= 1);
      assert!(config.fortran.is_none());
      assert!(config.prefix.ends_with("prefix"));
    });
  }

  #[test]
  #[serial]
  fn reads_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "prefix = \"/opt/keg\"\nparallelism = 3\nfortran = \"gfortran-13\"\n").unwrap();

    temp_env::with_vars(CLEAR, || {
      let config = Config::load_from(&path).unwrap();
      assert_eq!(config.prefix, PathBuf::from("/opt/keg"));
      assert_eq!(config.parallelism, 3);
      assert_eq!(config.fortran.as_deref(), Some("gfortran-13"));
      assert!(config.execute_config().shell.is_none());
    });
  }

  #[test]
  #[serial]
  fn env_overrides_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "prefix = \"/opt/keg\"\nparallelism = 3\n").unwrap();

    temp_env::with_vars(
      [
        (PREFIX_ENV, Some("/tmp/other")),
        (PARALLELISM_ENV, Some("8")),
        (FORTRAN_ENV, Some("pgfortran")),
      ],
      || {
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.prefix, PathBuf::from("/tmp/other"));
        assert_eq!(config.parallelism, 8);
        assert_eq!(config.fortran.as_deref(), Some("pgfortran"));
      },
    );
  }

  #[test]
  #[serial]
  fn rejects_bad_values() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");

    temp_env::with_vars([(PARALLELISM_ENV, Some("zero"))], || {
      assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::InvalidParallelism { .. })
      ));
    });

    fs::write(&path, "prefixx = \"/opt/keg\"\n").unwrap();
    temp_env::with_vars(CLEAR, || {
      assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse { .. })));
    });
  }
}
