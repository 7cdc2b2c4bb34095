//! Formula declarations and the built-in registry.
//!
//! A formula is static data: its options, dependency edges and, for
//! buildable formulas, the recipe that drives the upstream installer.

pub mod builtin;
pub mod types;

use std::path::Path;

use crate::graph::{DependencyGraph, GraphError};
use crate::options::{ResolvedOptions, validate_specs};
use crate::platform::CompilerFamily;

pub use types::{
  DataArchive, EnvBinding, EnvScript, FetchStrategy, Formula, FormulaKind, HeadSource, InstallerRecipe, MatlabEnv,
  Patch, RegistryError, Selector, SharedDir, VerificationSpec,
};

impl Formula {
  pub fn recipe(&self) -> Option<&InstallerRecipe> {
    match &self.kind {
      FormulaKind::Installer(recipe) => Some(recipe),
      _ => None,
    }
  }

  /// Toolchain selected by the resolved options.
  pub fn compiler_family(&self, resolved: &ResolvedOptions) -> CompilerFamily {
    let pgi = self
      .recipe()
      .and_then(|r| r.pgi_option.as_deref())
      .is_some_and(|option| resolved.enabled(option));
    if pgi { CompilerFamily::Pgi } else { CompilerFamily::Gnu }
  }

  /// Post-install instructions for the user, if any.
  ///
  /// `keg` is the installed keg directory and `doc` the formula's shared doc
  /// directory.
  pub fn caveats(&self, keg: &Path, doc: &Path, resolved: &ResolvedOptions) -> Option<String> {
    match &self.kind {
      FormulaKind::DataArchive(archive) => Some(format!(
        "In your ~/.bashrc, add the line\n. {}\n",
        keg.join(&archive.script).display()
      )),
      FormulaKind::Installer(recipe) => {
        let mut text = format!(
          "In your ~/.bashrc, add\n. {}\n",
          keg.join(&recipe.env_script.file).display()
        );
        if let Some(matlab) = &recipe.env_script.matlab
          && resolved.enabled(&matlab.option)
        {
          text.push_str(&format!(
            "export MYMATLAB=/path/to/your/matlab\n\nPlease also look at\n  {}\nto set up your ~/.mexopts.sh.\n",
            doc.join(&matlab.readme).display()
          ));
        }
        Some(text)
      }
      FormulaKind::External | FormulaKind::Libexec => None,
    }
  }
}

/// The set of formulas keg knows about, in declaration order.
#[derive(Debug, Clone)]
pub struct Registry {
  formulas: Vec<Formula>,
}

impl Registry {
  pub fn new(formulas: Vec<Formula>) -> Self {
    Self { formulas }
  }

  pub fn builtin() -> Self {
    Self::new(builtin::all())
  }

  pub fn get(&self, name: &str) -> Result<&Formula, GraphError> {
    self
      .formulas
      .iter()
      .find(|f| f.name == name)
      .ok_or_else(|| GraphError::UnknownFormula(name.to_string()))
  }

  pub fn iter(&self) -> impl Iterator<Item = &Formula> {
    self.formulas.iter()
  }

  pub fn graph(&self) -> Result<DependencyGraph, GraphError> {
    DependencyGraph::from_declarations(
      self
        .formulas
        .iter()
        .map(|f| (f.name.as_str(), f.dependencies.as_slice())),
    )
  }

  /// Validate every declaration: option specs, installer tables against
  /// declared platforms, and dependency names. Run once at startup.
  pub fn validate(&self) -> Result<(), RegistryError> {
    for formula in &self.formulas {
      validate_specs(&formula.options).map_err(|source| RegistryError::Options {
        formula: formula.name.clone(),
        source,
      })?;

      if let Some(recipe) = formula.recipe() {
        let declared: Vec<&str> = formula.options.iter().map(|o| o.name.as_str()).collect();
        recipe
          .table
          .validate(&recipe.supported, &declared)
          .map_err(|source| RegistryError::Table {
            formula: formula.name.clone(),
            source,
          })?;
      }
    }

    self.graph()?;
    Ok(())
  }
}
