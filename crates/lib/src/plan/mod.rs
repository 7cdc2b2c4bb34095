//! Build plan generation.
//!
//! [`plan`] turns a formula, its resolved options and the host's platform
//! facts into an ordered list of [`Step`]s. Nothing runs here; the plan is
//! handed to an executor afterwards.

pub mod table;
pub mod types;

use std::path::PathBuf;

use tracing::debug;

use crate::formula::{FetchStrategy, Formula};
use crate::options::ResolvedOptions;
use crate::platform::PlatformFacts;
use crate::variant::derive_variants;

pub use table::{InstallerProfile, InstallerTable, MachineTriple, MenuLine, TableKey};
pub use types::{BuildPlan, Invocation, PlanError, PlanInputs, Step};

/// Scratch directory, relative to the build directory, for files keg writes
/// before the installer runs.
pub const SCRATCH_DIR: &str = ".keg";

/// Check out the formula's head sources into the working directory.
pub fn fetch_invocation(formula: &Formula) -> Result<Invocation, PlanError> {
  let head = formula
    .head
    .as_ref()
    .ok_or_else(|| PlanError::NoHeadSource(formula.name.clone()))?;
  let mut checkout = Invocation::new("svn").arg("checkout");
  match head.strategy {
    FetchStrategy::Subversion { anonymous } => {
      if anonymous {
        checkout = checkout.args(["--username", "anonymous"]);
      }
    }
  }
  Ok(checkout.args([head.url.as_str(), "."]))
}

/// Generate the build plan for `formula`.
///
/// Platform-specific installer answers come from the formula's installer
/// table. Every binding the installer reads must be present in
/// `inputs.dependency_paths`.
pub fn plan(
  formula: &Formula,
  resolved: &ResolvedOptions,
  platform: &PlatformFacts,
  inputs: &PlanInputs,
) -> Result<BuildPlan, PlanError> {
  let recipe = formula
    .recipe()
    .ok_or_else(|| PlanError::NotBuildable(formula.name.clone()))?;

  let profile = recipe.table.lookup(platform)?;
  let variants = derive_variants(resolved, recipe.single_option.as_deref(), platform.compiler);
  let installer_input = profile.render_input(resolved);

  let mut steps = Vec::new();

  if inputs.fetch {
    steps.push(Step::Run(fetch_invocation(formula)?));
  }

  for patch in &recipe.patches {
    let path = PathBuf::from(SCRATCH_DIR).join("patches").join(format!("{}.diff", patch.name));
    steps.push(Step::WriteFile {
      path: path.clone(),
      contents: patch.diff.clone(),
    });
    steps.push(Step::Run(Invocation::new("patch").arg("-p1").stdin(path)));
  }

  if recipe.deparallelize {
    steps.push(Step::SetEnv {
      key: "MAKEFLAGS".to_string(),
      value: "-j1".to_string(),
    });
  }

  for binding in &recipe.bindings {
    let path = inputs
      .dependency_paths
      .get(&binding.formula)
      .ok_or_else(|| PlanError::MissingBinding {
        var: binding.var.clone(),
        formula: binding.formula.clone(),
      })?;
    steps.push(Step::SetEnv {
      key: binding.var.clone(),
      value: path.display().to_string(),
    });
  }

  let fortran = inputs
    .fortran
    .clone()
    .unwrap_or_else(|| platform.compiler.default_fortran().to_string());
  steps.push(Step::SetEnv {
    key: "FC".to_string(),
    value: fortran,
  });

  steps.push(Step::WriteFile {
    path: PathBuf::from(&recipe.input_file),
    contents: installer_input.clone(),
  });
  steps.push(Step::Run(Invocation::new(&recipe.program).stdin(&recipe.input_file)));

  debug!(
    formula = %formula.name,
    platform = %platform,
    machine = %profile.machine,
    steps = steps.len(),
    "generated build plan"
  );

  Ok(BuildPlan {
    formula: formula.name.clone(),
    platform: *platform,
    machine: profile.machine.clone(),
    variants,
    installer_input,
    steps,
  })
}
