//! The end-to-end install and verify phases.
//!
//! Stages run strictly in order: options, dependency order, build plan,
//! execution, linking, installation. Resolution and planning errors surface
//! before any process runs. A failing stage stops the pipeline; nothing is
//! rolled back and a re-run overwrites.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::execute::{BuildEnv, ExecuteError, Executor, execute_plan};
use crate::formula::{Formula, FormulaKind, Registry, RegistryError};
use crate::graph::{DependencyGraph, GraphError};
use crate::install::{InstallError, InstalledLayout, install};
use crate::link::{LinkError, LinkJob, link_variants};
use crate::options::{Advisory, Overrides, ResolveError, ResolvedOptions, resolve};
use crate::plan::{BuildPlan, PlanError, PlanInputs, fetch_invocation, plan};
use crate::platform::arch::WordSize;
use crate::platform::os::Os;
use crate::platform::{Platform, PlatformFacts};
use crate::prefix::{Keg, Prefix};
use crate::prefix_lock::{LockMode, PrefixLock, PrefixLockError};
use crate::verify::{VerificationReport, VerifyError, verify};

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Plan(#[from] PlanError),

  #[error(transparent)]
  Execute(#[from] ExecuteError),

  #[error("linking failed: {}", summarize(.0))]
  Link(Vec<LinkError>),

  #[error(transparent)]
  Install(#[from] InstallError),

  #[error(transparent)]
  Verify(#[from] VerifyError),

  #[error(transparent)]
  Lock(#[from] PrefixLockError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("dependency {dependency} of {formula} is not installed")]
  DependencyNotInstalled { formula: String, dependency: String },

  #[error("cannot determine the host platform")]
  UnknownHost,
}

fn summarize(errors: &[LinkError]) -> String {
  errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Result of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
  /// Dependency order, ending with the installed formula.
  pub order: Vec<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub advisories: Vec<Advisory>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub plan: Option<BuildPlan>,
  /// Shared objects produced by the link stage.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub linked: Vec<PathBuf>,
  pub layout: InstalledLayout,
}

/// Wires the registry, configuration and an executor together.
pub struct Pipeline<E: Executor> {
  registry: Registry,
  graph: DependencyGraph,
  config: Config,
  executor: Arc<E>,
  host: Option<(Os, WordSize)>,
}

impl<E: Executor> Pipeline<E> {
  /// Validates the registry up front.
  pub fn new(registry: Registry, config: Config, executor: E) -> Result<Self, PipelineError> {
    registry.validate()?;
    let graph = registry.graph()?;
    let host = Platform::current().map(|p| (p.os, p.arch.word_size()));
    Ok(Self {
      registry,
      graph,
      config,
      executor: Arc::new(executor),
      host,
    })
  }

  /// Pretend to run on another host.
  pub fn with_host(mut self, os: Os, word_size: WordSize) -> Self {
    self.host = Some((os, word_size));
    self
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn prefix(&self) -> Prefix {
    Prefix::new(&self.config.prefix)
  }

  pub fn resolve(&self, name: &str, overrides: &Overrides) -> Result<(&Formula, ResolvedOptions), PipelineError> {
    let formula = self.registry.get(name)?;
    let resolved = resolve(&formula.options, overrides)?;
    for advisory in resolved.warnings() {
      warn!(formula = %name, "{}", advisory);
    }
    Ok((formula, resolved))
  }

  pub fn order(&self, name: &str, resolved: &ResolvedOptions) -> Result<Vec<String>, PipelineError> {
    Ok(self.graph.order(name, resolved)?)
  }

  /// Platform facts for building `formula` on this host.
  pub fn platform(&self, formula: &Formula, resolved: &ResolvedOptions) -> Result<PlatformFacts, PipelineError> {
    let (os, word_size) = self.host.ok_or(PipelineError::UnknownHost)?;
    Ok(PlatformFacts::new(os, word_size, formula.compiler_family(resolved)))
  }

  /// Installed locations of `formula`'s direct, active dependencies.
  pub fn dependency_paths(&self, formula: &Formula, resolved: &ResolvedOptions) -> BTreeMap<String, PathBuf> {
    let prefix = self.prefix();
    let mut paths = BTreeMap::new();
    for edge in self.graph.active_dependencies(&formula.name, resolved) {
      let Ok(dependency) = self.registry.get(&edge.formula) else {
        continue;
      };
      let keg = prefix.keg(&dependency.name);
      if let Some(path) = installed_path(dependency, &keg) {
        paths.insert(dependency.name.clone(), path);
      }
    }
    paths
  }

  /// Generate the build plan without running anything.
  pub fn plan(&self, name: &str, overrides: &Overrides, fetch: bool) -> Result<BuildPlan, PipelineError> {
    let (formula, resolved) = self.resolve(name, overrides)?;
    self.order(name, &resolved)?;
    let platform = self.platform(formula, &resolved)?;
    Ok(plan(formula, &resolved, &platform, &self.plan_inputs(formula, &resolved, fetch))?)
  }

  fn plan_inputs(&self, formula: &Formula, resolved: &ResolvedOptions, fetch: bool) -> PlanInputs {
    PlanInputs {
      dependency_paths: self.dependency_paths(formula, resolved),
      fortran: self.config.fortran.clone(),
      fetch,
    }
  }

  /// Build `name` in `build_dir` and install it into the prefix.
  ///
  /// Dependencies must already be installed. With `fetch`, sources are
  /// checked out into `build_dir` first.
  pub async fn install(
    &self,
    name: &str,
    overrides: &Overrides,
    build_dir: &Path,
    fetch: bool,
  ) -> Result<InstallOutcome, PipelineError> {
    let (formula, resolved) = self.resolve(name, overrides)?;
    let order = self.order(name, &resolved)?;
    info!(formula = %name, order = ?order, "resolved dependency order");

    let prefix = self.prefix();
    for dependency in order.iter().filter(|d| d.as_str() != name) {
      let dependency = self.registry.get(dependency)?;
      if matches!(dependency.kind, FormulaKind::External) {
        debug!(dependency = %dependency.name, "provided by the system");
        continue;
      }
      if !prefix.keg(&dependency.name).is_installed() {
        return Err(PipelineError::DependencyNotInstalled {
          formula: name.to_string(),
          dependency: dependency.name.clone(),
        });
      }
    }

    let built = match formula.recipe() {
      Some(recipe) => {
        let platform = self.platform(formula, &resolved)?;
        let plan = plan(formula, &resolved, &platform, &self.plan_inputs(formula, &resolved, fetch))?;
        Some((recipe.objects_dir.clone(), plan))
      }
      None => None,
    };

    let command = format!("keg install {}", name);
    let _lock = PrefixLock::acquire(prefix.root(), LockMode::Exclusive, &command)?;
    tokio::fs::create_dir_all(build_dir).await.map_err(ExecuteError::from)?;

    let mut linked = Vec::new();
    let plan = match built {
      Some((objects_dir, plan)) => {
        let env = execute_plan(plan.clone(), build_dir, self.executor.as_ref()).await?;
        linked = self.link(&plan, &objects_dir, build_dir, env).await?;
        Some(plan)
      }
      None => {
        if fetch {
          self.fetch(formula, build_dir).await?;
        }
        None
      }
    };

    let layout = install(formula, &resolved, build_dir, &prefix, plan.as_ref())?;

    Ok(InstallOutcome {
      order,
      advisories: resolved.advisories,
      plan,
      linked,
      layout,
    })
  }

  async fn fetch(&self, formula: &Formula, build_dir: &Path) -> Result<(), PipelineError> {
    let invocation = fetch_invocation(formula)?;
    let output = self.executor.run(&invocation, build_dir, &BuildEnv::new()).await?;
    if !output.success() {
      return Err(
        ExecuteError::UpstreamInstallFailure {
          command: invocation.display(),
          code: output.code,
          output: output.combined(),
        }
        .into(),
      );
    }
    Ok(())
  }

  async fn link(
    &self,
    plan: &BuildPlan,
    objects_dir: &str,
    build_dir: &Path,
    env: BuildEnv,
  ) -> Result<Vec<PathBuf>, PipelineError> {
    let fortran = env
      .get("FC")
      .cloned()
      .unwrap_or_else(|| plan.platform.compiler.default_fortran().to_string());
    let job = LinkJob {
      object_dir: build_dir.join(objects_dir).join(plan.machine.myarch()),
      fortran,
      env,
      parallelism: self.config.parallelism,
    };

    let report = link_variants(&plan.variants, &job, &plan.platform, self.executor.clone()).await;
    if !report.is_success() {
      return Err(PipelineError::Link(report.failures.into_values().collect()));
    }
    Ok(report.artifacts().cloned().collect())
  }

  /// Run the installed formula's verification fixtures.
  ///
  /// A report with failing fixtures is still `Ok`; callers decide how to
  /// surface it.
  pub async fn verify(&self, name: &str, workdir: &Path) -> Result<VerificationReport, PipelineError> {
    let (formula, resolved) = self.resolve(name, &Overrides::new())?;
    let prefix = self.prefix();
    let keg = prefix.keg(name);
    if !keg.is_installed() {
      return Err(VerifyError::NotInstalled(name.to_string()).into());
    }

    let command = format!("keg test {}", name);
    let _lock = PrefixLock::acquire(prefix.root(), LockMode::Shared, &command)?;

    let deps = self.dependency_paths(formula, &resolved);
    Ok(verify(formula, &keg, &deps, workdir, self.executor.as_ref()).await?)
  }

  /// Post-install instructions for `name`.
  pub fn caveats(&self, name: &str, overrides: &Overrides) -> Result<Option<String>, PipelineError> {
    let (formula, resolved) = self.resolve(name, overrides)?;
    let prefix = self.prefix();
    Ok(formula.caveats(&prefix.keg(name).path, &prefix.doc(name), &resolved))
  }
}

/// Where dependents find an installed formula: `libexec` for tool trees, the
/// keg itself for data archives. `None` when not installed or external.
fn installed_path(formula: &Formula, keg: &Keg) -> Option<PathBuf> {
  if !keg.is_installed() {
    return None;
  }
  match formula.kind {
    FormulaKind::External => None,
    FormulaKind::DataArchive(_) => Some(keg.opt.clone()),
    FormulaKind::Libexec | FormulaKind::Installer(_) => Some(keg.opt_libexec()),
  }
}
