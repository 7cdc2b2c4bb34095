//! Plan execution.
//!
//! Plans are run step by step against an [`Executor`]. Production code uses
//! [`ProcessExecutor`]; tests inject a recording executor so no upstream tool
//! ever runs.

pub mod process;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::path::Path;

use tracing::{debug, error, info};

use crate::plan::{BuildPlan, Invocation, Step};

pub use process::ProcessExecutor;
pub use types::{BuildEnv, ExecuteConfig, ExecuteError, ProcessOutput};

/// Runs a single invocation.
///
/// Implementations return the captured output for any exit status; only a
/// failure to start the process is an error.
pub trait Executor: Send + Sync + 'static {
  /// Run `invocation` in `cwd` (joined with the invocation's own `cwd`) with
  /// `env` layered over the inherited environment.
  fn run(
    &self,
    invocation: &Invocation,
    cwd: &Path,
    env: &BuildEnv,
  ) -> impl Future<Output = Result<ProcessOutput, ExecuteError>> + Send;
}

/// Execute a build plan in `workdir`.
///
/// The plan is consumed. Steps run in order; `SetEnv` bindings apply to every
/// later `Run`. The first failing `Run` aborts the plan with
/// [`ExecuteError::UpstreamInstallFailure`]. Nothing is rolled back.
///
/// Returns the environment the plan bound.
pub async fn execute_plan<E: Executor>(plan: BuildPlan, workdir: &Path, executor: &E) -> Result<BuildEnv, ExecuteError> {
  info!(formula = %plan.formula, steps = plan.steps.len(), "executing build plan");

  let mut env = BuildEnv::new();

  for (index, step) in plan.steps.into_iter().enumerate() {
    match step {
      Step::SetEnv { key, value } => {
        debug!(step = index, key = %key, value = %value, "binding environment");
        env.insert(key, value);
      }
      Step::WriteFile { path, contents } => {
        let path = workdir.join(path);
        debug!(step = index, path = ?path, "writing file");
        if let Some(parent) = path.parent() {
          tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
      }
      Step::Run(invocation) => {
        debug!(step = index, cmd = %invocation.display(), "running step");
        let output = executor.run(&invocation, workdir, &env).await?;
        if !output.success() {
          error!(cmd = %invocation.display(), code = ?output.code, "build step failed");
          return Err(ExecuteError::UpstreamInstallFailure {
            command: invocation.display(),
            code: output.code,
            output: output.combined(),
          });
        }
      }
    }
  }

  info!(formula = %plan.formula, "build plan complete");
  Ok(env)
}
