//! Recording executor for tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::plan::Invocation;

use super::Executor;
use super::types::{BuildEnv, ExecuteError, ProcessOutput};

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
  pub invocation: Invocation,
  pub cwd: PathBuf,
  pub env: BuildEnv,
}

struct Failure {
  needle: String,
  code: i32,
  output: String,
}

/// Records every invocation and succeeds unless a failure rule matches the
/// invocation's rendered command line.
#[derive(Default)]
pub(crate) struct RecordingExecutor {
  calls: Mutex<Vec<Recorded>>,
  failures: Vec<Failure>,
  latency: Option<Duration>,
  in_flight: AtomicUsize,
  peak: AtomicUsize,
}

impl RecordingExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fail invocations containing `needle` with `code`, emitting `output` on
  /// stdout.
  pub fn failing(mut self, needle: &str, code: i32, output: &str) -> Self {
    self.failures.push(Failure {
      needle: needle.to_string(),
      code,
      output: output.to_string(),
    });
    self
  }

  /// Hold every invocation open for `latency` so overlapping runs show up in
  /// [`RecordingExecutor::peak`].
  pub fn slow(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  /// Most invocations ever running at the same time.
  pub fn peak(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }

  pub fn calls(&self) -> Vec<Recorded> {
    self.calls.lock().unwrap().clone()
  }
}

impl Executor for RecordingExecutor {
  async fn run(&self, invocation: &Invocation, cwd: &Path, env: &BuildEnv) -> Result<ProcessOutput, ExecuteError> {
    self.calls.lock().unwrap().push(Recorded {
      invocation: invocation.clone(),
      cwd: cwd.to_path_buf(),
      env: env.clone(),
    });

    let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(running, Ordering::SeqCst);
    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    let line = invocation.display();
    if let Some(failure) = self.failures.iter().find(|f| line.contains(&f.needle)) {
      return Ok(ProcessOutput {
        code: Some(failure.code),
        stdout: failure.output.clone(),
        stderr: String::new(),
      });
    }

    Ok(ProcessOutput {
      code: Some(0),
      stdout: String::new(),
      stderr: String::new(),
    })
  }
}
