//! Production executor backed by `tokio::process`.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::plan::Invocation;

use super::Executor;
use super::types::{BuildEnv, ExecuteConfig, ExecuteError, ProcessOutput};

/// Spawns real processes.
///
/// Children inherit keg's environment with the plan's [`BuildEnv`] layered on
/// top, since the upstream installer needs the user's compilers on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
  shell: Option<String>,
}

impl ProcessExecutor {
  pub fn new(config: &ExecuteConfig) -> Self {
    Self {
      shell: config.shell.clone(),
    }
  }
}

impl Executor for ProcessExecutor {
  async fn run(&self, invocation: &Invocation, cwd: &Path, env: &BuildEnv) -> Result<ProcessOutput, ExecuteError> {
    info!(cmd = %invocation.display(), "executing command");

    let working_dir = match &invocation.cwd {
      Some(sub) => cwd.join(sub),
      None => cwd.to_path_buf(),
    };

    let mut command = match &self.shell {
      Some(shell) => {
        let (shell_cmd, shell_args) = shell_command(shell);
        let mut command = Command::new(shell_cmd);
        command.args(shell_args).arg(shell_line(invocation));
        command
      }
      None => {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        command
      }
    };

    command
      .current_dir(&working_dir)
      .envs(env)
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    match &invocation.stdin {
      Some(path) => {
        let path = working_dir.join(path);
        let file = std::fs::File::open(&path).map_err(|source| ExecuteError::Stdin { path, source })?;
        command.stdin(Stdio::from(file));
      }
      None => {
        command.stdin(Stdio::null());
      }
    }

    debug!(working_dir = ?working_dir, "spawning process");

    let output = command.output().await.map_err(|source| ExecuteError::Spawn {
      program: invocation.program.clone(),
      source,
    })?;

    let output = ProcessOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !output.success() {
      if !output.stderr.is_empty() {
        debug!(stderr = %output.stderr, "command stderr");
      }
      if !output.stdout.is_empty() {
        debug!(stdout = %output.stdout, "command stdout");
      }
    }

    Ok(output)
  }
}

/// Shell binary and the flag that passes it a command string.
fn shell_command(shell: &str) -> (String, Vec<String>) {
  let args = if shell.contains("powershell") || shell.contains("pwsh") {
    vec!["-NoProfile".to_string(), "-Command".to_string()]
  } else if shell.contains("cmd") {
    vec!["/C".to_string()]
  } else {
    vec!["-c".to_string()]
  };
  (shell.to_string(), args)
}

/// Render an invocation as one POSIX shell command line.
fn shell_line(invocation: &Invocation) -> String {
  std::iter::once(invocation.program.as_str())
    .chain(invocation.args.iter().map(String::as_str))
    .map(quote)
    .collect::<Vec<_>>()
    .join(" ")
}

fn quote(word: &str) -> String {
  let plain = !word.is_empty()
    && word
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ',' | '=' | ':'));
  if plain {
    word.to_string()
  } else {
    format!("'{}'", word.replace('\'', r"'\''"))
  }
}
