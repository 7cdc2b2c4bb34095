//! Implementation of the `keg install` command.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use super::load_pipeline;
use crate::OptionArgs;
use crate::output::{OutputFormat, format_elapsed, print_info, print_json, print_stat, print_success, print_warning};

pub fn cmd_install(
  formula: &str,
  options: &OptionArgs,
  build_dir: Option<PathBuf>,
  fetch: bool,
  output: OutputFormat,
) -> Result<()> {
  let pipeline = load_pipeline()?;
  let overrides = options.overrides()?;

  // Kept alive until the install finishes.
  let mut scratch: Option<TempDir> = None;
  let build_dir = match build_dir {
    Some(dir) if dir.exists() => {
      dunce::canonicalize(&dir).with_context(|| format!("Failed to resolve build directory: {}", dir.display()))?
    }
    Some(dir) if fetch => dir,
    Some(dir) => bail!("Build directory does not exist: {}", dir.display()),
    None if fetch => {
      let temp = tempfile::Builder::new()
        .prefix(&format!("keg-{}-", formula))
        .tempdir()
        .context("Failed to create build directory")?;
      let path = temp.path().to_path_buf();
      scratch = Some(temp);
      path
    }
    None => std::env::current_dir().context("Failed to read current directory")?,
  };

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(pipeline.install(formula, &overrides, &build_dir, fetch))?;
  let elapsed = started.elapsed();
  drop(scratch);

  let caveats = pipeline.caveats(formula, &overrides)?;

  if output.is_json() {
    return print_json(&serde_json::json!({
      "outcome": outcome,
      "caveats": caveats,
      "elapsed_ms": elapsed.as_millis() as u64,
    }));
  }

  for advisory in &outcome.advisories {
    print_warning(&advisory.to_string());
  }
  print_success(&format!("Installed {} in {}", formula, format_elapsed(elapsed)));
  print_stat("Keg", &outcome.layout.keg.display().to_string());
  print_stat("Order", &outcome.order.join(" -> "));
  if let Some(plan) = &outcome.plan {
    print_stat("Machine", &plan.machine.myarch());
  }
  if !outcome.linked.is_empty() {
    print_stat("Shared libraries", &outcome.linked.len().to_string());
  }
  print_stat("Links", &outcome.layout.links().count().to_string());
  if let Some(script) = &outcome.layout.env_script {
    print_stat("Environment", &script.display().to_string());
  }

  if let Some(text) = caveats {
    println!();
    print_info("Caveats:");
    print!("{}", text);
  }
  Ok(())
}
