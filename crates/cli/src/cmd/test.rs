//! Implementation of the `keg test` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use tempfile::TempDir;

use super::load_pipeline;
use crate::output::{OutputFormat, print_json, print_stat, symbols};

pub fn cmd_test(formula: &str, workdir: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let pipeline = load_pipeline()?;

  // Kept alive until the runner finishes.
  let mut scratch: Option<TempDir> = None;
  let workdir = match workdir {
    Some(dir) => {
      std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
      dir
    }
    None => {
      let temp = TempDir::new().context("Failed to create working directory")?;
      let path = temp.path().to_path_buf();
      scratch = Some(temp);
      path
    }
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(pipeline.verify(formula, &workdir))?;
  drop(scratch);

  if output.is_json() {
    print_json(&report)?;
  } else {
    println!("Testing {} ({})", report.formula, report.machine);
    for outcome in &report.outcomes {
      if outcome.passed {
        println!(
          "  {} {}",
          symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
          outcome.fixture
        );
      } else {
        println!(
          "  {} {}",
          symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
          outcome.fixture
        );
        for line in outcome.output.lines() {
          println!("      {}", line);
        }
      }
    }
    print_stat("Passed", &format!("{}/{}", report.passed(), report.outcomes.len()));
  }

  report.ensure_success()?;
  Ok(())
}
