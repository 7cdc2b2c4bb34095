use anyhow::Result;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use keg_lib::formula::FormulaKind;
use keg_lib::options::Advisory;

use super::load_pipeline;
use crate::OptionArgs;
use crate::output::{OutputFormat, print_json, print_warning, symbols};

#[derive(Serialize)]
struct DepsOutput {
  formula: String,
  order: Vec<String>,
  advisories: Vec<Advisory>,
}

pub fn cmd_deps(formula: &str, options: &OptionArgs, output: OutputFormat) -> Result<()> {
  let pipeline = load_pipeline()?;
  let overrides = options.overrides()?;
  let (_, resolved) = pipeline.resolve(formula, &overrides)?;
  let order = pipeline.order(formula, &resolved)?;

  if output.is_json() {
    return print_json(&DepsOutput {
      formula: formula.to_string(),
      order,
      advisories: resolved.advisories,
    });
  }

  for advisory in resolved.warnings() {
    print_warning(&advisory.to_string());
  }

  let prefix = pipeline.prefix();
  for name in &order {
    let dependency = pipeline.registry().get(name)?;
    let state = match dependency.kind {
      FormulaKind::External => "system",
      _ if prefix.keg(name).is_installed() => "installed",
      _ => "missing",
    };
    println!(
      "{} {} {}",
      symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.cyan()),
      name,
      format!("({})", state).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
  Ok(())
}
