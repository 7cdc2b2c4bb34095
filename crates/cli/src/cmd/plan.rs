//! Implementation of the `keg plan` command.
//!
//! Prints the build plan for a formula on this host. Nothing runs and the
//! prefix is left untouched.

use anyhow::{Context, Result};
use serde::Serialize;

use keg_lib::plan::{BuildPlan, Step};

use super::load_pipeline;
use crate::OptionArgs;
use crate::output::{OutputFormat, print_json, print_stat, truncate_hash};

#[derive(Serialize)]
struct PlanOutput<'a> {
  fingerprint: String,
  #[serde(flatten)]
  plan: &'a BuildPlan,
}

pub fn cmd_plan(formula: &str, options: &OptionArgs, fetch: bool, output: OutputFormat) -> Result<()> {
  let pipeline = load_pipeline()?;
  let plan = pipeline.plan(formula, &options.overrides()?, fetch)?;
  let fingerprint = plan.fingerprint().context("Failed to fingerprint plan")?;

  if output.is_json() {
    return print_json(&PlanOutput {
      fingerprint,
      plan: &plan,
    });
  }

  println!("Plan: {}", truncate_hash(&fingerprint));
  print_stat("Formula", &plan.formula);
  print_stat("Platform", &plan.platform.to_string());
  print_stat("Machine", &plan.machine.myarch());
  let variants: Vec<String> = plan.variants.iter().map(ToString::to_string).collect();
  print_stat("Variants", &variants.join(", "));

  println!();
  println!("Steps:");
  for (index, step) in plan.steps.iter().enumerate() {
    println!("  {:>2}. {}", index + 1, describe(step));
  }

  println!();
  println!("Installer input:");
  for line in plan.installer_input.lines() {
    println!("  {}", line);
  }
  Ok(())
}

fn describe(step: &Step) -> String {
  match step {
    Step::SetEnv { key, value } => format!("set {}={}", key, value),
    Step::WriteFile { path, contents } => format!("write {} ({} bytes)", path.display(), contents.len()),
    Step::Run(invocation) => format!("run {}", invocation.display()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use keg_lib::plan::Invocation;

  #[test]
  fn describe_steps() {
    let env = Step::SetEnv {
      key: "FC".to_string(),
      value: "gfortran".to_string(),
    };
    assert_eq!(describe(&env), "set FC=gfortran");

    let write = Step::WriteFile {
      path: "install.input".into(),
      contents: "2\n".to_string(),
    };
    assert_eq!(describe(&write), "write install.input (2 bytes)");

    let run = Step::Run(Invocation::new("./install_cutest").stdin("install.input"));
    assert_eq!(describe(&run), "run ./install_cutest < install.input");
  }
}
