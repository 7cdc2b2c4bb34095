use anyhow::Result;

use keg_lib::options::OptionKind;

use super::load_pipeline;
use crate::output::{OutputFormat, print_info, print_json};

pub fn cmd_options(formula: &str, output: OutputFormat) -> Result<()> {
  let pipeline = load_pipeline()?;
  let formula = pipeline.registry().get(formula)?;

  if output.is_json() {
    return print_json(&formula.options);
  }

  if formula.options.is_empty() {
    print_info(&format!("{} has no options", formula.name));
    return Ok(());
  }

  for spec in &formula.options {
    match &spec.kind {
      OptionKind::Boolean => println!("--{}", spec.name),
      OptionKind::Enum { choices } => println!("--option {}=<{}>", spec.name, choices.join("|")),
    }
    println!("\t{}", spec.description);
    if !spec.exclusive_with.is_empty() {
      println!("\tconflicts with: {}", spec.exclusive_with.join(", "));
    }
    if let Some(requires) = &spec.requires {
      println!("\trequires: {}", requires);
    }
  }
  Ok(())
}
