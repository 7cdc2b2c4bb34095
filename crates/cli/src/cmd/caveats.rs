use anyhow::Result;
use serde::Serialize;

use super::load_pipeline;
use crate::OptionArgs;
use crate::output::{OutputFormat, print_info, print_json};

#[derive(Serialize)]
struct CaveatsOutput {
  formula: String,
  caveats: Option<String>,
}

pub fn cmd_caveats(formula: &str, options: &OptionArgs, output: OutputFormat) -> Result<()> {
  let pipeline = load_pipeline()?;
  let caveats = pipeline.caveats(formula, &options.overrides()?)?;

  if output.is_json() {
    return print_json(&CaveatsOutput {
      formula: formula.to_string(),
      caveats,
    });
  }

  match caveats {
    Some(text) => print!("{}", text),
    None => print_info(&format!("{} has no caveats", formula)),
  }
  Ok(())
}
