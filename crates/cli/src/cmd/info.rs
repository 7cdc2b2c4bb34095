use anyhow::Result;
use serde::Serialize;

use keg_lib::config::Config;
use keg_lib::platform::platform_triple;

use super::load_pipeline;
use crate::output::{OutputFormat, print_json, print_stat};

#[derive(Serialize)]
struct InfoOutput {
  platform: Option<String>,
  config_file: String,
  prefix: String,
  parallelism: usize,
  fortran: Option<String>,
  formulas: Vec<FormulaStatus>,
}

#[derive(Serialize)]
struct FormulaStatus {
  name: String,
  installed: bool,
}

pub fn cmd_info(output: OutputFormat) -> Result<()> {
  let pipeline = load_pipeline()?;
  let config = pipeline.config();
  let prefix = pipeline.prefix();

  let info = InfoOutput {
    platform: platform_triple(),
    config_file: Config::default_path().display().to_string(),
    prefix: config.prefix.display().to_string(),
    parallelism: config.parallelism,
    fortran: config.fortran.clone(),
    formulas: pipeline
      .registry()
      .iter()
      .map(|f| FormulaStatus {
        name: f.name.clone(),
        installed: prefix.keg(&f.name).is_installed(),
      })
      .collect(),
  };

  if output.is_json() {
    return print_json(&info);
  }

  println!("System:");
  match &info.platform {
    Some(triple) => print_stat("Platform", triple),
    None => print_stat("Platform", "unknown"),
  }
  print_stat("Config", &info.config_file);
  print_stat("Prefix", &info.prefix);
  print_stat("Parallelism", &info.parallelism.to_string());
  print_stat("Fortran", info.fortran.as_deref().unwrap_or("(compiler default)"));
  println!();
  println!("Formulas:");
  for formula in &info.formulas {
    let state = if formula.installed { "installed" } else { "not installed" };
    print_stat(&formula.name, state);
  }
  Ok(())
}
