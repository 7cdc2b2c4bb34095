mod caveats;
mod deps;
mod info;
mod install;
mod options;
mod plan;
mod test;

pub use caveats::cmd_caveats;
pub use deps::cmd_deps;
pub use info::cmd_info;
pub use install::cmd_install;
pub use options::cmd_options;
pub use plan::cmd_plan;
pub use test::cmd_test;

use anyhow::{Context, Result};
use tracing::debug;

use keg_lib::config::Config;
use keg_lib::execute::ProcessExecutor;
use keg_lib::formula::Registry;
use keg_lib::pipeline::Pipeline;

/// Load the configuration and wire the built-in formulas to real processes.
fn load_pipeline() -> Result<Pipeline<ProcessExecutor>> {
  let config = Config::load().context("Failed to load configuration")?;
  debug!(prefix = ?config.prefix, parallelism = config.parallelism, "loaded configuration");
  let executor = ProcessExecutor::new(&config.execute_config());
  Pipeline::new(Registry::builtin(), config, executor).context("Invalid formula registry")
}
