mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keg_lib::options::{OptionValue, Overrides};

use crate::output::{OutputFormat, print_error};

/// keg - build and install the CUTEst optimization toolchain
#[derive(Parser)]
#[command(name = "keg")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

/// Option selection shared by every command that resolves a formula.
#[derive(Args, Debug, Default, Clone)]
pub struct OptionArgs {
  /// Enable Matlab support
  #[arg(long)]
  with_matlab: bool,

  /// Also build single precision
  #[arg(long)]
  with_single: bool,

  /// Build with the Portland Group compilers
  #[arg(long)]
  with_pgi: bool,

  /// Enable a declared option (e.g. --with matlab)
  #[arg(long = "with", value_name = "OPTION")]
  with: Vec<String>,

  /// Disable a declared option
  #[arg(long = "without", value_name = "OPTION")]
  without: Vec<String>,

  /// Set an option value (name=value)
  #[arg(long = "option", value_name = "NAME=VALUE")]
  option: Vec<String>,
}

impl OptionArgs {
  pub fn overrides(&self) -> Result<Overrides> {
    let mut overrides = Overrides::new();
    for (flag, name) in [
      (self.with_matlab, "with-matlab"),
      (self.with_single, "with-single"),
      (self.with_pgi, "with-pgi"),
    ] {
      if flag {
        overrides.insert(name.to_string(), OptionValue::Bool(true));
      }
    }
    for name in &self.with {
      overrides.insert(option_name(name), OptionValue::Bool(true));
    }
    for name in &self.without {
      overrides.insert(option_name(name), OptionValue::Bool(false));
    }
    for pair in &self.option {
      let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{}'", pair))?;
      overrides.insert(name.trim().to_string(), OptionValue::raw(value.trim()));
    }
    Ok(overrides)
  }
}

fn option_name(name: &str) -> String {
  if name.starts_with("with-") {
    name.to_string()
  } else {
    format!("with-{}", name)
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Show host and configuration details
  Info,

  /// List the options a formula declares
  Options {
    /// Formula name
    formula: String,
  },

  /// Show the dependency order for a formula
  Deps {
    /// Formula name
    formula: String,

    #[command(flatten)]
    options: OptionArgs,
  },

  /// Show the build plan without running anything
  Plan {
    /// Formula name
    formula: String,

    #[command(flatten)]
    options: OptionArgs,

    /// Include the source checkout step
    #[arg(long)]
    fetch: bool,
  },

  /// Build a formula and install it into the prefix
  Install {
    /// Formula name
    formula: String,

    #[command(flatten)]
    options: OptionArgs,

    /// Directory holding (or receiving) the sources
    #[arg(long, value_name = "DIR")]
    build_dir: Option<PathBuf>,

    /// Check the sources out before building
    #[arg(long)]
    fetch: bool,
  },

  /// Run the verification fixtures of an installed formula
  Test {
    /// Formula name
    formula: String,

    /// Scratch directory for the runner (defaults to a temporary directory)
    #[arg(long, value_name = "DIR")]
    workdir: Option<PathBuf>,
  },

  /// Print post-install instructions
  Caveats {
    /// Formula name
    formula: String,

    #[command(flatten)]
    options: OptionArgs,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Info => cmd::cmd_info(cli.output),
    Commands::Options { formula } => cmd::cmd_options(&formula, cli.output),
    Commands::Deps { formula, options } => cmd::cmd_deps(&formula, &options, cli.output),
    Commands::Plan {
      formula,
      options,
      fetch,
    } => cmd::cmd_plan(&formula, &options, fetch, cli.output),
    Commands::Install {
      formula,
      options,
      build_dir,
      fetch,
    } => cmd::cmd_install(&formula, &options, build_dir, fetch, cli.output),
    Commands::Test { formula, workdir } => cmd::cmd_test(&formula, workdir, cli.output),
    Commands::Caveats { formula, options } => cmd::cmd_caveats(&formula, &options, cli.output),
  };

  if let Err(err) = result {
    print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
}
