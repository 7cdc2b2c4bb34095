//! Verification runner.
//!
//! Reads the machine record an install left behind and runs the installed
//! test driver for every (package, precision) combination. A failing
//! combination is recorded and the rest still run. The keg is only read.

pub mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::execute::{BuildEnv, Executor};
use crate::formula::{Formula, VerificationSpec};
use crate::plan::Invocation;
use crate::prefix::Keg;
use crate::record::MachineRecord;
use crate::variant::Precision;

pub use types::{Fixture, FixtureOutcome, VerificationReport, VerifyError};

/// Every combination of declared package and recorded precision.
pub fn fixtures(spec: &VerificationSpec, record: &MachineRecord) -> Vec<Fixture> {
  spec
    .packages
    .iter()
    .flat_map(|package| {
      record.precisions.iter().map(move |precision| Fixture {
        package: package.clone(),
        precision: *precision,
      })
    })
    .collect()
}

/// Run the installed formula's fixtures.
///
/// `dependency_paths` maps formula names to their installed `libexec`, for
/// the formula's environment bindings. Runner processes start in `workdir`.
pub async fn verify<E: Executor>(
  formula: &Formula,
  keg: &Keg,
  dependency_paths: &BTreeMap<String, PathBuf>,
  workdir: &Path,
  executor: &E,
) -> Result<VerificationReport, VerifyError> {
  let recipe = formula
    .recipe()
    .ok_or_else(|| VerifyError::NotVerifiable(formula.name.clone()))?;
  if !keg.is_installed() {
    return Err(VerifyError::NotInstalled(formula.name.clone()));
  }

  let spec = &recipe.verification;
  let record = MachineRecord::read(&keg.path.join(&recipe.record_file))?;
  let libexec = keg.opt_libexec();

  let mut env = BuildEnv::new();
  for binding in &recipe.bindings {
    let path = dependency_paths
      .get(&binding.formula)
      .ok_or_else(|| VerifyError::MissingBinding {
        var: binding.var.clone(),
        formula: binding.formula.clone(),
      })?;
    env.insert(binding.var.clone(), path.display().to_string());
  }
  env.insert(recipe.env_script.export_var.clone(), libexec.display().to_string());
  env.insert(spec.arch_var.clone(), record.myarch());
  env.insert(spec.data_var.clone(), libexec.join(&spec.data_dir).display().to_string());

  let runner = libexec.join("bin").join(&spec.runner);
  let problem = libexec.join(&spec.problem);

  info!(formula = %formula.name, machine = %record.myarch(), "running verification");

  let mut outcomes = Vec::new();
  for fixture in fixtures(spec, &record) {
    let mut invocation = Invocation::new(&runner.display().to_string()).args(["-p", fixture.package.as_str()]);
    if fixture.precision == Precision::Single {
      invocation = invocation.arg(spec.single_flag.as_str());
    }
    let invocation = invocation.arg("-D").arg(problem.display().to_string());

    let outcome = match executor.run(&invocation, workdir, &env).await {
      Ok(output) => FixtureOutcome {
        fixture,
        passed: output.success(),
        code: output.code,
        output: output.combined(),
      },
      Err(e) => FixtureOutcome {
        fixture,
        passed: false,
        code: None,
        output: e.to_string(),
      },
    };

    if outcome.passed {
      info!(fixture = %outcome.fixture, "fixture passed");
    } else {
      warn!(fixture = %outcome.fixture, code = ?outcome.code, "fixture failed");
    }
    outcomes.push(outcome);
  }

  Ok(VerificationReport {
    formula: formula.name.clone(),
    machine: record.myarch(),
    outcomes,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::execute::testing::RecordingExecutor;
  use crate::formula::Registry;
  use crate::plan::MachineTriple;
  use crate::prefix::Prefix;
  use tempfile::TempDir;

  fn deps() -> BTreeMap<String, PathBuf> {
    [
      ("archdefs".to_string(), PathBuf::from("/p/opt/archdefs/libexec")),
      ("sifdecode".to_string(), PathBuf::from("/p/opt/sifdecode/libexec")),
    ]
    .into_iter()
    .collect()
  }

  fn installed(prefix: &Prefix, record: &str) -> Keg {
    let keg = prefix.keg("cutest");
    std::fs::create_dir_all(keg.libexec()).unwrap();
    std::fs::write(keg.path.join("cutest.machine"), record).unwrap();
    keg
  }

  #[test]
  fn fixture_matrix() {
    let registry = Registry::builtin();
    let spec = &registry.get("cutest").unwrap().recipe().unwrap().verification;
    let record = MachineRecord::new(
      MachineTriple::new("pc64", "lnx", "gfo"),
      [Precision::Double, Precision::Single],
    );
    let fixtures = fixtures(spec, &record);
    assert_eq!(fixtures.len(), 6);
    assert_eq!(fixtures[0].to_string(), "gen77/single");
    assert_eq!(fixtures[5].to_string(), "genc/double");
  }

  #[tokio::test]
  async fn runs_every_fixture_with_record_env() {
    let temp = TempDir::new().unwrap();
    let prefix = Prefix::new(temp.path().join("prefix"));
    let keg = installed(&prefix, "mac64\nosx\ngfo\nsingle,double\n");
    let registry = Registry::builtin();
    let executor = RecordingExecutor::new();

    let report = verify(registry.get("cutest").unwrap(), &keg, &deps(), temp.path(), &executor)
      .await
      .unwrap();

    assert!(report.is_success());
    assert_eq!(report.machine, "mac64.osx.gfo");
    assert_eq!(report.outcomes.len(), 6);

    let calls = executor.calls();
    let env = &calls[0].env;
    assert_eq!(env["MYARCH"], "mac64.osx.gfo");
    assert_eq!(env["CUTEST"], keg.opt_libexec().display().to_string());
    assert_eq!(env["MASTSIF"], keg.opt_libexec().join("sif").display().to_string());
    assert_eq!(env["ARCHDEFS"], "/p/opt/archdefs/libexec");

    let single = &calls[0].invocation;
    assert!(single.program.ends_with("runcutest"));
    assert_eq!(single.args[..3], ["-p", "gen77", "-sp"]);
    assert!(single.args[4].ends_with("ROSENBR.SIF"));
    assert!(!calls[1].invocation.args.contains(&"-sp".to_string()));
  }

  #[tokio::test]
  async fn failures_do_not_stop_remaining_fixtures() {
    let temp = TempDir::new().unwrap();
    let prefix = Prefix::new(temp.path().join("prefix"));
    let keg = installed(&prefix, "pc64\nlnx\n");
    let registry = Registry::builtin();
    let executor = RecordingExecutor::new().failing("-p gen90 -sp", 1, "segfault\n");

    let report = verify(registry.get("cutest").unwrap(), &keg, &deps(), temp.path(), &executor)
      .await
      .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.passed(), 5);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.fixture.to_string(), "gen90/single");
    assert_eq!(failure.output, "segfault\n");

    match report.ensure_success() {
      Err(VerifyError::VerificationFailure { failed, total, .. }) => {
        assert_eq!(failed, vec!["gen90/single"]);
        assert_eq!(total, 6);
      }
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[tokio::test]
  async fn missing_record_or_keg_fails_before_running() {
    let temp = TempDir::new().unwrap();
    let prefix = Prefix::new(temp.path().join("prefix"));
    let registry = Registry::builtin();
    let cutest = registry.get("cutest").unwrap();
    let executor = RecordingExecutor::new();

    let err = verify(cutest, &prefix.keg("cutest"), &deps(), temp.path(), &executor)
      .await
      .unwrap_err();
    assert!(matches!(err, VerifyError::NotInstalled(_)));

    std::fs::create_dir_all(prefix.keg("cutest").libexec()).unwrap();
    let err = verify(cutest, &prefix.keg("cutest"), &deps(), temp.path(), &executor)
      .await
      .unwrap_err();
    assert!(matches!(err, VerifyError::Record(_)));
    assert!(executor.calls().is_empty());
  }
}
