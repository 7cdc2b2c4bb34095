//! Installs of copy-only formulas, and planning against them.

#![cfg(unix)]

use predicates::prelude::*;
use serial_test::serial;

use super::common::TestEnv;

#[test]
#[serial]
fn install_libexec_formula() {
  let env = TestEnv::new();
  env.install_tree("archdefs", &[("system.lnx", "lnx\n"), ("compiler.pc64.lnx.gfo", "gfortran\n")]);

  let keg = env.prefix_path().join("Cellar").join("archdefs").join("HEAD");
  assert_eq!(
    std::fs::read_to_string(keg.join("libexec").join("system.lnx")).unwrap(),
    "lnx\n"
  );
  let opt = env.prefix_path().join("opt").join("archdefs");
  assert!(opt.is_symlink());
  assert!(opt.join("libexec").join("compiler.pc64.lnx.gfo").exists());
}

#[test]
#[serial]
fn reinstall_overwrites_keg() {
  let env = TestEnv::new();
  env.install_tree("archdefs", &[("system.lnx", "old\n"), ("stale", "x\n")]);
  std::fs::remove_dir_all(env.source_dir("archdefs")).unwrap();
  env.install_tree("archdefs", &[("system.lnx", "new\n")]);

  let libexec = env.prefix_path().join("opt").join("archdefs").join("libexec");
  assert_eq!(std::fs::read_to_string(libexec.join("system.lnx")).unwrap(), "new\n");
  assert!(!libexec.join("stale").exists());
}

#[test]
#[serial]
fn install_data_archive_writes_script() {
  let env = TestEnv::new();
  env.install_tree("mastsif", &[("ROSENBR.SIF", "NAME ROSENBR\n")]);

  let keg = env.prefix_path().join("Cellar").join("mastsif").join("HEAD");
  assert!(keg.join("ROSENBR.SIF").exists());
  let script = std::fs::read_to_string(keg.join("mastsif.bashrc")).unwrap();
  assert!(script.starts_with("export MASTSIF="));
  assert!(script.contains("opt/mastsif"));

  env
    .keg_cmd()
    .args(["caveats", "mastsif"])
    .assert()
    .success()
    .stdout(predicate::str::contains("mastsif.bashrc"));
}

#[test]
#[serial]
fn dependency_must_be_installed_first() {
  let env = TestEnv::new();
  env.write_file("sources/sifdecode/bin/sifdecoder", "#!/bin/sh\n");

  env
    .keg_cmd()
    .args(["install", "sifdecode", "--build-dir"])
    .arg(env.source_dir("sifdecode"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("archdefs"));

  env.install_tree("archdefs", &[("system.lnx", "lnx\n")]);
  env.install_tree("sifdecode", &[("bin/sifdecoder", "#!/bin/sh\n")]);

  env
    .keg_cmd()
    .args(["deps", "cutest"])
    .assert()
    .success()
    .stdout(predicate::str::is_match("archdefs \\(installed\\)").unwrap())
    .stdout(predicate::str::is_match("cutest \\(missing\\)").unwrap());
}

#[test]
#[serial]
fn plan_binds_installed_dependencies() {
  let env = TestEnv::new();
  env.install_tree("archdefs", &[("system.lnx", "lnx\n")]);
  env.install_tree("sifdecode", &[("bin/sifdecoder", "#!/bin/sh\n")]);

  let archdefs = env.prefix_path().join("opt").join("archdefs").join("libexec");
  env
    .keg_cmd()
    .args(["plan", "cutest"])
    .assert()
    .success()
    .stdout(predicate::str::contains(format!("set ARCHDEFS={}", archdefs.display())))
    .stdout(predicate::str::contains("set MAKEFLAGS=-j1"))
    .stdout(predicate::str::contains("set FC=gfortran"))
    .stdout(predicate::str::contains("patch -p1"));

  let output = env
    .keg_cmd()
    .args(["--output", "json", "plan", "cutest", "--with-single"])
    .env("FC", "gfortran-14")
    .output()
    .unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["formula"], "cutest");
  assert_eq!(json["variants"].as_array().unwrap().len(), 2);
  assert_eq!(json["fingerprint"].as_str().unwrap().len(), 64);
  assert!(output.stdout.windows(11).any(|w| w == b"gfortran-14"));
}

#[test]
#[serial]
fn plan_is_stable_across_invocations() {
  let env = TestEnv::new();
  env.install_tree("archdefs", &[("system.lnx", "lnx\n")]);
  env.install_tree("sifdecode", &[("bin/sifdecoder", "#!/bin/sh\n")]);

  let run = || {
    let output = env
      .keg_cmd()
      .args(["--output", "json", "plan", "cutest", "--with-matlab"])
      .output()
      .unwrap();
    assert!(output.status.success());
    output.stdout
  };
  assert_eq!(run(), run());
}

#[test]
#[serial]
fn test_rejects_formula_without_fixtures() {
  let env = TestEnv::new();
  env.install_tree("archdefs", &[("system.lnx", "lnx\n")]);

  env
    .keg_cmd()
    .args(["test", "archdefs"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no verification fixtures"));
}
