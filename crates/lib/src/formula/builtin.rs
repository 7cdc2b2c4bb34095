//! Built-in formulas.

use crate::graph::DependencyEdge;
use crate::options::OptionSpec;
use crate::plan::{InstallerProfile, InstallerTable, MachineTriple, MenuLine, TableKey};
use crate::platform::CompilerFamily;
use crate::platform::arch::WordSize;
use crate::platform::os::Os;

use super::types::{
  DataArchive, EnvBinding, EnvScript, FetchStrategy, Formula, FormulaKind, HeadSource, InstallerRecipe, MatlabEnv,
  Patch, Selector, SharedDir, VerificationSpec,
};

const CCPFORGE_SVN: &str = "http://ccpforge.cse.rl.ac.uk/svn/cutest";
const CUTEST_HOMEPAGE: &str = "http://ccpforge.cse.rl.ac.uk/gf/project/cutest/wiki";

/// The upstream installer pins Matlab's compilers to gcc-4.3; use the
/// toolchain on PATH instead.
const MATLAB_COMPILER_PATCH: &str = "\
diff --git a/bin/install_cutest_alone b/bin/install_cutest_alone
index a7edfde..cc8474b 100755
--- a/bin/install_cutest_alone
+++ b/bin/install_cutest_alone
@@ -372,8 +372,8 @@ if [[ -e $CUTEST/versions/$VERSION ]]; then
     [[ $? == 0 ]] && exit 4
 fi
 
-MATLABGCC=\"gcc-4.3\"
-MATLABGFORTRAN=\"gfortran-4.3\"
+MATLABGCC=\"gcc\"
+MATLABGFORTRAN=\"gfortran\"
 matlab=\"\"
 
 #echo $CMP
";

fn svn_head(path: &str, anonymous: bool) -> Option<HeadSource> {
  Some(HeadSource {
    url: format!("{}/{}", CCPFORGE_SVN, path),
    strategy: FetchStrategy::Subversion { anonymous },
  })
}

pub fn gsl() -> Formula {
  Formula {
    name: "gsl".to_string(),
    description: "Numerical library for C and C++".to_string(),
    homepage: "https://www.gnu.org/software/gsl/".to_string(),
    head: None,
    keg_only: None,
    options: Vec::new(),
    dependencies: Vec::new(),
    kind: FormulaKind::External,
  }
}

pub fn archdefs() -> Formula {
  Formula {
    name: "archdefs".to_string(),
    description: "Machine and compiler definitions shared by the CUTEst tools".to_string(),
    homepage: CUTEST_HOMEPAGE.to_string(),
    head: svn_head("archdefs/trunk", true),
    keg_only: Some("Only consumed by other formulas through ARCHDEFS".to_string()),
    options: Vec::new(),
    dependencies: Vec::new(),
    kind: FormulaKind::Libexec,
  }
}

pub fn sifdecode() -> Formula {
  Formula {
    name: "sifdecode".to_string(),
    description: "Decoder for problems written in the Standard Input Format".to_string(),
    homepage: CUTEST_HOMEPAGE.to_string(),
    head: svn_head("sifdecode/trunk", true),
    keg_only: Some("Only consumed by other formulas through SIFDECODE".to_string()),
    options: Vec::new(),
    dependencies: vec![DependencyEdge::build("archdefs")],
    kind: FormulaKind::Libexec,
  }
}

pub fn mastsif() -> Formula {
  Formula {
    name: "mastsif".to_string(),
    description: "Master collection of SIF test problems".to_string(),
    homepage: CUTEST_HOMEPAGE.to_string(),
    head: svn_head("sif/trunk", false),
    keg_only: Some("This formula only installs data files".to_string()),
    options: Vec::new(),
    dependencies: Vec::new(),
    kind: FormulaKind::DataArchive(DataArchive {
      env_var: "MASTSIF".to_string(),
      script: "mastsif.bashrc".to_string(),
    }),
  }
}

fn cutest_table() -> InstallerTable {
  let toolset = || MenuLine::switch("", "with-matlab", "1", "2");
  let flags = || MenuLine::switch("nnyd", "with-single", "y", "n");

  InstallerTable::new()
    .with(
      TableKey::new(Os::MacOs, WordSize::Bits64, CompilerFamily::Gnu),
      InstallerProfile {
        machine: MachineTriple::new("mac64", "osx", "gfo"),
        menu: vec![MenuLine::literal("13"), MenuLine::literal("2"), toolset(), MenuLine::literal("4"), flags()],
      },
    )
    .with(
      TableKey::new(Os::MacOs, WordSize::Bits32, CompilerFamily::Gnu),
      InstallerProfile {
        machine: MachineTriple::new("mac", "osx", "gfo"),
        menu: vec![MenuLine::literal("12"), MenuLine::literal("2"), toolset(), MenuLine::literal("4"), flags()],
      },
    )
    .with(
      TableKey::new(Os::Linux, WordSize::Bits64, CompilerFamily::Gnu),
      InstallerProfile {
        machine: MachineTriple::new("pc64", "lnx", "gfo"),
        menu: vec![
          MenuLine::literal("6"),
          MenuLine::literal("2"),
          MenuLine::literal("2"),
          toolset(),
          MenuLine::literal("4"),
          flags(),
        ],
      },
    )
    .with(
      TableKey::new(Os::Linux, WordSize::Bits64, CompilerFamily::Pgi),
      InstallerProfile {
        machine: MachineTriple::new("pc64", "lnx", "pgf"),
        menu: vec![
          MenuLine::literal("6"),
          MenuLine::literal("2"),
          MenuLine::literal("5"),
          toolset(),
          MenuLine::literal("4"),
          flags(),
        ],
      },
    )
}

pub fn cutest() -> Formula {
  let recipe = InstallerRecipe {
    program: "./install_cutest".to_string(),
    input_file: "cutest.input".to_string(),
    deparallelize: true,
    patches: vec![Patch {
      name: "matlab-compilers".to_string(),
      diff: MATLAB_COMPILER_PATCH.to_string(),
    }],
    table: cutest_table(),
    supported: vec![
      TableKey::new(Os::MacOs, WordSize::Bits64, CompilerFamily::Gnu),
      TableKey::new(Os::MacOs, WordSize::Bits32, CompilerFamily::Gnu),
      TableKey::new(Os::Linux, WordSize::Bits64, CompilerFamily::Gnu),
      TableKey::new(Os::Linux, WordSize::Bits64, CompilerFamily::Pgi),
    ],
    bindings: vec![
      EnvBinding {
        var: "ARCHDEFS".to_string(),
        formula: "archdefs".to_string(),
      },
      EnvBinding {
        var: "SIFDECODE".to_string(),
        formula: "sifdecode".to_string(),
      },
    ],
    single_option: Some("with-single".to_string()),
    pgi_option: Some("with-pgi".to_string()),
    objects_dir: "objects".to_string(),
    library: "libcutest".to_string(),
    exposed: vec![
      Selector::new(SharedDir::Bin, "bin").named(&["cutest2matlab", "runcutest"]),
      Selector::new(SharedDir::Include, "include").suffix(".h"),
      Selector::new(SharedDir::Man1, "man/man1").suffix(".1"),
      Selector::new(SharedDir::Man3, "man/man3").suffix(".3"),
      Selector::new(SharedDir::Doc, "doc").prefix("README"),
      Selector::new(SharedDir::Doc, "doc/pdf").subdir("pdf"),
    ],
    env_script: EnvScript {
      file: "cutest.bashrc".to_string(),
      export_var: "CUTEST".to_string(),
      matlab: Some(MatlabEnv {
        option: "with-matlab".to_string(),
        arch_var: "MYMATLABARCH".to_string(),
        path_suffix: "src/matlab".to_string(),
        readme: "README.osx".to_string(),
      }),
    },
    record_file: "cutest.machine".to_string(),
    verification: VerificationSpec {
      runner: "runcutest".to_string(),
      packages: vec!["gen77".to_string(), "gen90".to_string(), "genc".to_string()],
      problem: "sif/ROSENBR.SIF".to_string(),
      single_flag: "-sp".to_string(),
      data_var: "MASTSIF".to_string(),
      data_dir: "sif".to_string(),
      arch_var: "MYARCH".to_string(),
    },
  };

  Formula {
    name: "cutest".to_string(),
    description: "Constrained and Unconstrained Testing Environment on steroids".to_string(),
    homepage: CUTEST_HOMEPAGE.to_string(),
    head: svn_head("cutest/trunk", true),
    keg_only: None,
    options: vec![
      OptionSpec::boolean("with-matlab", "Compile with Matlab support"),
      OptionSpec::boolean("with-single", "Compile with single precision support"),
      OptionSpec::boolean("with-pgi", "Build with the PGI Fortran toolchain").caution(
        "with-matlab",
        "Matlab support is only configured for the GNU toolchain",
      ),
    ],
    dependencies: vec![
      DependencyEdge::run("gsl"),
      DependencyEdge::build("archdefs"),
      DependencyEdge::build("sifdecode"),
    ],
    kind: FormulaKind::Installer(Box::new(recipe)),
  }
}

/// All built-in formulas in declaration order.
pub fn all() -> Vec<Formula> {
  vec![gsl(), archdefs(), sifdecode(), mastsif(), cutest()]
}
