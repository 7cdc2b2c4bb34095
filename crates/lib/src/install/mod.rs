//! Installation layout engine.
//!
//! Each formula owns an isolated keg under `Cellar/<formula>/HEAD`. The build
//! tree is copied into the keg, and only individual files are exposed in the
//! prefix's shared directories, as symlinks into the keg. Directories are
//! never aliased.

pub mod types;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::formula::{DataArchive, EnvScript, Formula, FormulaKind, InstallerRecipe, Selector, SharedDir};
use crate::link::{LinkFlags, shared_name, variant_dir};
use crate::options::ResolvedOptions;
use crate::plan::{BuildPlan, MachineTriple};
use crate::prefix::{Keg, Prefix};
use crate::record::MachineRecord;
use crate::util::fs::{atomic_write, copy_tree, replace_symlink};
use crate::variant::Precision;

pub use types::{ArtifactKind, InstallError, InstalledLayout};

/// Install `formula` from `build_dir` into `prefix`.
///
/// Re-running overwrites the previous keg. Installer formulas need the
/// [`BuildPlan`] that produced `build_dir`.
pub fn install(
  formula: &Formula,
  resolved: &ResolvedOptions,
  build_dir: &Path,
  prefix: &Prefix,
  plan: Option<&BuildPlan>,
) -> Result<InstalledLayout, InstallError> {
  if !build_dir.is_dir() {
    return Err(InstallError::MissingBuildDir(build_dir.to_path_buf()));
  }

  let keg = prefix.keg(&formula.name);
  info!(formula = %formula.name, keg = ?keg.path, "installing");

  if !matches!(formula.kind, FormulaKind::External) {
    let removed = unlink_previous(prefix, &keg)?;
    if removed > 0 {
      debug!(formula = %formula.name, removed, "removed links from previous install");
    }
  }

  let layout = match &formula.kind {
    FormulaKind::External => return Err(InstallError::NotInstallable(formula.name.clone())),
    FormulaKind::Libexec => stage(&keg, build_dir, keg.libexec())?,
    FormulaKind::DataArchive(archive) => install_data_archive(&keg, archive, build_dir)?,
    FormulaKind::Installer(recipe) => {
      let plan = plan.ok_or_else(|| InstallError::MissingPlan(formula.name.clone()))?;
      install_recipe(&keg, recipe, resolved, build_dir, prefix, plan)?
    }
  };

  replace_symlink(&keg.path, &keg.opt).map_err(InstallError::io(&keg.opt))?;

  info!(
    formula = %formula.name,
    links = layout.links().count(),
    "install complete"
  );
  Ok(layout)
}

/// Remove every symlink in the shared directories that points into `keg`.
///
/// Runs before the keg is replaced so a reinstall with fewer artifacts leaves
/// nothing dangling.
fn unlink_previous(prefix: &Prefix, keg: &Keg) -> Result<usize, InstallError> {
  let mut removed = 0;
  for dir in [prefix.bin(), prefix.include(), prefix.lib(), prefix.root().join("share")] {
    if !dir.is_dir() {
      continue;
    }
    for entry in WalkDir::new(&dir).min_depth(1) {
      let entry = entry.map_err(|e| InstallError::Io {
        path: dir.clone(),
        source: e.into(),
      })?;
      if !entry.path_is_symlink() {
        continue;
      }
      let target = fs::read_link(entry.path()).map_err(InstallError::io(entry.path()))?;
      if target.starts_with(&keg.path) || target.starts_with(&keg.opt) {
        fs::remove_file(entry.path()).map_err(InstallError::io(entry.path()))?;
        removed += 1;
      }
    }
  }
  Ok(removed)
}

/// Replace the keg with a fresh copy of `build_dir` at `root`.
fn stage(keg: &Keg, build_dir: &Path, root: PathBuf) -> Result<InstalledLayout, InstallError> {
  if keg.path.exists() {
    debug!(keg = ?keg.path, "removing previous keg");
    fs::remove_dir_all(&keg.path).map_err(InstallError::io(&keg.path))?;
  }
  let copied = copy_tree(build_dir, &root).map_err(InstallError::io(&root))?;
  debug!(files = copied, root = ?root, "copied build tree");

  Ok(InstalledLayout {
    formula: keg.name.clone(),
    keg: keg.path.clone(),
    root,
    ..Default::default()
  })
}

fn install_data_archive(keg: &Keg, archive: &DataArchive, build_dir: &Path) -> Result<InstalledLayout, InstallError> {
  let mut layout = stage(keg, build_dir, keg.path.clone())?;

  let script = keg.path.join(&archive.script);
  let contents = format!("export {}={}\n", archive.env_var, keg.opt.display());
  atomic_write(&script, &contents).map_err(InstallError::io(&script))?;
  layout.env_script = Some(script);

  Ok(layout)
}

fn install_recipe(
  keg: &Keg,
  recipe: &InstallerRecipe,
  resolved: &ResolvedOptions,
  build_dir: &Path,
  prefix: &Prefix,
  plan: &BuildPlan,
) -> Result<InstalledLayout, InstallError> {
  let libexec = keg.libexec();
  let mut layout = stage(keg, build_dir, libexec.clone())?;

  for selector in &recipe.exposed {
    let links = expose(selector, &libexec, prefix, &keg.name)?;
    layout.add(selector.target.into(), links);
  }

  let aliases = library_aliases(recipe, &libexec, prefix, plan)?;
  layout.add(ArtifactKind::Library, aliases);

  let script = keg.path.join(&recipe.env_script.file);
  let contents = render_env_script(&recipe.env_script, keg, &plan.machine, resolved);
  atomic_write(&script, &contents).map_err(InstallError::io(&script))?;
  layout.env_script = Some(script);

  let record_path = keg.path.join(&recipe.record_file);
  MachineRecord::new(plan.machine.clone(), plan.variants.iter().map(|v| v.precision)).write(&record_path)?;
  layout.record = Some(record_path);

  Ok(layout)
}

/// Shared directory a selector links into.
pub fn shared_dir(prefix: &Prefix, dir: SharedDir, formula: &str) -> PathBuf {
  match dir {
    SharedDir::Bin => prefix.bin(),
    SharedDir::Include => prefix.include(),
    SharedDir::Man1 => prefix.man(1),
    SharedDir::Man3 => prefix.man(3),
    SharedDir::Lib => prefix.lib(),
    SharedDir::Doc => prefix.doc(formula),
  }
}

/// Symlink every file the selector matches into its shared directory.
fn expose(selector: &Selector, libexec: &Path, prefix: &Prefix, formula: &str) -> Result<Vec<PathBuf>, InstallError> {
  let source = libexec.join(&selector.source);
  if !source.is_dir() {
    debug!(source = ?source, "nothing to expose");
    return Ok(Vec::new());
  }

  let mut target_dir = shared_dir(prefix, selector.target, formula);
  if let Some(subdir) = &selector.subdir {
    target_dir = target_dir.join(subdir);
  }

  let mut links = Vec::new();
  for entry in WalkDir::new(&source).min_depth(1).max_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| InstallError::Io {
      path: source.clone(),
      source: e.into(),
    })?;
    // `is_dir` follows symlinks, so links to directories are skipped too.
    if entry.path().is_dir() || !selector.matches(&entry.file_name().to_string_lossy()) {
      continue;
    }
    let link = target_dir.join(entry.file_name());
    replace_symlink(entry.path(), &link).map_err(InstallError::io(&link))?;
    links.push(link);
  }

  for name in &selector.names {
    if !links.iter().any(|l| l.file_name().is_some_and(|f| f == name.as_str())) {
      warn!(file = %name, source = ?source, "expected file missing from build output");
    }
  }

  Ok(links)
}

/// Library aliases in `lib`: `<lib>_<precision>.a` and `<lib>_<precision>.<so>`
/// for every variant, plus unsuffixed names for double precision.
fn library_aliases(
  recipe: &InstallerRecipe,
  libexec: &Path,
  prefix: &Prefix,
  plan: &BuildPlan,
) -> Result<Vec<PathBuf>, InstallError> {
  let flags = LinkFlags::for_os(plan.platform.os);
  let objects = libexec.join(&recipe.objects_dir).join(plan.machine.myarch());
  let archive_name = format!("{}.a", recipe.library);

  let mut links = Vec::new();
  for variant in &plan.variants {
    let dir = variant_dir(&objects, variant);
    let archive = dir.join(&archive_name);
    let shared = dir.join(shared_name(&archive_name, variant, &flags));

    let mut aliases = vec![
      (format!("{}_{}.a", recipe.library, variant.precision), archive.clone()),
      (
        format!("{}_{}.{}", recipe.library, variant.precision, flags.suffix),
        shared.clone(),
      ),
    ];
    if variant.precision == Precision::Double {
      aliases.push((archive_name.clone(), archive));
      aliases.push((format!("{}.{}", recipe.library, flags.suffix), shared));
    }

    for (name, target) in aliases {
      let link = prefix.lib().join(name);
      replace_symlink(&target, &link).map_err(InstallError::io(&link))?;
      links.push(link);
    }
  }
  Ok(links)
}

/// Contents of the environment script users source from their shell profile.
pub fn render_env_script(
  script: &EnvScript,
  keg: &Keg,
  machine: &MachineTriple,
  resolved: &ResolvedOptions,
) -> String {
  let libexec = keg.opt_libexec();
  let mut contents = format!("export {}={}\n", script.export_var, libexec.display());
  if let Some(matlab) = &script.matlab
    && resolved.enabled(&matlab.option)
  {
    contents.push_str(&format!("export {}={}\n", matlab.arch_var, machine.myarch()));
    contents.push_str(&format!(
      "export MATLABPATH=$MATLABPATH:{}\n",
      libexec.join(&matlab.path_suffix).display()
    ));
  }
  contents
}
