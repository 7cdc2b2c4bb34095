//! Artifact post-processing.
//!
//! The upstream installer only produces static archives. Each archive of each
//! variant is relinked into a shared object with the Fortran driver:
//!
//! ```text
//! $FC -fPIC -shared <force-all> libx.a <stop-force-all> -o libx_<precision>.<so> <extra...>
//! ```
//!
//! Variants link concurrently, bounded by a semaphore. A failure stops the
//! remaining archives of its own variant only.

pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::execute::{BuildEnv, Executor};
use crate::plan::Invocation;
use crate::platform::PlatformFacts;
use crate::variant::Variant;

pub use types::{LinkError, LinkFlags, LinkReport};

/// Inputs shared by every link job.
#[derive(Debug, Clone)]
pub struct LinkJob {
  /// `objects/<machine>.<arch>.<compiler>` inside the build tree.
  pub object_dir: PathBuf,
  pub fortran: String,
  pub env: BuildEnv,
  pub parallelism: usize,
}

/// Directory holding the archives of one variant.
pub fn variant_dir(object_dir: &Path, variant: &Variant) -> PathBuf {
  object_dir.join(variant.precision.as_str())
}

/// Shared-object name for an archive, e.g. `libcutest.a` ->
/// `libcutest_double.so`.
pub fn shared_name(archive: &str, variant: &Variant, flags: &LinkFlags) -> String {
  let stem = archive.strip_suffix(".a").unwrap_or(archive);
  format!("{}_{}.{}", stem, variant.precision, flags.suffix)
}

/// Link every variant's archives into shared objects.
pub async fn link_variants<E: Executor>(
  variants: &[Variant],
  job: &LinkJob,
  platform: &PlatformFacts,
  executor: Arc<E>,
) -> LinkReport {
  let flags = LinkFlags::for_os(platform.os);
  let semaphore = Arc::new(Semaphore::new(job.parallelism.max(1)));

  info!(variants = variants.len(), parallelism = job.parallelism, "linking shared objects");

  let mut join_set = JoinSet::new();
  for variant in variants {
    let variant = *variant;
    let job = job.clone();
    let flags = flags.clone();
    let executor = executor.clone();
    let semaphore = semaphore.clone();

    join_set.spawn(async move {
      let result = match semaphore.acquire().await {
        Ok(_permit) => link_variant(variant, &job, &flags, executor.as_ref()).await,
        Err(_) => Err(LinkError::Cancelled { variant }),
      };
      (variant, result)
    });
  }

  let mut report = LinkReport::default();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((variant, Ok(produced))) => {
        info!(variant = %variant, count = produced.len(), "variant linked");
        report.produced.insert(variant, produced);
      }
      Ok((variant, Err(e))) => {
        error!(variant = %variant, error = %e, "variant failed to link");
        report.failures.insert(variant, e);
      }
      Err(e) => {
        error!(error = %e, "link task panicked");
      }
    }
  }

  for variant in variants {
    if !report.produced.contains_key(variant) && !report.failures.contains_key(variant) {
      report.failures.insert(*variant, LinkError::Cancelled { variant: *variant });
    }
  }

  report
}

async fn link_variant<E: Executor>(
  variant: Variant,
  job: &LinkJob,
  flags: &LinkFlags,
  executor: &E,
) -> Result<Vec<PathBuf>, LinkError> {
  let dir = variant_dir(&job.object_dir, &variant);
  let archives = find_archives(&dir, variant)?;
  if archives.is_empty() {
    return Err(LinkError::MissingArchives { variant, dir });
  }

  let mut produced = Vec::with_capacity(archives.len());
  for archive in archives {
    let output_name = shared_name(&archive, &variant, flags);
    let invocation = Invocation::new(&job.fortran)
      .args(["-fPIC", "-shared", flags.force_all])
      .arg(archive.as_str())
      .arg(flags.stop_force_all)
      .args(["-o", output_name.as_str()])
      .args(flags.extra.iter().copied());

    debug!(variant = %variant, cmd = %invocation.display(), "linking archive");

    let output = executor
      .run(&invocation, &dir, &job.env)
      .await
      .map_err(|source| LinkError::Execute { variant, source })?;

    if !output.success() {
      return Err(LinkError::LinkerFailed {
        variant,
        archive,
        code: output.code,
        output: output.combined(),
      });
    }
    produced.push(dir.join(output_name));
  }

  Ok(produced)
}

/// Static archives directly inside `dir`, sorted by name.
fn find_archives(dir: &Path, variant: Variant) -> Result<Vec<String>, LinkError> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }

  let mut archives = Vec::new();
  for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| LinkError::Scan {
      variant,
      dir: dir.to_path_buf(),
      message: e.to_string(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }
    let name = entry.file_name().to_string_lossy();
    if name.ends_with(".a") {
      archives.push(name.into_owned());
    }
  }
  Ok(archives)
}
