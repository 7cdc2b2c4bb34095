//! Filesystem helpers shared by the install and record modules.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Write `contents` to `path` through a sibling temp file and a rename, so
/// readers never see a partial file.
pub fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
  let file_name = path
    .file_name()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
  let mut temp_name = file_name.to_os_string();
  temp_name.push(".tmp");
  let temp_path = path.with_file_name(temp_name);

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(&temp_path, contents)?;
  fs::rename(&temp_path, path)
}

/// Cross-platform symlink creation.
pub fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  #[cfg(unix)]
  {
    std::os::unix::fs::symlink(target, link)
  }
  #[cfg(windows)]
  {
    if target.is_dir() {
      std::os::windows::fs::symlink_dir(target, link)
    } else {
      std::os::windows::fs::symlink_file(target, link)
    }
  }
}

/// Point `link` at `target`, replacing whatever file or link is there.
///
/// Refuses to replace a real directory.
pub fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
  if let Some(parent) = link.parent() {
    fs::create_dir_all(parent)?;
  }
  match fs::symlink_metadata(link) {
    Ok(meta) if meta.is_dir() => {
      return Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{} is a directory", link.display()),
      ));
    }
    Ok(meta) if meta.file_type().is_symlink() && cfg!(windows) && link.is_dir() => fs::remove_dir(link)?,
    Ok(_) => fs::remove_file(link)?,
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }
  create_symlink(target, link)
}

/// Recursively copy `src` into `dst`, preserving relative layout and
/// recreating symlinks rather than following them. Hidden entries at the top
/// of `src` (VCS metadata, keg's scratch directory) are skipped. Returns the
/// number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<usize> {
  let mut copied = 0;
  fs::create_dir_all(dst)?;
  let walker = WalkDir::new(src)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.depth() != 1 || !e.file_name().to_string_lossy().starts_with('.'));
  for entry in walker {
    let entry = entry.map_err(io::Error::other)?;
    let relative = entry
      .path()
      .strip_prefix(src)
      .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let target = dst.join(relative);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_symlink() {
      let link_target = fs::read_link(entry.path())?;
      replace_symlink(&link_target, &target)?;
    } else {
      fs::copy(entry.path(), &target)?;
      copied += 1;
    }
  }
  Ok(copied)
}
