//! Filesystem helpers for laying out analysis directories.

use crate::error::MkaError;
use anyhow::{Context, Result};
use std::fs::{self, DirBuilder, File};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Component, Path, PathBuf};

const DIR_MODE: u32 = 0o755;

/// Create `path` and any missing parents with mode 0755.
///
/// Returns the first level of the hierarchy that did not exist before the
/// call, or `None` if `path` was already there.
pub fn mkdir(path: &Path) -> Result<Option<PathBuf>> {
    let first_new = path
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .take_while(|p| !p.exists())
        .last()
        .map(Path::to_path_buf);

    if first_new.is_some() {
        DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(path)
            .with_context(|| format!("creating directory {}", path.display()))?;
    }
    Ok(first_new)
}

/// Link `dest` to `src`. With `overwrite`, an existing entry at `dest`
/// (including a dangling link) is removed first.
pub fn symlink(src: &Path, dest: &Path, overwrite: bool) -> Result<()> {
    if overwrite && fs::symlink_metadata(dest).is_ok() {
        fs::remove_file(dest).with_context(|| format!("removing {}", dest.display()))?;
    }
    std::os::unix::fs::symlink(src, dest)
        .with_context(|| format!("linking {} to {}", dest.display(), src.display()))
}

/// Make `path` absolute against the current directory. `.` and `..` are
/// resolved lexically and symlinks are left in place, so a linked input keeps
/// its own file name.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("determining the current directory")?
            .join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Check that `path` names a readable regular file, returning it as an
/// absolute path.
pub fn check_readable_file(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(MkaError::MissingInput(path.to_path_buf()).into());
    }
    if let Err(e) = File::open(path) {
        return Err(MkaError::UnreadableInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into());
    }
    absolute(path)
}

/// Clap value parser for input file arguments.
pub fn readable_file(arg: &str) -> Result<PathBuf> {
    check_readable_file(Path::new(arg))
}
