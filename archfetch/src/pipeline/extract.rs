//! Placing extracted members at their target paths.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Copy `src` to `target`, creating parent directories.
///
/// The data is written to a hidden sibling first and renamed into place,
/// so `target` only ever exists complete.
pub fn copy_into_place(src: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = partial_path(target);
    if let Err(e) = fs::copy(src, &partial).and_then(|_| fs::rename(&partial, target)) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    Ok(())
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(".partial");
    target.with_file_name(name)
}
