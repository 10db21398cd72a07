//! Shared filesystem helpers.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Recursively copy a directory tree, preserving symlinks as links.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !src.exists() {
        bail!("directory not found: {}", src.display());
    }
    fs::create_dir_all(dst)
        .with_context(|| format!("creating '{}'", dst.display()))?;

    for entry in fs::read_dir(src).with_context(|| format!("reading '{}'", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_symlink() {
            let target = fs::read_link(&src_path)?;
            std::os::unix::fs::symlink(target, &dst_path)
                .with_context(|| format!("linking '{}'", dst_path.display()))?;
        } else if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)
                .with_context(|| format!("copying to '{}'", dst_path.display()))?;
        }
    }

    Ok(())
}
