//! Per-project advisory locking.
//!
//! Lifecycle operations mutate shared paths (vhost directory, solr tree,
//! project tree) without any finer-grained coordination, so at most one
//! operation may be in flight per project. The lock makes that rule
//! enforceable: a second invocation fails fast instead of interleaving.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

use crate::error::Error;
use crate::platform::PlatformProfile;

/// Exclusive lock on one project, released on drop.
#[derive(Debug)]
pub struct ProjectLock {
    _file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Take the project's lock, failing immediately if another operation
    /// holds it.
    pub fn acquire(profile: &PlatformProfile, project: &str) -> Result<Self> {
        fs::create_dir_all(&profile.lock_dir)
            .with_context(|| format!("creating lock dir '{}'", profile.lock_dir.display()))?;
        let path = profile.lock_dir.join(format!("{}.lock", project));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("opening lock file '{}'", path.display()))?;

        file.try_lock_exclusive().map_err(|_| Error::ProjectLocked {
            project: project.to_string(),
        })?;

        Ok(ProjectLock { _file: file, path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
