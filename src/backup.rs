//! Backup bundles: per-environment file snapshots, database dumps, and a
//! mirrored repository clone, archived into one `.tar.gz`.
//!
//! The staging directory is never auto-deleted. A failed run leaves it in
//! place for inspection and [`BackupJob::working_dir`] names it, so
//! cleanup is an explicit caller step rather than something that silently
//! destroys evidence.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::environment::Environment;
use crate::filesystem::copy_dir_recursive;
use crate::handler::validate_project_name;
use crate::locator::locate;
use crate::platform::PlatformProfile;
use crate::process::Cmd;
use crate::provision::{database, vhost};

/// Sidecar metadata written next to the finished archive.
#[derive(Debug, Serialize)]
struct BundleManifest {
    name: String,
    project: String,
    environments: Vec<String>,
    archive_sha256: String,
    size_bytes: u64,
    created_at_unix: u64,
}

/// One backup run for one project.
pub struct BackupJob<'a> {
    profile: &'a PlatformProfile,
    project: String,
    name: String,
    working_dir: PathBuf,
}

impl<'a> BackupJob<'a> {
    /// Create a job with a fresh staging directory.
    pub fn new(profile: &'a PlatformProfile, project: &str, name: &str) -> Result<Self> {
        validate_project_name(project)?;
        let working_dir = tempfile::Builder::new()
            .prefix("site-backup-")
            .tempdir()
            .context("creating backup staging directory")?
            .keep();

        Ok(BackupJob {
            profile,
            project: project.to_string(),
            name: name.to_string(),
            working_dir,
        })
    }

    /// The staging directory. Survives failed runs for manual cleanup.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn archive_path(&self) -> PathBuf {
        self.working_dir.join(format!("{}.tar.gz", self.name))
    }

    /// Snapshot each environment's site tree into the staging area.
    pub fn backup_files(&self, environments: &[Environment]) -> Result<()> {
        for &env in environments {
            let desc = locate(&self.project, env, self.profile);
            let dest = self.working_dir.join(&self.project).join(env.as_str());
            println!("[backup:{}:{}] copying site tree", self.project, env);
            copy_dir_recursive(&desc.env_path, &dest)?;
        }
        Ok(())
    }

    /// Dump each environment's database into the staging area.
    ///
    /// Credentials come from the environment's vhost file; a dump failure
    /// aborts the whole run so no partial bundle is archived.
    pub fn backup_data(&self, environments: &[Environment]) -> Result<()> {
        for &env in environments {
            let creds = vhost::database_credentials(self.profile, &self.project, env)?;
            let dest = self
                .working_dir
                .join(&self.project)
                .join(env.as_str())
                .join("database.sql");
            println!("[backup:{}:{}] dumping {}", self.project, env, creds.database);
            database::dump(&creds, &dest)?;
        }
        Ok(())
    }

    /// Mirror the project's central repository into the staging area.
    pub fn backup_repo(&self) -> Result<()> {
        let source = self.profile.git_root.join(&self.project);
        let dest = self.working_dir.join(format!("{}.git", self.project));
        println!("[backup:{}] mirroring repository", self.project);
        Cmd::new("git")
            .args(["clone", "--mirror"])
            .arg(source.display().to_string())
            .arg_path(&dest)
            .error_msg("mirroring central repository failed")
            .run()?;
        Ok(())
    }

    /// Archive the `{project}` and `{project}.git` staging entries into
    /// `{name}.tar.gz` and write the bundle manifest beside it.
    pub fn make_archive(&self, environments: &[Environment]) -> Result<PathBuf> {
        let archive_path = self.archive_path();
        let file = File::create(&archive_path)
            .with_context(|| format!("creating archive '{}'", archive_path.display()))?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let repo_name = format!("{}.git", self.project);
        builder
            .append_dir_all(&self.project, self.working_dir.join(&self.project))
            .context("archiving site snapshots")?;
        builder
            .append_dir_all(&repo_name, self.working_dir.join(&repo_name))
            .context("archiving repository mirror")?;
        builder
            .into_inner()
            .context("finishing archive")?
            .finish()
            .context("finishing gzip stream")?;

        let (sha256, size_bytes) = sha256_file(&archive_path)?;
        let manifest = BundleManifest {
            name: self.name.clone(),
            project: self.project.clone(),
            environments: environments.iter().map(|e| e.to_string()).collect(),
            archive_sha256: sha256,
            size_bytes,
            created_at_unix: now_unix(),
        };
        let manifest_path = self.working_dir.join(format!("{}.manifest.json", self.name));
        fs::write(
            &manifest_path,
            serde_json::to_string_pretty(&manifest).context("encoding manifest")?,
        )
        .with_context(|| format!("writing '{}'", manifest_path.display()))?;

        Ok(archive_path)
    }

    /// Relocate the finished archive to the platform drop location.
    pub fn move_archive(&self, archive: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.profile.ftproot)
            .with_context(|| format!("creating '{}'", self.profile.ftproot.display()))?;
        let file_name = archive
            .file_name()
            .context("archive path has no file name")?;
        let dest = self.profile.ftproot.join(file_name);

        // Rename first; fall back to copy+remove across devices.
        if fs::rename(archive, &dest).is_err() {
            fs::copy(archive, &dest)
                .with_context(|| format!("copying archive to '{}'", dest.display()))?;
            fs::remove_file(archive)
                .with_context(|| format!("removing '{}'", archive.display()))?;
        }
        Ok(dest)
    }

    /// Full run: files + data for every requested environment, repository
    /// mirror, archive, relocate. Returns the delivered archive path.
    pub fn run(&self, environments: &[Environment]) -> Result<PathBuf> {
        let staging = || format!("staging left at '{}'", self.working_dir.display());

        self.backup_files(environments).with_context(staging)?;
        self.backup_data(environments).with_context(staging)?;
        self.backup_repo().with_context(staging)?;
        let archive = self.make_archive(environments).with_context(staging)?;
        let delivered = self.move_archive(&archive).with_context(staging)?;
        println!("[backup:{}] bundle at {}", self.project, delivered.display());
        Ok(delivered)
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let file =
        File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{find_typed, Error};
    use crate::platform::Distro;
    use flate2::read::GzDecoder;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn profile(temp: &TempDir) -> PlatformProfile {
        let mut profile = PlatformProfile::for_distro(Distro::Ubuntu);
        profile.webroot = temp.path().join("www");
        profile.vhost_dir = temp.path().join("vhosts");
        profile.ftproot = temp.path().join("drop");
        profile.git_root = temp.path().join("git");
        profile
    }

    fn populate_staging(job: &BackupJob<'_>) {
        let project_dir = job.working_dir().join("mysite");
        fs::create_dir_all(project_dir.join("dev/sites/default")).unwrap();
        fs::write(project_dir.join("dev/index.php"), "<?php\n").unwrap();
        let repo_dir = job.working_dir().join("mysite.git");
        fs::create_dir_all(&repo_dir).unwrap();
        fs::write(repo_dir.join("HEAD"), "ref: refs/heads/mysite\n").unwrap();
    }

    fn archive_entries(path: &Path) -> BTreeSet<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn test_make_archive_bundles_project_and_mirror() {
        let temp = TempDir::new().unwrap();
        let profile = profile(&temp);
        let job = BackupJob::new(&profile, "mysite", "nightly").unwrap();
        populate_staging(&job);

        let archive = job.make_archive(&[Environment::Dev]).unwrap();
        assert_eq!(archive, job.working_dir().join("nightly.tar.gz"));

        let entries = archive_entries(&archive);
        assert!(entries.contains("mysite/dev/index.php"));
        assert!(entries.contains("mysite.git/HEAD"));
        assert!(entries.iter().all(|e| {
            e.starts_with("mysite/") || e.starts_with("mysite.git") || e == "mysite"
        }));

        fs::remove_dir_all(job.working_dir()).unwrap();
    }

    #[test]
    fn test_manifest_records_archive_digest() {
        let temp = TempDir::new().unwrap();
        let profile = profile(&temp);
        let job = BackupJob::new(&profile, "mysite", "nightly").unwrap();
        populate_staging(&job);

        let archive = job.make_archive(&[Environment::Dev]).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(job.working_dir().join("nightly.manifest.json")).unwrap(),
        )
        .unwrap();

        let (expected_sha, expected_size) = sha256_file(&archive).unwrap();
        assert_eq!(manifest["project"], "mysite");
        assert_eq!(manifest["environments"][0], "dev");
        assert_eq!(manifest["archive_sha256"], expected_sha.as_str());
        assert_eq!(manifest["size_bytes"], expected_size);

        fs::remove_dir_all(job.working_dir()).unwrap();
    }

    #[test]
    fn test_move_archive_relocates_to_drop_dir() {
        let temp = TempDir::new().unwrap();
        let profile = profile(&temp);
        let job = BackupJob::new(&profile, "mysite", "nightly").unwrap();
        populate_staging(&job);

        let archive = job.make_archive(&[Environment::Dev]).unwrap();
        let delivered = job.move_archive(&archive).unwrap();

        assert_eq!(delivered, profile.ftproot.join("nightly.tar.gz"));
        assert!(delivered.exists());
        assert!(!archive.exists());

        fs::remove_dir_all(job.working_dir()).unwrap();
    }

    #[test]
    fn test_dump_failure_aborts_before_archive() {
        let temp = TempDir::new().unwrap();
        let profile = profile(&temp);

        // A real site tree and a vhost with credentials, but no reachable
        // database server: backup_data must fail with DataDump.
        fs::create_dir_all(profile.webroot.join("mysite/dev/sites/default")).unwrap();
        fs::create_dir_all(&profile.vhost_dir).unwrap();
        fs::write(
            profile.vhost_dir.join("mysite_dev"),
            "SetEnv db_username mysite\nSetEnv db_password pw\nSetEnv db_name mysite_dev_no_such_db\n",
        )
        .unwrap();

        let job = BackupJob::new(&profile, "mysite", "nightly").unwrap();
        let err = job.run(&[Environment::Dev]).unwrap_err();

        assert!(matches!(find_typed(&err), Some(Error::DataDump { .. })));
        // No archive anywhere, staging kept.
        assert!(!job.working_dir().join("nightly.tar.gz").exists());
        assert!(!profile.ftproot.join("nightly.tar.gz").exists());
        assert!(job.working_dir().exists());
        assert!(err.to_string().contains("staging left at")
            || format!("{:#}", err).contains("staging left at"));

        fs::remove_dir_all(job.working_dir()).unwrap();
    }

    #[test]
    fn test_rejects_bad_project_name() {
        let temp = TempDir::new().unwrap();
        let profile = profile(&temp);
        assert!(BackupJob::new(&profile, "../etc", "nightly").is_err());
    }
}
