//! Database provisioning: create, grants, dump import/export.
//!
//! Imports strip volatile tables (caches, watchdog, access log) in-process
//! before the rows reach the server - restored sites start with cold
//! caches and empty logs instead of stale ones.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::Error;
use crate::process::Cmd;
use crate::provision::vhost::DatabaseCredentials;

/// Create the database if it does not exist.
pub fn create(database: &str) -> Result<()> {
    let stmt = format!("CREATE DATABASE IF NOT EXISTS `{}`", database);
    Cmd::new("mysql")
        .args(["-u", "root", "-e", &stmt])
        .error_msg(format!("creating database '{}'", database))
        .run()?;
    Ok(())
}

/// Grant the project user full rights on its database.
pub fn grant(database: &str, username: &str, password: &str) -> Result<()> {
    let stmt = format!(
        "GRANT ALL PRIVILEGES ON `{}`.* TO '{}'@'localhost' IDENTIFIED BY '{}'; FLUSH PRIVILEGES",
        database, username, password
    );
    Cmd::new("mysql")
        .args(["-u", "root", "-e", &stmt])
        .error_msg(format!("granting on database '{}'", database))
        .run()?;
    Ok(())
}

/// Drop, recreate, and load a database from a dump file, stripping
/// volatile tables on the way in.
pub fn import_dump(database: &str, source: &Path) -> Result<()> {
    let stmt = format!(
        "DROP DATABASE IF EXISTS `{}`; CREATE DATABASE `{}`",
        database, database
    );
    Cmd::new("mysql")
        .args(["-u", "root", "-e", &stmt])
        .error_msg(format!("recreating database '{}'", database))
        .run()?;

    let dump = File::open(source)
        .with_context(|| format!("opening dump '{}'", source.display()))?;

    let mut child = Command::new("mysql")
        .args(["-u", "root"])
        .arg(database)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::CommandFailure {
            command: "mysql".to_string(),
            path: source.display().to_string(),
            detail: format!("could not spawn: {}", e),
        })?;

    {
        let stdin = child.stdin.take().context("mysql stdin unavailable")?;
        let mut writer = BufWriter::new(stdin);
        filter_dump(BufReader::new(dump), &mut writer)
            .with_context(|| format!("streaming dump '{}'", source.display()))?;
        writer.flush()?;
    }

    let output = child.wait_with_output().context("waiting for mysql")?;
    if !output.status.success() {
        return Err(Error::CommandFailure {
            command: "mysql".to_string(),
            path: source.display().to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Export a database with `mysqldump`. Every failure here is a
/// [`Error::DataDump`] so backup runs abort before archiving anything.
pub fn dump(creds: &DatabaseCredentials, dest: &Path) -> Result<()> {
    let dump_failed = || Error::DataDump {
        database: creds.database.clone(),
    };

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating '{}'", parent.display()))?;
    }
    let out = File::create(dest)
        .with_context(|| format!("creating dump file '{}'", dest.display()))?;

    let output = Command::new("mysqldump")
        .arg("--single-transaction")
        .arg(format!("--user={}", creds.username))
        .arg(format!("--password={}", creds.password))
        .arg(&creds.database)
        .stdout(Stdio::from(out))
        .stderr(Stdio::piped())
        .output()
        .map_err(|_| dump_failed())?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(anyhow::Error::new(dump_failed()).context(stderr));
    }
    Ok(())
}

/// Copy a SQL dump, dropping volatile rows and `USE` statements.
pub fn filter_dump<R: BufRead, W: Write>(reader: R, writer: &mut W) -> std::io::Result<()> {
    for line in reader.lines() {
        let line = line?;
        if is_volatile_line(&line) {
            continue;
        }
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Rows that must not survive an import: cache tables, the watchdog log,
/// the access log, plus `USE` lines that would bypass the target database.
pub fn is_volatile_line(line: &str) -> bool {
    if line.starts_with("USE `") {
        return true;
    }
    let Some(rest) = line.strip_prefix("INSERT INTO `") else {
        return false;
    };
    let Some(end) = rest.find('`') else {
        return false;
    };
    let table = &rest[..end];
    if matches!(table, "ctools_object_cache" | "watchdog" | "accesslog") {
        return true;
    }
    match table.strip_prefix("cache") {
        Some(suffix) => suffix
            .chars()
            .all(|c| c == '_' || c.is_ascii_lowercase()),
        None => false,
    }
}
