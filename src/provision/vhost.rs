//! Virtual host files.
//!
//! One vhost file per `(project, environment)`, rendered from the
//! distro-specific template and written read-protected (database
//! credentials live in its `SetEnv` lines). The same `SetEnv` layout is
//! what backup reads credentials back out of.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::environment::Environment;
use crate::error::Error;
use crate::locator::{locate, ResourceDescriptor};
use crate::platform::{Distro, PlatformProfile};
use crate::process::Cmd;
use crate::template::Emitter;

/// Database connection settings recovered from a vhost file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
    pub database: String,
}

/// The public hostname pattern an environment answers to.
///
/// Private servers answer on a bare wildcard; hosted servers get a
/// per-environment name under the platform domain.
pub fn server_alias(profile: &PlatformProfile, environment: Environment) -> String {
    if profile.is_private_server() {
        format!("{}.*", environment)
    } else {
        format!("{}.*.{}", environment, profile.public_domain)
    }
}

/// Render and persist the vhost file for one environment; on Ubuntu the
/// site is also enabled.
pub fn create(
    profile: &PlatformProfile,
    emitter: &dyn Emitter,
    desc: &ResourceDescriptor,
    db_password: &str,
) -> Result<PathBuf> {
    let env = desc.environment.as_str();
    let mut values = BTreeMap::new();
    values.insert("server_name".to_string(), env.to_string());
    values.insert(
        "server_alias".to_string(),
        server_alias(profile, desc.environment),
    );
    values.insert("project".to_string(), desc.project.clone());
    values.insert("environment".to_string(), env.to_string());
    values.insert("db_name".to_string(), desc.db_name.clone());
    values.insert("db_username".to_string(), desc.db_username.clone());
    values.insert("db_password".to_string(), db_password.to_string());
    values.insert(
        "solr_path".to_string(),
        format!("/{}_{}", desc.project, env),
    );
    values.insert("memcache_prefix".to_string(), desc.memcache_prefix.clone());

    let template = format!("vhost.template.{}", profile.distro);
    let text = emitter.render(&template, &values)?;
    emitter.write(&desc.vhost_path, &text, 0o640)?;

    if profile.distro == Distro::Ubuntu {
        Cmd::new("a2ensite")
            .arg(&desc.vhost_filename)
            .error_msg("enabling site failed")
            .run()?;
    }

    Ok(desc.vhost_path.clone())
}

/// Parse `SetEnv KEY VALUE` lines out of a vhost file.
///
/// Lines are whitespace-split; the 2nd and 3rd tokens of any line
/// mentioning `SetEnv` are taken as key and value. Everything else is
/// ignored.
pub fn parse(path: &Path) -> Result<BTreeMap<String, String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading vhost '{}'", path.display()))?;

    let mut vars = BTreeMap::new();
    for line in text.lines() {
        if !line.contains("SetEnv") {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() >= 3 {
            vars.insert(tokens[1].to_string(), tokens[2].to_string());
        }
    }
    Ok(vars)
}

/// Recover an environment's database credentials from its vhost file.
pub fn database_credentials(
    profile: &PlatformProfile,
    project: &str,
    environment: Environment,
) -> Result<DatabaseCredentials> {
    let desc = locate(project, environment, profile);
    let vars = parse(&desc.vhost_path)?;

    let get = |key: &str| -> Result<String> {
        vars.get(key).cloned().ok_or_else(|| {
            Error::Configuration(format!(
                "vhost '{}' is missing SetEnv {}",
                desc.vhost_path.display(),
                key
            ))
            .into()
        })
    };

    Ok(DatabaseCredentials {
        username: get("db_username")?,
        password: get("db_password")?,
        database: get("db_name")?,
    })
}
