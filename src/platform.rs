//! Platform profile - distro-dependent constants resolved once per process.
//!
//! Ubuntu and CentOS lay out web server groups, vhost directories, and
//! service names differently. Everything downstream reads these constants
//! from an immutable [`PlatformProfile`] built at startup; nothing detects
//! the distribution ad hoc.
//!
//! An optional TOML config (`/etc/site-builder/config.toml`) overrides
//! individual paths and the public-facing domain:
//!
//! ```toml
//! [server]
//! public_domain = "sites.example.net"
//! private = false
//!
//! [paths]
//! webroot = "/srv/www"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Default location of the override config.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/site-builder/config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distro {
    Ubuntu,
    Centos,
}

impl Distro {
    pub fn as_str(self) -> &'static str {
        match self {
            Distro::Ubuntu => "ubuntu",
            Distro::Centos => "centos",
        }
    }
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-process record of distro-dependent constants.
///
/// Created once at startup and passed by reference to every component that
/// needs it; never mutated afterward.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub distro: Distro,
    /// System owner account.
    pub owner: String,
    /// Group the web server process runs as.
    pub web_group: String,
    /// Group the Hudson CI daemon runs as.
    pub hudson_group: String,
    /// Tomcat service account (owns solr index data).
    pub tomcat_owner: String,
    pub tomcat_version: u8,
    /// Init service name for the database server.
    pub mysql_service: String,
    /// Document root all project trees live under.
    pub webroot: PathBuf,
    /// Drop location finished backup archives are moved to.
    pub ftproot: PathBuf,
    /// Directory the web server loads vhost files from.
    pub vhost_dir: PathBuf,
    pub solr_root: PathBuf,
    pub hudson_jobs: PathBuf,
    pub drush_aliases: PathBuf,
    /// Central bare repositories, one per project.
    pub git_root: PathBuf,
    pub template_dir: PathBuf,
    /// Marker file naming the LDAP group that owns project trees.
    pub ldap_marker: PathBuf,
    /// Marker file switching vhost aliases to private-server form.
    pub private_marker: PathBuf,
    pub public_domain: String,
    pub private_server: bool,
    pub lock_dir: PathBuf,
}

impl PlatformProfile {
    /// Build a profile from distribution constants alone.
    pub fn for_distro(distro: Distro) -> Self {
        let (web_group, hudson_group, tomcat_owner, tomcat_version, mysql_service) =
            match distro {
                Distro::Ubuntu => ("www-data", "nogroup", "tomcat6", 6, "mysql"),
                Distro::Centos => ("apache", "hudson", "tomcat", 5, "mysqld"),
            };
        let (webroot, ftproot, vhost_dir) = match distro {
            Distro::Ubuntu => (
                "/var/www",
                "/srv/ftp/site-builder",
                "/etc/apache2/sites-available",
            ),
            Distro::Centos => (
                "/var/www/html",
                "/var/ftp/site-builder",
                "/etc/httpd/conf/vhosts",
            ),
        };

        PlatformProfile {
            distro,
            owner: "root".to_string(),
            web_group: web_group.to_string(),
            hudson_group: hudson_group.to_string(),
            tomcat_owner: tomcat_owner.to_string(),
            tomcat_version,
            mysql_service: mysql_service.to_string(),
            webroot: PathBuf::from(webroot),
            ftproot: PathBuf::from(ftproot),
            vhost_dir: PathBuf::from(vhost_dir),
            solr_root: PathBuf::from("/var/solr"),
            hudson_jobs: PathBuf::from("/var/lib/hudson/jobs"),
            drush_aliases: PathBuf::from("/opt/drush/aliases"),
            git_root: PathBuf::from("/var/git/projects"),
            template_dir: PathBuf::from("/opt/site-builder/templates"),
            ldap_marker: PathBuf::from("/etc/site-builder/ldapgroup"),
            private_marker: PathBuf::from("/etc/site-builder/private"),
            public_domain: "example.com".to_string(),
            private_server: false,
            lock_dir: PathBuf::from("/var/lock/site-builder"),
        }
    }

    /// Detect the host distribution and apply the default config file if
    /// present.
    pub fn detect() -> Result<Self> {
        let distro = if Path::new("/etc/debian_version").exists() {
            Distro::Ubuntu
        } else if Path::new("/etc/redhat-release").exists() {
            Distro::Centos
        } else {
            bail!(Error::Configuration(
                "unsupported distribution (expected Debian/Ubuntu or CentOS)".to_string(),
            ));
        };

        let mut profile = Self::for_distro(distro);
        let config_path = Path::new(DEFAULT_CONFIG_PATH);
        if config_path.exists() {
            profile.apply_config(config_path)?;
        }
        Ok(profile)
    }

    /// Overlay settings from a TOML config file. Only fields named in the
    /// file change; unknown keys are an error.
    pub fn apply_config(&mut self, path: &Path) -> Result<()> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        let parsed: ProfileToml = toml::from_str(&raw)
            .with_context(|| format!("parsing config '{}'", path.display()))?;

        if let Some(server) = parsed.server {
            if let Some(domain) = server.public_domain {
                let domain = domain.trim().to_string();
                if domain.is_empty() {
                    bail!(Error::Configuration(format!(
                        "invalid config '{}': public_domain must not be empty",
                        path.display()
                    )));
                }
                self.public_domain = domain;
            }
            if let Some(private) = server.private {
                self.private_server = private;
            }
        }

        if let Some(paths) = parsed.paths {
            macro_rules! overlay {
                ($field:ident) => {
                    if let Some(value) = paths.$field {
                        self.$field = value;
                    }
                };
            }
            overlay!(webroot);
            overlay!(ftproot);
            overlay!(vhost_dir);
            overlay!(solr_root);
            overlay!(hudson_jobs);
            overlay!(drush_aliases);
            overlay!(git_root);
            overlay!(template_dir);
            overlay!(ldap_marker);
            overlay!(private_marker);
            overlay!(lock_dir);
        }

        Ok(())
    }

    /// The owner for project trees: the LDAP group named by the marker file
    /// when one exists, else the web server group.
    pub fn resolve_owner(&self) -> Result<String> {
        if !self.ldap_marker.exists() {
            return Ok(self.web_group.clone());
        }
        let group = fs::read_to_string(&self.ldap_marker)
            .with_context(|| {
                format!("reading LDAP group marker '{}'", self.ldap_marker.display())
            })?
            .trim()
            .to_string();
        if group.is_empty() {
            bail!(Error::Configuration(format!(
                "LDAP group marker '{}' is empty",
                self.ldap_marker.display()
            )));
        }
        Ok(group)
    }

    /// Private servers use bare wildcard vhost aliases instead of the
    /// public hosting domain.
    pub fn is_private_server(&self) -> bool {
        self.private_server || self.private_marker.exists()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileToml {
    server: Option<ServerToml>,
    paths: Option<PathsToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerToml {
    public_domain: Option<String>,
    private: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsToml {
    webroot: Option<PathBuf>,
    ftproot: Option<PathBuf>,
    vhost_dir: Option<PathBuf>,
    solr_root: Option<PathBuf>,
    hudson_jobs: Option<PathBuf>,
    drush_aliases: Option<PathBuf>,
    git_root: Option<PathBuf>,
    template_dir: Option<PathBuf>,
    ldap_marker: Option<PathBuf>,
    private_marker: Option<PathBuf>,
    lock_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ubuntu_constants() {
        let profile = PlatformProfile::for_distro(Distro::Ubuntu);
        assert_eq!(profile.web_group, "www-data");
        assert_eq!(profile.hudson_group, "nogroup");
        assert_eq!(profile.tomcat_version, 6);
        assert_eq!(profile.mysql_service, "mysql");
        assert_eq!(profile.webroot, PathBuf::from("/var/www"));
        assert_eq!(
            profile.vhost_dir,
            PathBuf::from("/etc/apache2/sites-available")
        );
    }

    #[test]
    fn test_centos_constants() {
        let profile = PlatformProfile::for_distro(Distro::Centos);
        assert_eq!(profile.web_group, "apache");
        assert_eq!(profile.hudson_group, "hudson");
        assert_eq!(profile.tomcat_version, 5);
        assert_eq!(profile.mysql_service, "mysqld");
        assert_eq!(profile.webroot, PathBuf::from("/var/www/html"));
        assert_eq!(profile.vhost_dir, PathBuf::from("/etc/httpd/conf/vhosts"));
    }

    #[test]
    fn test_config_overlays_named_fields_only() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        fs::write(
            &config,
            "[server]\npublic_domain = \"sites.example.net\"\n\n[paths]\nwebroot = \"/srv/www\"\n",
        )
        .unwrap();

        let mut profile = PlatformProfile::for_distro(Distro::Ubuntu);
        profile.apply_config(&config).unwrap();

        assert_eq!(profile.public_domain, "sites.example.net");
        assert_eq!(profile.webroot, PathBuf::from("/srv/www"));
        // Untouched field keeps its default.
        assert_eq!(profile.ftproot, PathBuf::from("/srv/ftp/site-builder"));
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        fs::write(&config, "[server]\nwebserver_group = \"www\"\n").unwrap();

        let mut profile = PlatformProfile::for_distro(Distro::Ubuntu);
        assert!(profile.apply_config(&config).is_err());
    }

    #[test]
    fn test_resolve_owner_defaults_to_web_group() {
        let temp = TempDir::new().unwrap();
        let mut profile = PlatformProfile::for_distro(Distro::Centos);
        profile.ldap_marker = temp.path().join("ldapgroup");

        assert_eq!(profile.resolve_owner().unwrap(), "apache");
    }

    #[test]
    fn test_resolve_owner_reads_marker() {
        let temp = TempDir::new().unwrap();
        let mut profile = PlatformProfile::for_distro(Distro::Ubuntu);
        profile.ldap_marker = temp.path().join("ldapgroup");
        fs::write(&profile.ldap_marker, "eng-team\n").unwrap();

        assert_eq!(profile.resolve_owner().unwrap(), "eng-team");
    }

    #[test]
    fn test_private_server_marker() {
        let temp = TempDir::new().unwrap();
        let mut profile = PlatformProfile::for_distro(Distro::Ubuntu);
        profile.private_marker = temp.path().join("private");
        assert!(!profile.is_private_server());

        fs::write(&profile.private_marker, "").unwrap();
        assert!(profile.is_private_server());
    }
}
