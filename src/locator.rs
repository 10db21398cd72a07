//! Resource locator - pure derivation of per-environment paths and names.
//!
//! `locate()` is string concatenation only: no I/O, no failure modes, and
//! the same inputs always yield the same descriptor. Descriptors are
//! recomputed at each call site instead of cached, so a profile change is
//! never shadowed by stale paths.

use std::path::PathBuf;

use crate::environment::Environment;
use crate::platform::PlatformProfile;

/// Derived bundle of paths and identifiers for one `(project, environment)`
/// pair. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub project: String,
    pub environment: Environment,
    /// `webroot/{project}`
    pub project_path: PathBuf,
    /// `webroot/{project}/{env}` - the environment's document root.
    pub env_path: PathBuf,
    /// `.../sites/default`
    pub site_path: PathBuf,
    /// `.../sites/default/files` - the only web-writable tree.
    pub files_path: PathBuf,
    /// `{project}_{env}`, prefixed `000_` for live.
    pub vhost_filename: String,
    pub vhost_path: PathBuf,
    /// `{project}_{env}`
    pub db_name: String,
    /// One database user per project, shared across its environments.
    pub db_username: String,
    /// Solr index data directory.
    pub solr_path: PathBuf,
    /// Tomcat Catalina context file telling the container where the index is.
    pub solr_context_path: PathBuf,
    /// Hudson job directory for the environment's cron job.
    pub cron_job_dir: PathBuf,
    pub drush_alias_path: PathBuf,
    /// `{project}_{env}` - keyspace prefix shared with the vhost template.
    pub memcache_prefix: String,
}

/// Derive every resource path/identifier for `(project, environment)`.
pub fn locate(
    project: &str,
    environment: Environment,
    profile: &PlatformProfile,
) -> ResourceDescriptor {
    let env = environment.as_str();
    let pair = format!("{}_{}", project, env);

    // Live sorts ahead of every other vhost file the server loads.
    let vhost_filename = if environment.is_live() {
        format!("000_{}", pair)
    } else {
        pair.clone()
    };

    let project_path = profile.webroot.join(project);
    let env_path = project_path.join(env);
    let site_path = env_path.join("sites/default");
    let files_path = site_path.join("files");

    ResourceDescriptor {
        project: project.to_string(),
        environment,
        vhost_path: profile.vhost_dir.join(&vhost_filename),
        vhost_filename,
        db_name: pair.clone(),
        db_username: project.to_string(),
        solr_path: profile.solr_root.join(project).join(env),
        solr_context_path: PathBuf::from(format!(
            "/etc/tomcat{}/Catalina/localhost/{}.xml",
            profile.tomcat_version, pair
        )),
        cron_job_dir: profile.hudson_jobs.join(format!("cron_{}", pair)),
        drush_alias_path: profile
            .drush_aliases
            .join(format!("{}.alias.drushrc.php", pair)),
        memcache_prefix: pair,
        project_path,
        env_path,
        site_path,
        files_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Distro;

    fn profile() -> PlatformProfile {
        PlatformProfile::for_distro(Distro::Ubuntu)
    }

    #[test]
    fn test_locate_is_deterministic() {
        let profile = profile();
        let a = locate("mysite", Environment::Dev, &profile);
        let b = locate("mysite", Environment::Dev, &profile);
        assert_eq!(a, b);
    }

    #[test]
    fn test_live_vhost_filename_prefix() {
        let profile = profile();
        let live = locate("mysite", Environment::Live, &profile);
        assert_eq!(live.vhost_filename, "000_mysite_live");

        let dev = locate("mysite", Environment::Dev, &profile);
        assert_eq!(dev.vhost_filename, "mysite_dev");
        let test = locate("mysite", Environment::Test, &profile);
        assert_eq!(test.vhost_filename, "mysite_test");
    }

    #[test]
    fn test_database_naming() {
        let profile = profile();
        let desc = locate("mysite", Environment::Test, &profile);
        assert_eq!(desc.db_name, "mysite_test");
        assert_eq!(desc.db_username, "mysite");
    }

    #[test]
    fn test_paths_follow_profile() {
        let profile = PlatformProfile::for_distro(Distro::Centos);
        let desc = locate("mysite", Environment::Dev, &profile);
        assert_eq!(
            desc.project_path,
            PathBuf::from("/var/www/html/mysite")
        );
        assert_eq!(
            desc.files_path,
            PathBuf::from("/var/www/html/mysite/dev/sites/default/files")
        );
        assert_eq!(
            desc.vhost_path,
            PathBuf::from("/etc/httpd/conf/vhosts/mysite_dev")
        );
        assert_eq!(
            desc.solr_context_path,
            PathBuf::from("/etc/tomcat5/Catalina/localhost/mysite_dev.xml")
        );
    }

    #[test]
    fn test_job_and_alias_names() {
        let profile = profile();
        let desc = locate("mysite", Environment::Live, &profile);
        assert_eq!(
            desc.cron_job_dir,
            PathBuf::from("/var/lib/hudson/jobs/cron_mysite_live")
        );
        assert_eq!(
            desc.drush_alias_path,
            PathBuf::from("/opt/drush/aliases/mysite_live.alias.drushrc.php")
        );
        assert_eq!(desc.memcache_prefix, "mysite_live");
    }
}
