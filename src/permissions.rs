//! Permission reconciliation - the handler/environment/installed decision
//! table for project ownership and modes.
//!
//! The engine computes an ordered [`PermissionPlan`] first and applies it
//! second. Plan computation touches the filesystem read-only (walks are
//! sorted, so plans are deterministic and directly assertable in tests);
//! application shells `chown` and sets absolute modes in-process.
//!
//! Two invariants the table protects:
//! - an installed site's `settings.php` is never writable by the web
//!   process (mode 440), while an uninstalled site's must be (mode 660,
//!   the installer rewrites it);
//! - the files directory always ends up owned by the web server group -
//!   user uploads are its only legitimate state.
//!
//! The final ops of each environment's section force web-group ownership
//! on both settings files and the files tree. They are appended last on
//! purpose: sequential application means they win over the conditional
//! assignments above them.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::environment::Environment;
use crate::handler::{validate_project_name, Handler};
use crate::locator::locate;
use crate::platform::PlatformProfile;
use crate::process::Cmd;

/// Tells the engine whether the application is already installed in an
/// environment. Injected so the policy table stays independent of the
/// check mechanism.
pub trait InstallProbe {
    fn is_installed(&self, project: &str, environment: Environment) -> Result<bool>;
}

/// [`InstallProbe`] backed by drush: bootstrap succeeds only against an
/// installed site.
pub struct DrushProbe {
    profile: PlatformProfile,
}

impl DrushProbe {
    pub fn new(profile: &PlatformProfile) -> Self {
        DrushProbe {
            profile: profile.clone(),
        }
    }
}

impl InstallProbe for DrushProbe {
    fn is_installed(&self, project: &str, environment: Environment) -> Result<bool> {
        let desc = locate(project, environment, &self.profile);
        let result = Cmd::new("drush")
            .arg(format!("--root={}", desc.env_path.display()))
            .args(["status", "bootstrap"])
            .allow_fail()
            .run()?;
        Ok(result.success() && result.stdout.contains("Successful"))
    }
}

/// One ownership or mode assignment. Applied in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOp {
    Chown {
        path: PathBuf,
        owner: String,
        group: String,
        recursive: bool,
    },
    Chmod {
        path: PathBuf,
        mode: u32,
    },
    /// Recursive `g+w` - grants group write without resetting other bits.
    GroupWrite {
        path: PathBuf,
    },
}

/// Ordered assignments for one `(handler, environments, installed?)`
/// combination. Every path must exist before [`apply`] runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionPlan {
    pub ops: Vec<PermissionOp>,
}

impl PermissionPlan {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Compute the ownership/mode assignments for `handler` on `project`.
///
/// `environment` is required for `update` (single-environment rule) and
/// ignored otherwise.
pub fn plan(
    profile: &PlatformProfile,
    probe: &dyn InstallProbe,
    project: &str,
    handler: Handler,
    environment: Option<Environment>,
) -> Result<PermissionPlan> {
    validate_project_name(project)?;
    let owner = profile.resolve_owner()?;
    let environments = handler.target_environments(environment)?;
    let web = profile.web_group.as_str();

    let mut ops = Vec::new();

    // Project directory. New installs/imports/restores take ownership of
    // the whole tree; updates stay inside the one environment being
    // deployed and leave the files directory alone.
    match handler {
        Handler::Install | Handler::Import | Handler::Restore => {
            let project_path = profile.webroot.join(project);
            ops.push(PermissionOp::Chown {
                path: project_path.clone(),
                owner: owner.clone(),
                group: owner.clone(),
                recursive: true,
            });
            ops.push(PermissionOp::GroupWrite { path: project_path });
        }
        Handler::Update => {
            let desc = locate(project, environments[0], profile);
            // Prune the files directory from the walk entirely.
            let walker = WalkDir::new(&desc.env_path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.path() != desc.files_path);
            for entry in walker {
                let entry = entry.with_context(|| {
                    format!("walking '{}'", desc.env_path.display())
                })?;
                ops.push(PermissionOp::Chown {
                    path: entry.into_path(),
                    owner: owner.clone(),
                    group: owner.clone(),
                    recursive: false,
                });
            }
        }
    }

    // Files directory, per environment.
    for &env in &environments {
        let desc = locate(project, env, profile);
        match handler {
            Handler::Install => {
                ops.push(PermissionOp::Chmod {
                    path: desc.files_path.clone(),
                    mode: 0o770,
                });
                ops.push(PermissionOp::Chown {
                    path: desc.files_path.clone(),
                    owner: web.to_string(),
                    group: web.to_string(),
                    recursive: false,
                });
            }
            Handler::Import | Handler::Restore => {
                ops.push(PermissionOp::Chmod {
                    path: desc.files_path.clone(),
                    mode: 0o770,
                });
                for entry in WalkDir::new(&desc.files_path)
                    .min_depth(1)
                    .sort_by_file_name()
                {
                    let entry = entry.with_context(|| {
                        format!("walking '{}'", desc.files_path.display())
                    })?;
                    let mode = if entry.file_type().is_dir() { 0o770 } else { 0o660 };
                    ops.push(PermissionOp::Chmod {
                        path: entry.into_path(),
                        mode,
                    });
                }
                ops.push(PermissionOp::Chown {
                    path: desc.files_path.clone(),
                    owner: web.to_string(),
                    group: web.to_string(),
                    recursive: true,
                });
            }
            Handler::Update => {
                ops.push(PermissionOp::Chown {
                    path: desc.files_path.clone(),
                    owner: web.to_string(),
                    group: web.to_string(),
                    recursive: false,
                });
            }
        }
    }

    // Settings files, per environment, for every handler.
    for &env in &environments {
        let desc = locate(project, env, profile);
        let settings = desc.site_path.join("settings.php");
        let include = desc.site_path.join("platform.settings.php");

        let installed = probe.is_installed(project, env)?;
        if installed {
            // Installed sites must not let the web process rewrite their
            // own bootstrap configuration.
            ops.push(PermissionOp::Chmod {
                path: settings.clone(),
                mode: 0o440,
            });
            ops.push(PermissionOp::Chown {
                path: settings.clone(),
                owner: owner.clone(),
                group: web.to_string(),
                recursive: false,
            });
        } else {
            // The install process runs as the web server and writes here.
            ops.push(PermissionOp::Chmod {
                path: settings.clone(),
                mode: 0o660,
            });
            ops.push(PermissionOp::Chown {
                path: settings.clone(),
                owner: web.to_string(),
                group: web.to_string(),
                recursive: false,
            });
        }

        // The platform-managed include is read-only regardless of state.
        ops.push(PermissionOp::Chmod {
            path: include.clone(),
            mode: 0o440,
        });

        // Forced final pass: web group wins on both settings files and the
        // files tree, overriding the conditional assignments above.
        ops.push(PermissionOp::Chown {
            path: settings,
            owner: web.to_string(),
            group: web.to_string(),
            recursive: false,
        });
        ops.push(PermissionOp::Chown {
            path: include,
            owner: web.to_string(),
            group: web.to_string(),
            recursive: false,
        });
        ops.push(PermissionOp::Chown {
            path: desc.files_path,
            owner: web.to_string(),
            group: web.to_string(),
            recursive: true,
        });
    }

    Ok(PermissionPlan { ops })
}

/// Execute a plan in order. Paths are a caller precondition; a missing
/// path fails the run at that op.
pub fn apply(plan: &PermissionPlan) -> Result<()> {
    for op in &plan.ops {
        match op {
            PermissionOp::Chown {
                path,
                owner,
                group,
                recursive,
            } => {
                let mut cmd = Cmd::new("chown");
                if *recursive {
                    cmd = cmd.arg("-R");
                }
                cmd.arg(format!("{}:{}", owner, group))
                    .arg_path(path)
                    .run()?;
            }
            PermissionOp::Chmod { path, mode } => {
                fs::set_permissions(path, fs::Permissions::from_mode(*mode))
                    .with_context(|| format!("setting mode on '{}'", path.display()))?;
            }
            PermissionOp::GroupWrite { path } => {
                Cmd::new("chmod")
                    .args(["-R", "g+w"])
                    .arg_path(path)
                    .run()?;
            }
        }
    }
    Ok(())
}

/// The `apply_permissions` contract: compute the plan and execute it.
pub fn reconcile(
    profile: &PlatformProfile,
    probe: &dyn InstallProbe,
    project: &str,
    handler: Handler,
    environment: Option<Environment>,
) -> Result<()> {
    let plan = plan(profile, probe, project, handler, environment)?;
    println!(
        "[permissions] applying {} assignments for {} ({})",
        plan.len(),
        project,
        handler
    );
    apply(&plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Distro;
    use tempfile::TempDir;

    struct FixedProbe(bool);

    impl InstallProbe for FixedProbe {
        fn is_installed(&self, _project: &str, _env: Environment) -> Result<bool> {
            Ok(self.0)
        }
    }

    /// Profile rooted in a temp dir, with a full three-environment project
    /// tree beneath it.
    fn fixture() -> (TempDir, PlatformProfile) {
        let temp = TempDir::new().unwrap();
        let mut profile = PlatformProfile::for_distro(Distro::Ubuntu);
        profile.webroot = temp.path().join("www");
        profile.ldap_marker = temp.path().join("ldapgroup");

        for env in Environment::REGISTRY {
            let site = profile
                .webroot
                .join("mysite")
                .join(env.as_str())
                .join("sites/default");
            fs::create_dir_all(site.join("files")).unwrap();
            fs::write(site.join("settings.php"), "<?php\n").unwrap();
            fs::write(site.join("platform.settings.php"), "<?php\n").unwrap();
        }
        (temp, profile)
    }

    #[test]
    fn test_install_files_dir_single_mode_op() {
        let (_temp, profile) = fixture();
        // Deep content that install must NOT touch per-file.
        let files = profile.webroot.join("mysite/dev/sites/default/files");
        fs::create_dir_all(files.join("uploads")).unwrap();
        fs::write(files.join("uploads/a.png"), "x").unwrap();

        let plan = plan(&profile, &FixedProbe(false), "mysite", Handler::Install, None).unwrap();

        let modes: Vec<_> = plan
            .ops
            .iter()
            .filter(|op| {
                matches!(op, PermissionOp::Chmod { path, .. } if path.starts_with(&files))
            })
            .collect();
        // Exactly one mode op on the files dir itself, none beneath it.
        assert_eq!(
            modes,
            vec![&PermissionOp::Chmod {
                path: files.clone(),
                mode: 0o770
            }]
        );
    }

    #[test]
    fn test_import_files_dir_recursive_modes() {
        let (_temp, profile) = fixture();
        let files = profile.webroot.join("mysite/dev/sites/default/files");
        fs::create_dir_all(files.join("uploads")).unwrap();
        fs::write(files.join("uploads/a.png"), "x").unwrap();
        fs::write(files.join("b.txt"), "x").unwrap();

        let plan = plan(&profile, &FixedProbe(false), "mysite", Handler::Import, None).unwrap();

        assert!(plan.ops.contains(&PermissionOp::Chmod {
            path: files.clone(),
            mode: 0o770
        }));
        assert!(plan.ops.contains(&PermissionOp::Chmod {
            path: files.join("uploads"),
            mode: 0o770
        }));
        assert!(plan.ops.contains(&PermissionOp::Chmod {
            path: files.join("uploads/a.png"),
            mode: 0o660
        }));
        assert!(plan.ops.contains(&PermissionOp::Chmod {
            path: files.join("b.txt"),
            mode: 0o660
        }));
        // Web group takes the whole tree.
        assert!(plan.ops.contains(&PermissionOp::Chown {
            path: files,
            owner: "www-data".into(),
            group: "www-data".into(),
            recursive: true
        }));
    }

    #[test]
    fn test_update_prunes_files_directory() {
        let (_temp, profile) = fixture();
        let env_root = profile.webroot.join("mysite/test");
        let files = env_root.join("sites/default/files");
        fs::write(files.join("upload.bin"), "x").unwrap();
        fs::write(env_root.join("index.php"), "<?php\n").unwrap();

        let plan = plan(
            &profile,
            &FixedProbe(true),
            "mysite",
            Handler::Update,
            Some(Environment::Test),
        )
        .unwrap();

        // The per-path ownership walk covers the environment root but
        // nothing under the files directory.
        assert!(plan.ops.contains(&PermissionOp::Chown {
            path: env_root.join("index.php"),
            owner: "www-data".into(),
            group: "www-data".into(),
            recursive: false
        }));
        assert!(!plan
            .ops
            .iter()
            .any(|op| matches!(op, PermissionOp::Chown { path, .. } if path == &files.join("upload.bin"))));

        // No recursive project-wide chown and no mode reset on files.
        assert!(!plan.ops.iter().any(|op| matches!(
            op,
            PermissionOp::Chown { recursive: true, path, .. } if path == &profile.webroot.join("mysite")
        )));
        assert!(!plan
            .ops
            .iter()
            .any(|op| matches!(op, PermissionOp::Chmod { path, .. } if path == &files)));
    }

    #[test]
    fn test_update_touches_only_named_environment() {
        let (_temp, profile) = fixture();
        let plan = plan(
            &profile,
            &FixedProbe(true),
            "mysite",
            Handler::Update,
            Some(Environment::Test),
        )
        .unwrap();

        let dev_root = profile.webroot.join("mysite/dev");
        let live_root = profile.webroot.join("mysite/live");
        for op in &plan.ops {
            let path = match op {
                PermissionOp::Chown { path, .. } => path,
                PermissionOp::Chmod { path, .. } => path,
                PermissionOp::GroupWrite { path } => path,
            };
            assert!(
                !path.starts_with(&dev_root) && !path.starts_with(&live_root),
                "update plan leaked outside test env: {}",
                path.display()
            );
        }
    }

    #[test]
    fn test_update_without_environment_is_invalid() {
        let (_temp, profile) = fixture();
        let err = plan(&profile, &FixedProbe(true), "mysite", Handler::Update, None).unwrap_err();
        assert!(matches!(
            crate::error::find_typed(&err),
            Some(crate::error::Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_settings_mode_follows_installed_state() {
        let (_temp, profile) = fixture();
        let settings = profile.webroot.join("mysite/dev/sites/default/settings.php");

        let installed =
            plan(&profile, &FixedProbe(true), "mysite", Handler::Install, None).unwrap();
        assert!(installed.ops.contains(&PermissionOp::Chmod {
            path: settings.clone(),
            mode: 0o440
        }));

        let fresh = plan(&profile, &FixedProbe(false), "mysite", Handler::Install, None).unwrap();
        assert!(fresh.ops.contains(&PermissionOp::Chmod {
            path: settings,
            mode: 0o660
        }));
    }

    #[test]
    fn test_forced_final_pass_wins() {
        let (temp, mut profile) = fixture();
        profile.ldap_marker = temp.path().join("marker");
        fs::write(&profile.ldap_marker, "eng-team\n").unwrap();

        let plan = plan(&profile, &FixedProbe(true), "mysite", Handler::Install, None).unwrap();

        // Installed branch assigns settings.php to the resolved owner...
        let settings = profile.webroot.join("mysite/live/sites/default/settings.php");
        let chowns: Vec<_> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                PermissionOp::Chown { path, owner, .. } if path == &settings => Some(owner.clone()),
                _ => None,
            })
            .collect();
        // ...but the forced pass re-assigns it to the web group afterward.
        assert_eq!(chowns, vec!["eng-team".to_string(), "www-data".to_string()]);

        // The plan's last op per environment re-owns the files tree.
        let last = plan.ops.last().unwrap();
        assert_eq!(
            last,
            &PermissionOp::Chown {
                path: profile.webroot.join("mysite/live/sites/default/files"),
                owner: "www-data".into(),
                group: "www-data".into(),
                recursive: true
            }
        );
    }

    #[test]
    fn test_install_project_tree_ownership() {
        let (_temp, profile) = fixture();
        let plan = plan(&profile, &FixedProbe(false), "mysite", Handler::Install, None).unwrap();

        assert_eq!(
            plan.ops[0],
            PermissionOp::Chown {
                path: profile.webroot.join("mysite"),
                owner: "www-data".into(),
                group: "www-data".into(),
                recursive: true
            }
        );
        assert_eq!(
            plan.ops[1],
            PermissionOp::GroupWrite {
                path: profile.webroot.join("mysite")
            }
        );
    }

    #[test]
    fn test_ldap_owner_used_for_project_tree() {
        let (temp, mut profile) = fixture();
        profile.ldap_marker = temp.path().join("marker");
        fs::write(&profile.ldap_marker, "eng-team\n").unwrap();

        let plan = plan(&profile, &FixedProbe(false), "mysite", Handler::Restore, None).unwrap();
        assert_eq!(
            plan.ops[0],
            PermissionOp::Chown {
                path: profile.webroot.join("mysite"),
                owner: "eng-team".into(),
                group: "eng-team".into(),
                recursive: true
            }
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let (_temp, profile) = fixture();
        let files = profile.webroot.join("mysite/dev/sites/default/files");
        for name in ["c", "a", "b"] {
            fs::write(files.join(name), "x").unwrap();
        }

        let first = plan(&profile, &FixedProbe(false), "mysite", Handler::Import, None).unwrap();
        let second = plan(&profile, &FixedProbe(false), "mysite", Handler::Import, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_bad_project_name() {
        let (_temp, profile) = fixture();
        assert!(plan(
            &profile,
            &FixedProbe(false),
            "../escape",
            Handler::Install,
            None
        )
        .is_err());
    }
}
