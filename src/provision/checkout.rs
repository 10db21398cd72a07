//! Environment working trees, seeded from the central repository.
//!
//! Every project has a bare repository under the git root with a branch
//! named after the project. `dev` tracks the branch head; `test` and
//! `live` are pinned to a `{project}.{tag}` release tag.

use anyhow::{Context, Result};
use std::fs;

use crate::environment::Environment;
use crate::handler::validate_project_name;
use crate::locator::locate;
use crate::platform::PlatformProfile;
use crate::process::Cmd;

pub fn seed_environments(profile: &PlatformProfile, project: &str, tag: &str) -> Result<()> {
    validate_project_name(project)?;

    let project_path = profile.webroot.join(project);
    if project_path.exists() {
        fs::remove_dir_all(&project_path)
            .with_context(|| format!("clearing '{}'", project_path.display()))?;
    }

    let source = profile.git_root.join(project);
    for env in Environment::REGISTRY {
        let desc = locate(project, env, profile);
        println!("[{}:{}] cloning working tree", project, env);

        Cmd::new("git")
            .args(["clone", "-l"])
            .arg(source.display().to_string())
            .args(["-b", project])
            .arg_path(&desc.env_path)
            .error_msg("cloning environment working tree failed")
            .run()?;

        if env == Environment::Dev {
            Cmd::new("git")
                .args(["checkout", project])
                .current_dir(&desc.env_path)
                .run()?;
        } else {
            Cmd::new("git")
                .arg("fetch")
                .current_dir(&desc.env_path)
                .run()?;
            Cmd::new("git")
                .args(["reset", "--hard", &format!("{}.{}", project, tag)])
                .current_dir(&desc.env_path)
                .run()?;
        }
    }

    Ok(())
}
