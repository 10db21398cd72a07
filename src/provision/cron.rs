//! Hudson cron jobs - one periodic drupal cron invocation per environment.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;

use crate::locator::ResourceDescriptor;
use crate::platform::PlatformProfile;
use crate::process::Cmd;
use crate::template::Emitter;

pub fn create_job(
    profile: &PlatformProfile,
    emitter: &dyn Emitter,
    desc: &ResourceDescriptor,
) -> Result<()> {
    fs::create_dir_all(&desc.cron_job_dir)
        .with_context(|| format!("creating '{}'", desc.cron_job_dir.display()))?;

    let mut values = BTreeMap::new();
    values.insert(
        "site_path".to_string(),
        desc.env_path.display().to_string(),
    );
    let text = emitter.render("hudson.drupal.cron", &values)?;
    emitter.write(&desc.cron_job_dir.join("config.xml"), &text, 0o644)?;

    Cmd::new("chown")
        .arg("-R")
        .arg(format!("hudson:{}", profile.hudson_group))
        .arg_path(&desc.cron_job_dir)
        .run()?;

    Ok(())
}
