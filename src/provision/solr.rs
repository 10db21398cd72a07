//! Solr index provisioning.
//!
//! Each environment gets its own index data directory seeded from the
//! sample solr data, plus a Catalina context file telling Tomcat where the
//! index lives. Tomcat's service account owns both.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;

use crate::filesystem::copy_dir_recursive;
use crate::locator::ResourceDescriptor;
use crate::platform::PlatformProfile;
use crate::process::Cmd;
use crate::template::Emitter;

pub fn create_index(
    profile: &PlatformProfile,
    emitter: &dyn Emitter,
    desc: &ResourceDescriptor,
) -> Result<()> {
    let project_dir = profile.solr_root.join(&desc.project);
    fs::create_dir_all(&project_dir)
        .with_context(|| format!("creating '{}'", project_dir.display()))?;

    // Recreate the data directory from the sample index.
    if desc.solr_path.exists() {
        fs::remove_dir_all(&desc.solr_path)
            .with_context(|| format!("clearing '{}'", desc.solr_path.display()))?;
    }
    copy_dir_recursive(&profile.template_dir.join("solr"), &desc.solr_path)?;

    Cmd::new("chown")
        .arg("-R")
        .arg(format!("{0}:{0}", profile.tomcat_owner))
        .arg_path(&project_dir)
        .run()?;

    // Tell Tomcat where the index is located.
    let mut values = BTreeMap::new();
    values.insert(
        "solr_path".to_string(),
        format!("{}/{}", desc.project, desc.environment),
    );
    let text = emitter.render("tomcat_solr_home.xml", &values)?;
    emitter.write(&desc.solr_context_path, &text, 0o644)?;

    Cmd::new("chown")
        .arg(format!("{0}:{0}", profile.tomcat_owner))
        .arg_path(&desc.solr_context_path)
        .run()?;

    Ok(())
}
