//! Drush alias files, one per `(project, environment)`.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::locator::ResourceDescriptor;
use crate::template::Emitter;

pub fn create_alias(emitter: &dyn Emitter, desc: &ResourceDescriptor) -> Result<()> {
    let mut values = BTreeMap::new();
    values.insert("project".to_string(), desc.project.clone());
    values.insert(
        "environment".to_string(),
        desc.environment.as_str().to_string(),
    );
    values.insert(
        "vhost_path".to_string(),
        desc.vhost_path.display().to_string(),
    );
    values.insert("root".to_string(), desc.env_path.display().to_string());

    let text = emitter.render("drush.alias.drushrc.php", &values)?;
    emitter.write(&desc.drush_alias_path, &text, 0o644)?;
    Ok(())
}
