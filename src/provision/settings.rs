//! Settings include seeding.
//!
//! `settings.php` gains a single include of the platform-managed settings
//! file, and that file is written from its template. Re-running is a
//! no-op when the include is already present.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;

use crate::locator::ResourceDescriptor;
use crate::template::Emitter;

/// Filename of the platform-managed include next to `settings.php`.
pub const INCLUDE_FILE: &str = "platform.settings.php";

const INCLUDE_LINE: &str = "include 'platform.settings.php';";

pub fn seed(emitter: &dyn Emitter, desc: &ResourceDescriptor) -> Result<()> {
    let settings = desc.site_path.join("settings.php");

    let mut content = if settings.exists() {
        fs::read_to_string(&settings)
            .with_context(|| format!("reading '{}'", settings.display()))?
    } else {
        String::new()
    };

    if !content.contains(INCLUDE_LINE) {
        content.push_str("\n/* Added by site-builder */\n");
        content.push_str(INCLUDE_LINE);
        content.push('\n');
        fs::create_dir_all(&desc.site_path)
            .with_context(|| format!("creating '{}'", desc.site_path.display()))?;
        fs::write(&settings, content)
            .with_context(|| format!("writing '{}'", settings.display()))?;
    }

    let text = emitter.render(INCLUDE_FILE, &BTreeMap::new())?;
    emitter.write(&desc.site_path.join(INCLUDE_FILE), &text, 0o640)?;
    Ok(())
}
