//! Preflight checks for host tool availability.
//!
//! Validates required tools before a lifecycle run so the operation fails
//! with one aggregated message instead of a cryptic mid-run error.

use anyhow::{bail, Result};

use crate::platform::{Distro, PlatformProfile};

/// Check if a command is available on the host.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools every lifecycle operation relies on, as (command, package).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("mysql", "mysql-client"),
    ("mysqldump", "mysql-client"),
    ("git", "git"),
    ("chown", "coreutils"),
    ("chmod", "coreutils"),
];

/// Check that specific tools are available.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *package));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check the full tool set for this platform. Ubuntu additionally needs
/// `a2ensite` to enable freshly written vhosts.
pub fn check_host_tools(profile: &PlatformProfile) -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)?;
    if profile.distro == Distro::Ubuntu {
        check_required_tools(&[("a2ensite", "apache2")])?;
    }
    Ok(())
}
