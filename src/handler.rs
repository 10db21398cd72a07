//! Lifecycle actions and the environment subset they act on.
//!
//! Code updates touch exactly one named environment; every other action
//! (new installs, imports, restores) touches all three. This rule is shared
//! by the orchestrator and the permission engine.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;

use crate::environment::Environment;
use crate::error::Error;

/// The requested lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    Install,
    Import,
    Restore,
    Update,
}

impl Handler {
    pub fn as_str(self) -> &'static str {
        match self {
            Handler::Install => "install",
            Handler::Import => "import",
            Handler::Restore => "restore",
            Handler::Update => "update",
        }
    }

    /// The environments this action operates on, in registry order.
    ///
    /// `update` requires a single named environment; all other handlers
    /// fan out over the full registry and ignore the override.
    pub fn target_environments(
        self,
        environment: Option<Environment>,
    ) -> Result<Vec<Environment>> {
        match self {
            Handler::Update => {
                let env = environment.ok_or_else(|| {
                    Error::InvalidArgument(
                        "update requires a target environment".to_string(),
                    )
                })?;
                Ok(vec![env])
            }
            _ => Ok(Environment::REGISTRY.to_vec()),
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Handler {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "install" => Ok(Handler::Install),
            "import" => Ok(Handler::Import),
            "restore" => Ok(Handler::Restore),
            "update" => Ok(Handler::Update),
            other => Err(Error::InvalidArgument(format!(
                "unknown handler '{}' (expected install, import, restore, or update)",
                other
            ))),
        }
    }
}

/// Project names become database identifiers, git branch names, and path
/// components; restrict them before any side effect.
pub fn validate_project_name(project: &str) -> Result<()> {
    let ok = !project.is_empty()
        && project
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !ok {
        return Err(Error::InvalidArgument(format!(
            "invalid project name '{}' (allowed: a-z, 0-9, '_', '-')",
            project
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::find_typed;

    #[test]
    fn test_update_requires_environment() {
        let err = Handler::Update.target_environments(None).unwrap_err();
        assert!(matches!(
            find_typed(&err),
            Some(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_update_targets_only_named_environment() {
        let envs = Handler::Update
            .target_environments(Some(Environment::Test))
            .unwrap();
        assert_eq!(envs, vec![Environment::Test]);
    }

    #[test]
    fn test_other_handlers_target_full_registry() {
        for handler in [Handler::Install, Handler::Import, Handler::Restore] {
            let envs = handler.target_environments(None).unwrap();
            assert_eq!(envs, Environment::REGISTRY.to_vec());
            // Override is ignored outside of update.
            let envs = handler
                .target_environments(Some(Environment::Live))
                .unwrap();
            assert_eq!(envs, Environment::REGISTRY.to_vec());
        }
    }

    #[test]
    fn test_handler_from_str() {
        assert_eq!("install".parse::<Handler>().unwrap(), Handler::Install);
        assert_eq!("UPDATE".parse::<Handler>().unwrap(), Handler::Update);
        assert!("deploy".parse::<Handler>().is_err());
    }

    #[test]
    fn test_validate_project_name() {
        assert!(validate_project_name("my-site_2").is_ok());
        assert!(validate_project_name("").is_err());
        assert!(validate_project_name("My Site").is_err());
        assert!(validate_project_name("../etc").is_err());
        assert!(validate_project_name("a;drop").is_err());
    }
}
