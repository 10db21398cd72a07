//! Typed failure taxonomy for lifecycle operations.
//!
//! Call sites propagate through `anyhow` for context chaining; the variants
//! here are the stable, matchable failure classes. Recover them from an
//! `anyhow::Error` chain with `downcast_ref::<Error>()`.

use crate::environment::Environment;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid platform profile, unsupported distribution,
    /// unreadable config.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller passed something unusable (e.g. `update` without an
    /// environment, or a project name with path separators).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A delegated process exited non-zero or could not be spawned.
    /// Carries the command identity and the resource path involved.
    #[error("command `{command}` failed on {path}: {detail}")]
    CommandFailure {
        command: String,
        path: String,
        detail: String,
    },

    /// Database export failed. Raised eagerly so a backup run aborts
    /// before producing a partial archive.
    #[error("database dump of `{database}` failed")]
    DataDump { database: String },

    /// Attached as context by the orchestrator so callers can tell which
    /// project/environment/step halted the run.
    #[error("{step} failed for {project}/{environment}")]
    Step {
        project: String,
        environment: Environment,
        step: &'static str,
    },

    /// Another lifecycle operation already holds this project's lock.
    #[error("project '{project}' is locked by another operation")]
    ProjectLocked { project: String },
}

/// Find the first typed [`Error`] in an `anyhow` chain, if any.
///
/// `downcast_ref` sees both context values and root causes; the chain walk
/// is a fallback for errors assembled outside anyhow's context machinery.
pub fn find_typed(err: &anyhow::Error) -> Option<&Error> {
    err.downcast_ref::<Error>()
        .or_else(|| err.chain().find_map(|cause| cause.downcast_ref::<Error>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_typed_through_context() {
        use anyhow::Context;

        let err: anyhow::Error = Err::<(), _>(Error::InvalidArgument("no env".into()))
            .context("outer context")
            .unwrap_err();

        match find_typed(&err) {
            Some(Error::InvalidArgument(msg)) => assert_eq!(msg, "no env"),
            other => panic!("expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_step_error_display() {
        let err = Error::Step {
            project: "mysite".into(),
            environment: Environment::Test,
            step: "vhost",
        };
        assert_eq!(err.to_string(), "vhost failed for mysite/test");
    }
}
