//! Structured command execution.
//!
//! Every delegated process runs through [`Cmd`]: an argv list handed to the
//! OS directly, never an interpolated shell string. Failures become typed
//! [`Error::CommandFailure`] values carrying the program name and the
//! resource path involved, so callers can report which resource a step was
//! touching when it died.
//!
//! # Example
//!
//! ```rust,ignore
//! use site_builder::process::Cmd;
//!
//! Cmd::new("chown")
//!     .arg("www-data:www-data")
//!     .arg_path(&files_dir)
//!     .error_msg("setting files directory ownership failed")
//!     .run()?;
//! ```

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::Error;

/// Captured result of a finished command.
#[derive(Debug)]
pub struct CmdResult {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    success: bool,
}

impl CmdResult {
    pub fn success(&self) -> bool {
        self.success
    }
}

/// Builder for one external command invocation.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    /// Last path argument; reported as the involved resource on failure.
    resource: Option<PathBuf>,
    error_msg: Option<String>,
    allow_fail: bool,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Cmd {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            resource: None,
            error_msg: None,
            allow_fail: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add a path argument and remember it as the involved resource.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.display().to_string());
        self.resource = Some(path.to_path_buf());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Extra context included in the failure error.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Non-zero exit is returned as a normal [`CmdResult`] instead of an
    /// error. Spawn failures still error.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    fn resource_display(&self) -> String {
        match (&self.resource, &self.cwd) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(dir)) => dir.display().to_string(),
            (None, None) => "-".to_string(),
        }
    }

    fn failure(&self, detail: String) -> Error {
        let detail = match &self.error_msg {
            Some(msg) if detail.is_empty() => msg.clone(),
            Some(msg) => format!("{} ({})", msg, detail),
            None => detail,
        };
        Error::CommandFailure {
            command: self.program.clone(),
            path: self.resource_display(),
            detail,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        command
    }

    /// Run to completion, capturing stdout/stderr.
    pub fn run(self) -> Result<CmdResult> {
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.failure(format!("could not spawn: {}", e)))?;

        let result = CmdResult {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        };

        if !result.success && !self.allow_fail {
            let detail = result.stderr.trim().to_string();
            return Err(self.failure(detail).into());
        }
        Ok(result)
    }

    /// Run with inherited stdio so the operator sees live output.
    pub fn run_interactive(self) -> Result<()> {
        let status = self
            .command()
            .status()
            .map_err(|e| self.failure(format!("could not spawn: {}", e)))?;

        if !status.success() && !self.allow_fail {
            return Err(self.failure(format!("exit status {}", status)).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::find_typed;

    #[test]
    fn test_run_captures_stdout() {
        let result = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn test_nonzero_exit_is_typed_failure() {
        let err = Cmd::new("false").run().unwrap_err();
        match find_typed(&err) {
            Some(Error::CommandFailure { command, .. }) => assert_eq!(command, "false"),
            other => panic!("expected CommandFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_allow_fail_returns_result() {
        let result = Cmd::new("false").allow_fail().run().unwrap();
        assert!(!result.success());
    }

    #[test]
    fn test_spawn_failure_is_typed() {
        let err = Cmd::new("definitely_not_a_real_command_12345")
            .run()
            .unwrap_err();
        assert!(matches!(
            find_typed(&err),
            Some(Error::CommandFailure { .. })
        ));
    }

    #[test]
    fn test_failure_names_resource_path() {
        let err = Cmd::new("false")
            .arg_path(Path::new("/var/www/mysite"))
            .run()
            .unwrap_err();
        match find_typed(&err) {
            Some(Error::CommandFailure { path, .. }) => {
                assert_eq!(path, "/var/www/mysite");
            }
            other => panic!("expected CommandFailure, got {:?}", other),
        }
    }
}
