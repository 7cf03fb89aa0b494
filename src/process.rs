//! External command execution.
//!
//! Every tool this crate drives (`ditto`, `codesign`, `spctl`, `xcrun`) goes
//! through a [`CommandRunner`]. The production [`SystemRunner`] streams child
//! output live while optionally keeping a combined copy, and in dry-run mode
//! only prints what it would have executed.

use crate::config::OutputConfig;
use crate::error::{NotarizeError, Result};
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;

/// Replacement shown instead of a password argument
pub const REDACTED_PASSWORD: &str = "XxXxXxXxXxXxXxXxX";

/// Flags whose following argument is a secret
const PASSWORD_FLAGS: &[&str] = &["--password", "-p"];

/// A program invocation: program name, arguments and optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument, rejecting paths that are not valid UTF-8
    pub fn path_arg(self, path: &Path) -> Result<Self> {
        let s = path.to_str().ok_or_else(|| {
            NotarizeError::InvalidConfig(format!("Invalid path: {}", path.display()))
        })?;
        Ok(self.arg(s))
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// True if any argument equals `needle`
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Command line with password arguments redacted
    pub fn redacted(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        let mut expect_password = false;
        for arg in &self.args {
            if expect_password {
                parts.push(REDACTED_PASSWORD.to_string());
                expect_password = false;
                continue;
            }
            if let Some((flag, _)) = arg.split_once('=')
                && PASSWORD_FLAGS.contains(&flag)
            {
                parts.push(format!("{flag}={REDACTED_PASSWORD}"));
                continue;
            }
            expect_password = PASSWORD_FLAGS.contains(&arg.as_str());
            parts.push(arg.clone());
        }
        parts.join(" ")
    }
}

/// Echo form: `@cmd` or `(dir) @cmd`
impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dir {
            Some(dir) => write!(f, "({}) @{}", dir.display(), self.redacted()),
            None => write!(f, "@{}", self.redacted()),
        }
    }
}

/// Executes external commands.
pub trait CommandRunner {
    /// Verbosity and dry-run switches this runner was built with
    fn output(&self) -> OutputConfig;

    /// Run with stdio passed through
    fn run(&self, command: &ToolCommand) -> impl Future<Output = Result<()>> + Send;

    /// Run with stdio passed through, also returning combined stdout/stderr.
    ///
    /// A non-zero exit is reported as [`NotarizeError::CommandFailed`] with
    /// the captured text attached.
    fn capture(&self, command: &ToolCommand) -> impl Future<Output = Result<String>> + Send;

    fn dry_run(&self) -> bool {
        self.output().dry_run
    }
}

/// Runs commands on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    output: OutputConfig,
}

impl SystemRunner {
    #[must_use]
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    /// Prints the command when echoing is enabled; returns true when it
    /// must not actually run.
    fn announce(&self, command: &ToolCommand) -> bool {
        if self.output.dry_run || self.output.verbosity > 0 {
            println!("{command}");
        }
        log::debug!("exec {}", command.redacted());
        self.output.dry_run
    }

    fn build(command: &ToolCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args).stdin(Stdio::inherit());
        if let Some(dir) = &command.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn_error(command: &ToolCommand, source: std::io::Error) -> NotarizeError {
        NotarizeError::Spawn {
            program: command.program.clone(),
            source,
        }
    }
}

impl CommandRunner for SystemRunner {
    fn output(&self) -> OutputConfig {
        self.output
    }

    async fn run(&self, command: &ToolCommand) -> Result<()> {
        if self.announce(command) {
            return Ok(());
        }

        let status = Self::build(command)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Self::spawn_error(command, e))?;

        if !status.success() {
            return Err(NotarizeError::CommandFailed {
                command: command.redacted(),
                status: status.to_string(),
                output: String::new(),
            });
        }
        Ok(())
    }

    async fn capture(&self, command: &ToolCommand) -> Result<String> {
        if self.announce(command) {
            return Ok(String::new());
        }

        let mut child = Self::build(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(command, e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| NotarizeError::InvalidConfig("child stdout not piped".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| NotarizeError::InvalidConfig("child stderr not piped".to_string()))?;

        let mut captured = Vec::new();
        let mut out_chunk = [0u8; 8192];
        let mut err_chunk = [0u8; 8192];
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            tokio::select! {
                n = stdout.read(&mut out_chunk), if out_open => {
                    let n = n?;
                    if n == 0 {
                        out_open = false;
                    } else {
                        std::io::stdout().write_all(&out_chunk[..n])?;
                        captured.extend_from_slice(&out_chunk[..n]);
                    }
                }
                n = stderr.read(&mut err_chunk), if err_open => {
                    let n = n?;
                    if n == 0 {
                        err_open = false;
                    } else {
                        std::io::stderr().write_all(&err_chunk[..n])?;
                        captured.extend_from_slice(&err_chunk[..n]);
                    }
                }
            }
        }

        let status = child.wait().await?;
        let output = String::from_utf8_lossy(&captured).into_owned();

        if !status.success() {
            return Err(NotarizeError::CommandFailed {
                command: command.redacted(),
                status: status.to_string(),
                output,
            });
        }
        Ok(output)
    }
}
