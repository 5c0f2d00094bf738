//! Process execution operations

use async_trait::async_trait;
use lspkg_errors::Error;
use std::fmt;
use std::path::PathBuf;

/// Receives each stdout/stderr line as the process produces it
pub type LineSink<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Command builder understood by every `ProcessOperations` implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    shell_line: Option<String>,
}

impl PlatformCommand {
    /// Create a new platform command
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            shell_line: None,
        }
    }

    /// A command line interpreted by `sh -c`
    pub fn shell(line: &str) -> Self {
        let mut cmd = Self::new("sh");
        cmd.args(["-c", line]);
        cmd.shell_line = Some(line.to_string());
        cmd
    }

    /// Build from an argument vector; the first element is the program.
    /// Returns `None` for an empty vector.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut iter = argv.into_iter();
        let program = iter.next()?;
        let mut cmd = Self::new(program.as_ref());
        cmd.args(iter);
        Some(cmd)
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: Into<PathBuf>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the child
    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Get the program name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the arguments
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the current directory
    #[must_use]
    pub fn get_current_dir(&self) -> Option<&PathBuf> {
        self.current_dir.as_ref()
    }

    /// Get the environment overrides
    #[must_use]
    pub fn get_env_vars(&self) -> &[(String, String)] {
        &self.env_vars
    }
}

impl fmt::Display for PlatformCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = &self.shell_line {
            return f.write_str(line);
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Output from command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Interleaved stdout and stderr lines in arrival order
    pub lines: Vec<String>,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// All lines joined with newlines
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Trait for process execution operations
#[async_trait]
pub trait ProcessOperations: Send + Sync {
    /// Run `cmd` to completion, handing every output line to `on_line`.
    ///
    /// Fails with `PlatformError::CommandFailed` on a non-zero exit and
    /// `CommandNotFound`/`ProcessExecutionFailed` when the process cannot
    /// be spawned. Dropping the returned future kills the child.
    async fn execute(&self, cmd: PlatformCommand, on_line: LineSink<'_>)
        -> Result<CommandOutput, Error>;

    /// Run `cmd` without observing its output as it arrives
    async fn output(&self, cmd: PlatformCommand) -> Result<CommandOutput, Error> {
        self.execute(cmd, &discard_line).await
    }
}

fn discard_line(_line: &str) {}
