//! External command execution.
//!
//! Every interaction with HDFS and S3 goes through the `hadoop` and `s3cmd`
//! command-line tools. [`CommandRunner`] is the seam that lets the engine run
//! against a real shell or against a scripted runner in tests.

use crate::error::BackupError;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs an external program to completion.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Runs `program` with `args` and captures its output.
    ///
    /// A non-zero exit is reported through [`CommandOutput::status`], not as an
    /// error; `Err` means the process could not be run at all.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, BackupError>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, BackupError> {
        debug!("Running {}", command_line(program, args));
        let output = Command::new(program).args(args).output().await?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs a command and turns a non-zero exit into [`BackupError::CommandFailed`].
pub async fn run_checked<R: CommandRunner>(
    runner: &R,
    program: &str,
    args: &[String],
) -> Result<String, BackupError> {
    let output = runner.run(program, args).await?;
    if !output.success() {
        return Err(BackupError::CommandFailed {
            command: command_line(program, args),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Renders a command line for logs and error messages.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
