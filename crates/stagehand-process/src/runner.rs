//! Runs commands and collects their transcripts.
//!
//! [`SystemRunner`] is the production [`CommandRunner`]. It spawns the child
//! with both output streams piped, hands each stream to its own reader
//! thread straight away, and only then blocks on the exit status. Once the
//! child has exited the readers are given a bounded grace period to reach
//! EOF, which guarantees that everything written before exit is part of the
//! returned [`ProcessOutput`].

use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::PROCESS_TARGET;
use crate::capture::StreamCapture;
use crate::command::CommandSpec;
use crate::error::{ProcessError, ProcessFailure};
use crate::output::ProcessOutput;

/// How long the readers may keep draining after the child exits.
pub const DEFAULT_CAPTURE_GRACE: Duration = Duration::from_secs(1);

/// Abstraction over subprocess execution so drivers can be exercised with
/// scripted runners.
///
/// # Example
///
/// ```
/// use stagehand_process::{CommandRunner, CommandSpec, ProcessError, ProcessOutput};
///
/// struct Echo;
///
/// impl CommandRunner for Echo {
///     fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
///         Ok(ProcessOutput::new(Some(0), vec![spec.command_line()], Vec::new()))
///     }
/// }
///
/// let output = Echo.run(&CommandSpec::new("pg_dump").arg("--version")).unwrap();
/// assert_eq!(output.stdout(), ["pg_dump --version"]);
/// ```
pub trait CommandRunner {
    /// Runs `spec` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::NonZeroExit`] with the full transcript when the
    /// command fails, or a spawn/supervision error when it could not run.
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        (**self).run(spec)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        (**self).run(spec)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    capture_grace: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRunner {
    /// Creates a runner with the default capture grace period.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            capture_grace: DEFAULT_CAPTURE_GRACE,
        }
    }

    /// Overrides how long readers may drain after the child exits.
    #[must_use]
    pub const fn with_capture_grace(mut self, grace: Duration) -> Self {
        self.capture_grace = grace;
        self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let command_line = spec.command_line();
        debug!(
            target: PROCESS_TARGET,
            command = %command_line,
            working_dir = ?spec.working_dir(),
            env = ?spec.environment().keys().collect::<Vec<_>>(),
            "spawning command"
        );

        let mut command = Command::new(spec.program());
        command
            .args(spec.arguments())
            .envs(spec.environment())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = spec.working_dir() {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|source| spawn_error(&command_line, source))?;
        let (stdout, stderr) = match start_capture(&mut child) {
            Ok(captures) => captures,
            Err(error) => {
                abandon(&mut child);
                return Err(supervise_error(
                    &command_line,
                    "failed to start output readers",
                    Some(error),
                ));
            }
        };

        let status = child.wait().map_err(|source| {
            supervise_error(&command_line, "failed to wait for exit", Some(source))
        })?;
        let deadline = Instant::now() + self.capture_grace;
        let output = ProcessOutput::new(
            status.code(),
            stdout.finish(deadline),
            stderr.finish(deadline),
        );

        debug!(
            target: PROCESS_TARGET,
            command = %command_line,
            status = ?output.status(),
            stdout_lines = output.stdout().len(),
            stderr_lines = output.stderr().len(),
            "command finished"
        );

        if output.success() {
            Ok(output)
        } else {
            Err(ProcessError::NonZeroExit(Box::new(ProcessFailure::new(
                command_line,
                spec.environment().clone(),
                output,
            ))))
        }
    }
}

fn start_capture(child: &mut Child) -> io::Result<(StreamCapture, StreamCapture)> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr was not piped"))?;
    let stdout_capture = StreamCapture::spawn("stdout", stdout)?;
    let stderr_capture = StreamCapture::spawn("stderr", stderr)?;
    Ok((stdout_capture, stderr_capture))
}

/// Kills a child whose output can no longer be drained.
fn abandon(child: &mut Child) {
    drop(child.kill());
    drop(child.wait());
}

fn spawn_error(command: &str, source: io::Error) -> ProcessError {
    if source.kind() == io::ErrorKind::NotFound {
        ProcessError::ProgramNotFound {
            command: command.to_owned(),
            source: Arc::new(source),
        }
    } else {
        ProcessError::Spawn {
            command: command.to_owned(),
            source: Arc::new(source),
        }
    }
}

fn supervise_error(command: &str, message: &str, source: Option<io::Error>) -> ProcessError {
    ProcessError::Supervise {
        command: command.to_owned(),
        message: message.to_owned(),
        source: source.map(Arc::new),
    }
}
