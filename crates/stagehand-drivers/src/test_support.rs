//! Scripted command runner shared by the driver tests.

use std::sync::{Mutex, PoisonError};

use stagehand_process::{CommandRunner, CommandSpec, ProcessError, ProcessFailure, ProcessOutput};

type Responder = Box<dyn Fn(&CommandSpec) -> Result<ProcessOutput, ProcessError> + Send + Sync>;

/// Runner that records every command and answers from a closure.
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<CommandSpec>>,
    responder: Responder,
}

impl ScriptedRunner {
    /// Answers every command with `responder`.
    pub(crate) fn new(
        responder: impl Fn(&CommandSpec) -> Result<ProcessOutput, ProcessError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// Succeeds every command with empty output.
    pub(crate) fn succeeding() -> Self {
        Self::new(|_| Ok(ok(&[])))
    }

    /// Recorded commands, in invocation order.
    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded command lines, in invocation order.
    pub(crate) fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(spec.clone());
        (self.responder)(spec)
    }
}

/// Successful output with the given stdout lines.
pub(crate) fn ok(stdout: &[&str]) -> ProcessOutput {
    ProcessOutput::new(
        Some(0),
        stdout.iter().map(|line| (*line).to_owned()).collect(),
        Vec::new(),
    )
}

/// Non-zero exit for `spec` with `stderr`.
pub(crate) fn exit(spec: &CommandSpec, code: i32, stderr: &str) -> ProcessError {
    ProcessError::NonZeroExit(Box::new(ProcessFailure::new(
        spec.command_line(),
        spec.environment().clone(),
        ProcessOutput::new(Some(code), Vec::new(), vec![stderr.to_owned()]),
    )))
}

/// Whether `spec` runs `program` with an argument list starting `prefix`.
pub(crate) fn invokes(spec: &CommandSpec, program: &str, prefix: &[&str]) -> bool {
    spec.program().ends_with(program)
        && spec.arguments().len() >= prefix.len()
        && spec
            .arguments()
            .iter()
            .zip(prefix)
            .all(|(arg, expected)| arg == expected)
}
