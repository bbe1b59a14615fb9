//! Captured result of a finished subprocess.

/// Exit status and full transcript of one invocation.
///
/// Lines are stored without their trailing newline, in the order each stream
/// produced them. The two streams are kept apart; no attempt is made to
/// reconstruct their relative arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    status: Option<i32>,
    stdout: Vec<String>,
    stderr: Vec<String>,
}

impl ProcessOutput {
    /// Builds an output record.
    #[must_use]
    pub const fn new(status: Option<i32>, stdout: Vec<String>, stderr: Vec<String>) -> Self {
        Self {
            status,
            stdout,
            stderr,
        }
    }

    /// Exit code; `None` when the child was terminated by a signal.
    #[must_use]
    pub const fn status(&self) -> Option<i32> {
        self.status
    }

    /// Whether the child exited with code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }

    /// Captured stdout lines.
    #[must_use]
    pub fn stdout(&self) -> &[String] {
        &self.stdout
    }

    /// Captured stderr lines.
    #[must_use]
    pub fn stderr(&self) -> &[String] {
        &self.stderr
    }

    /// Stdout joined back into text, one trailing newline per line.
    #[must_use]
    pub fn stdout_text(&self) -> String {
        join_lines(&self.stdout)
    }

    /// Stderr joined back into text, one trailing newline per line.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        join_lines(&self.stderr)
    }
}

fn join_lines(lines: &[String]) -> String {
    let capacity = lines.iter().map(|line| line.len() + 1).sum();
    let mut text = String::with_capacity(capacity);
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}
