//! Descriptions of tool invocations and their results.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ProcessError;

/// One external tool invocation.
///
/// `expect` lists the exit codes that count as a regular finish. Solvers
/// conventionally use 10/20 for SAT/UNSAT, checkers 0/1, so "success" is
/// a per-command notion here.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Exit codes that count as a regular finish.
    pub expect: Vec<i32>,
    pub capture_stdout: bool,
    pub capture_stderr: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            expect: vec![0],
            capture_stdout: true,
            capture_stderr: true,
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
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Replace the set of exit codes treated as a regular finish.
    pub fn expect_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.expect = codes.into_iter().collect();
        self
    }

    /// Let the stream flow to the parent's own instead of capturing it.
    pub fn inherit_stdout(mut self) -> Self {
        self.capture_stdout = false;
        self
    }

    pub fn inherit_stderr(mut self) -> Self {
        self.capture_stderr = false;
        self
    }

    /// Classify a finished run, turning disallowed exits into errors.
    pub fn check(&self, status: ExitDisposition) -> Result<ExitDisposition, ProcessError> {
        if let ExitDisposition::Exited(code) = &status {
            if self.expect.contains(code) {
                return Ok(status);
            }
        }
        Err(ProcessError::UnexpectedExit {
            command: self.to_string(),
            expected: self.expect.clone(),
            actual: status,
        })
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// How a child process left the scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitDisposition {
    Exited(i32),
    /// Terminated by a signal, carrying its name (`SIGKILL`) or, for
    /// signals without one, the raw number.
    Signaled(String),
}

impl ExitDisposition {
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitDisposition::Exited(code) => Some(*code),
            ExitDisposition::Signaled(_) => None,
        }
    }

    #[cfg(unix)]
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitDisposition::Exited(code),
            (None, Some(signal)) => ExitDisposition::Signaled(signal_name(signal)),
            // wait() only reports a code or a signal; keep the match total.
            (None, None) => ExitDisposition::Exited(-1),
        }
    }

    #[cfg(not(unix))]
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        ExitDisposition::Exited(status.code().unwrap_or(-1))
    }
}

impl fmt::Display for ExitDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitDisposition::Exited(code) => write!(f, "exit code {code}"),
            ExitDisposition::Signaled(name) => write!(f, "signal {name}"),
        }
    }
}

#[cfg(unix)]
fn signal_name(signal: i32) -> String {
    nix::sys::signal::Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| signal.to_string())
}

/// Captured result of one finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub status: ExitDisposition,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl RunOutput {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn elapsed_micros(&self) -> u128 {
        self.elapsed.as_micros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments_with_whitespace() {
        let spec = CommandSpec::new("solver")
            .arg("--unsat")
            .arg("a file.cnf");
        assert_eq!(spec.to_string(), "solver --unsat \"a file.cnf\"");
    }

    #[test]
    fn check_accepts_listed_codes_only() {
        let spec = CommandSpec::new("solver").expect_codes([10, 20]);
        assert!(spec.check(ExitDisposition::Exited(20)).is_ok());
        let err = spec.check(ExitDisposition::Exited(0));
        match err {
            Err(ProcessError::UnexpectedExit {
                expected, actual, ..
            }) => {
                assert_eq!(expected, vec![10, 20]);
                assert_eq!(actual, ExitDisposition::Exited(0));
            }
            other => panic!("expected UnexpectedExit, got {other:?}"),
        }
    }

    #[test]
    fn check_rejects_signals() {
        let spec = CommandSpec::new("solver");
        let err = spec.check(ExitDisposition::Signaled("SIGKILL".into()));
        assert!(matches!(
            err,
            Err(ProcessError::UnexpectedExit { actual, .. })
                if actual == ExitDisposition::Signaled("SIGKILL".into())
        ));
    }

    #[cfg(unix)]
    #[test]
    fn known_signals_get_their_names() {
        assert_eq!(signal_name(9), "SIGKILL");
        assert_eq!(signal_name(15), "SIGTERM");
    }

    #[test]
    fn elapsed_micros_matches_duration() {
        let output = RunOutput {
            status: ExitDisposition::Exited(0),
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(output.elapsed_micros(), 1_500_000);
    }
}
