use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RunConfig;

use super::command::{CommandSpec, ExitDisposition, RunOutput};
use super::error::ProcessError;
use super::runner::ProcessRunner;

/// Scripted [`ProcessRunner`] for tests.
///
/// Expectations are matched by program name (and an optional argument
/// predicate) in registration order. Exit codes go through the same
/// `expect` classification as the real runner, so a scripted exit of 10
/// against a command expecting `[0, 1]` surfaces as `UnexpectedExit`.
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<CommandSpec>>>,
}

struct MockExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    response: MockResponse,
    times_called: usize,
    expected_times: Option<usize>,
}

#[derive(Clone)]
enum MockResponse {
    Finished {
        status: ExitDisposition,
        stdout: String,
        stderr: String,
    },
    TimesOut(Duration),
    FailsToLaunch(String),
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_command(&self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                response: MockResponse::Finished {
                    status: ExitDisposition::Exited(0),
                    stdout: String::new(),
                    stderr: String::new(),
                },
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap();
        history.iter().filter(|spec| spec.program == program).count() == times
    }

    pub fn call_history(&self) -> Vec<CommandSpec> {
        self.call_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, spec: &CommandSpec, _config: &RunConfig) -> Result<RunOutput, ProcessError> {
        self.call_history.lock().unwrap().push(spec.clone());

        let mut expectations = self.expectations.lock().unwrap();
        for expectation in expectations.iter_mut() {
            if expectation.program != spec.program {
                continue;
            }
            if let Some(ref args_matcher) = expectation.args_matcher {
                if !(args_matcher)(&spec.args) {
                    continue;
                }
            }

            expectation.times_called += 1;
            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return Err(ProcessError::MockExpectationNotMet(format!(
                        "command '{}' called {} times, expected {}",
                        spec.program, expectation.times_called, expected
                    )));
                }
            }

            return match expectation.response.clone() {
                MockResponse::Finished {
                    status,
                    stdout,
                    stderr,
                } => {
                    let status = spec.check(status)?;
                    Ok(RunOutput {
                        status,
                        stdout,
                        stderr,
                        elapsed: Duration::from_millis(10),
                    })
                }
                MockResponse::TimesOut(limit) => Err(ProcessError::TimedOut {
                    command: spec.to_string(),
                    limit,
                }),
                MockResponse::FailsToLaunch(message) => Err(ProcessError::Os {
                    command: spec.to_string(),
                    source: io::Error::other(message),
                }),
            };
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "no expectation found for command: {} {:?}",
            spec.program, spec.args
        )))
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        if let MockResponse::Finished {
            stdout: ref mut slot,
            ..
        } = self.expectation.response
        {
            *slot = stdout.to_string();
        }
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        if let MockResponse::Finished {
            stderr: ref mut slot,
            ..
        } = self.expectation.response
        {
            *slot = stderr.to_string();
        }
        self
    }

    pub fn exits_with(mut self, code: i32) -> Self {
        if let MockResponse::Finished { ref mut status, .. } = self.expectation.response {
            *status = ExitDisposition::Exited(code);
        }
        self
    }

    pub fn killed_by(mut self, signal: &str) -> Self {
        if let MockResponse::Finished { ref mut status, .. } = self.expectation.response {
            *status = ExitDisposition::Signaled(signal.to_string());
        }
        self
    }

    pub fn times_out(mut self, limit: Duration) -> Self {
        self.expectation.response = MockResponse::TimesOut(limit);
        self
    }

    pub fn fails_to_launch(mut self, message: &str) -> Self {
        self.expectation.response = MockResponse::FailsToLaunch(message.to_string());
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}
