use std::time::Duration;

use thiserror::Error;

use super::command::ExitDisposition;

/// Failure modes of running an external tool.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("`{command}` did not finish within {limit:?}")]
    TimedOut { command: String, limit: Duration },

    #[error("failed to run `{command}`: {source}")]
    Os {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` stopped with {actual}, expected exit code in {expected:?}")]
    UnexpectedExit {
        command: String,
        expected: Vec<i32>,
        actual: ExitDisposition,
    },

    #[error("mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}
