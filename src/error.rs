//! Pipeline failures and the exit codes they map to.

use thiserror::Error;

use crate::proof::TranscodeError;
use crate::subprocess::ProcessError;

/// Exit codes of the `ferat` binary.
///
/// Codes at 71 and above describe a specific verdict or failure; 1 is a
/// generic failure and 2 a command-line error.
pub mod codes {
    pub const FAIL: i32 = 1;
    pub const CLI_ERR: i32 = 2;
    pub const DEPS_NOT_FOUND: i32 = 71;
    pub const QBF_SAT: i32 = 72;
    pub const EXPANSION_SAT: i32 = 73;
    pub const INVALID_RAT_PROOF: i32 = 74;
    pub const INVALID_FERAT_PROOF: i32 = 76;
    pub const PROCESS_FAILED: i32 = 90;
    pub const PROCESS_TIMED_OUT: i32 = 91;
    pub const PROCESS_OS_ERROR: i32 = 92;
}

/// Everything that can stop a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Usage(String),

    #[error(
        "unable to find binaries in given path ('{}')\nDid you build the solver and checker binaries into that directory?",
        dir.display()
    )]
    DepsDirMissing { dir: std::path::PathBuf },

    #[error("required tools not found: {}", missing.join(", "))]
    DepsNotFound { missing: Vec<String> },

    #[error("the QBF is satisfiable, there is nothing to refute")]
    QbfSat,

    #[error("the expansion is satisfiable, its refutation cannot exist")]
    ExpansionSat,

    #[error("the RAT proof did not verify")]
    InvalidRatProof,

    #[error("the FERAT proof did not verify")]
    InvalidFeratProof,

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// The process exit code this failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Usage(_) => codes::CLI_ERR,
            PipelineError::DepsDirMissing { .. } | PipelineError::DepsNotFound { .. } => {
                codes::DEPS_NOT_FOUND
            }
            PipelineError::QbfSat => codes::QBF_SAT,
            PipelineError::ExpansionSat => codes::EXPANSION_SAT,
            PipelineError::InvalidRatProof => codes::INVALID_RAT_PROOF,
            PipelineError::InvalidFeratProof => codes::INVALID_FERAT_PROOF,
            PipelineError::Process(ProcessError::TimedOut { .. }) => codes::PROCESS_TIMED_OUT,
            PipelineError::Process(ProcessError::Os { .. }) => codes::PROCESS_OS_ERROR,
            PipelineError::Process(_) => codes::PROCESS_FAILED,
            PipelineError::Transcode(_) | PipelineError::Io(_) => codes::FAIL,
        }
    }
}
