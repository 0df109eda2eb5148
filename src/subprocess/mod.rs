//! Concurrent execution of external tools.
//!
//! The pipeline drives solvers and checkers through [`ProcessRunner`].
//! The real implementation spawns the tool, captures its stdout and
//! stderr byte for byte, enforces the wall-clock limit, and classifies
//! every abnormal finish. In echo mode the captured streams are instead
//! mirrored to the terminal line by line.

mod command;
mod error;
mod mirror;
mod mock;
mod runner;

pub use command::{CommandSpec, ExitDisposition, RunOutput};
pub use error::ProcessError;
pub use mirror::{turn_lock, CaptureBuffer, LineMirror, MirrorSink, TurnLock, TURN_LOCK_PATIENCE};
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::{ProcessRunner, TokioProcessRunner};
