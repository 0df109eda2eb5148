use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::RunConfig;
use crate::ux;

use super::command::{CommandSpec, ExitDisposition, RunOutput};
use super::error::ProcessError;
use super::mirror::{turn_lock, CaptureBuffer, LineMirror, MirrorSink, TurnLock};

/// Executes tool invocations.
///
/// The pipeline only talks to this trait, so tests can substitute a
/// scripted runner for the real one.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `spec` to completion, capturing and, in echo mode, mirroring
    /// its output.
    async fn run(&self, spec: &CommandSpec, config: &RunConfig) -> Result<RunOutput, ProcessError>;
}

/// How long a killed child's output pipes are drained before being
/// abandoned.
const KILL_DRAIN_PATIENCE: Duration = Duration::from_millis(500);

/// One stream's drain task, resolving to the captured transcript.
type StreamPump = JoinHandle<io::Result<Vec<u8>>>;

/// Runs commands on the host via tokio's process support.
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec, config: &RunConfig) -> Result<RunOutput, ProcessError> {
        let command_line = spec.to_string();
        debug!(command = %command_line, "spawning");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(stream_stdio(spec.capture_stdout, config.echo))
            .stderr(stream_stdio(spec.capture_stderr, config.echo))
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| ProcessError::Os {
            command: command_line.clone(),
            source,
        })?;

        let turn = turn_lock();
        let stop = Arc::new(AtomicBool::new(false));
        let stdout_pump = child.stdout.take().map(|pipe| {
            if config.echo {
                echo_pump(
                    pipe,
                    tokio::io::stdout(),
                    ux::TOOL_STDOUT,
                    spec.capture_stdout,
                    config.color,
                    &turn,
                    &stop,
                )
            } else {
                capture_pump(pipe)
            }
        });
        let stderr_pump = child.stderr.take().map(|pipe| {
            if config.echo {
                echo_pump(
                    pipe,
                    tokio::io::stderr(),
                    ux::TOOL_STDERR,
                    spec.capture_stderr,
                    config.color,
                    &turn,
                    &stop,
                )
            } else {
                capture_pump(pipe)
            }
        });

        let waited = match config.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    stop.store(true, Ordering::Relaxed);
                    let _ = child.kill().await;
                    // Orphaned grandchildren may hold the pipe ends
                    // open past the kill.
                    let drain = async {
                        for pump in [stdout_pump, stderr_pump].into_iter().flatten() {
                            let _ = pump.await;
                        }
                    };
                    let _ = tokio::time::timeout(KILL_DRAIN_PATIENCE, drain).await;
                    return Err(ProcessError::TimedOut {
                        command: command_line,
                        limit,
                    });
                }
            },
            None => child.wait().await,
        };
        let status = waited.map_err(|source| ProcessError::Os {
            command: command_line.clone(),
            source,
        })?;
        let elapsed = started.elapsed();

        let stdout = transcript(stdout_pump)
            .await
            .map_err(|source| ProcessError::Os {
                command: command_line.clone(),
                source,
            })?;
        let stderr = transcript(stderr_pump)
            .await
            .map_err(|source| ProcessError::Os {
                command: command_line.clone(),
                source,
            })?;

        let disposition = spec.check(ExitDisposition::from_status(status))?;
        debug!(
            command = %command_line,
            elapsed_us = elapsed.as_micros() as u64,
            status = %disposition,
            "finished"
        );

        Ok(RunOutput {
            status: disposition,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            elapsed,
        })
    }
}

/// A pipe for anything captured or echoed, the parent's own stream
/// otherwise.
fn stream_stdio(capture: bool, echo: bool) -> Stdio {
    if capture || echo {
        Stdio::piped()
    } else {
        Stdio::inherit()
    }
}

/// Drain one stream to completion, byte for byte.
fn capture_pump(mut pipe: impl AsyncRead + Send + Unpin + 'static) -> StreamPump {
    tokio::spawn(async move {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes).await?;
        Ok(bytes)
    })
}

/// Mirror one stream to the terminal line by line, keeping a transcript
/// on the side when capture is requested.
fn echo_pump(
    pipe: impl AsyncRead + Send + Sync + Unpin + 'static,
    terminal: impl AsyncWrite + Send + Sync + Unpin + 'static,
    style: ux::Style,
    capture: bool,
    color: bool,
    turn: &TurnLock,
    stop: &Arc<AtomicBool>,
) -> StreamPump {
    let transcript = CaptureBuffer::new();
    let mut mirror = LineMirror::new(pipe, Arc::clone(turn), Arc::clone(stop))
        .sink(echo_sink(terminal, color, style));
    if capture {
        mirror = mirror.sink(MirrorSink::plain(transcript.clone()));
    }
    tokio::spawn(async move { mirror.run().await.map(|_| transcript.take()) })
}

fn echo_sink(
    writer: impl AsyncWrite + Send + Sync + Unpin + 'static,
    color: bool,
    style: ux::Style,
) -> MirrorSink {
    if color {
        MirrorSink::styled(writer, style)
    } else {
        MirrorSink::plain(writer)
    }
}

async fn transcript(pump: Option<StreamPump>) -> io::Result<Vec<u8>> {
    match pump {
        Some(pump) => pump.await.map_err(io::Error::other)?,
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", script])
    }

    fn quiet() -> RunConfig {
        RunConfig::default()
    }

    #[tokio::test]
    async fn captures_both_streams_separately() {
        let output = TokioProcessRunner
            .run(&sh("printf 'out\\n'; printf 'err\\n' 1>&2"), &quiet())
            .await
            .unwrap();
        assert_eq!(output.status, ExitDisposition::Exited(0));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn silent_captures_keep_the_raw_bytes() {
        let output = TokioProcessRunner
            .run(&sh("printf 'a\\r\\nb'"), &quiet())
            .await
            .unwrap();
        assert_eq!(output.stdout, "a\r\nb");
    }

    #[tokio::test]
    async fn echoed_captures_are_line_normalized() {
        let config = RunConfig {
            echo: true,
            ..RunConfig::default()
        };
        let output = TokioProcessRunner
            .run(&sh("printf 'a\\r\\nb\\n'"), &config)
            .await
            .unwrap();
        assert_eq!(output.stdout, "a\nb\n");
    }

    #[tokio::test]
    async fn reports_elapsed_time() {
        let output = TokioProcessRunner.run(&sh("true"), &quiet()).await.unwrap();
        assert!(output.elapsed_micros() > 0);
    }

    #[tokio::test]
    async fn accepts_any_listed_exit_code() {
        let output = TokioProcessRunner
            .run(&sh("exit 1").expect_codes([0, 1]), &quiet())
            .await
            .unwrap();
        assert_eq!(output.code(), Some(1));
    }

    #[tokio::test]
    async fn classifies_disallowed_exit_codes() {
        let err = TokioProcessRunner
            .run(&sh("exit 3").expect_codes([0, 1]), &quiet())
            .await
            .unwrap_err();
        match err {
            ProcessError::UnexpectedExit {
                expected, actual, ..
            } => {
                assert_eq!(expected, vec![0, 1]);
                assert_eq!(actual, ExitDisposition::Exited(3));
            }
            other => panic!("expected UnexpectedExit, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn names_the_killing_signal() {
        let err = TokioProcessRunner
            .run(&sh("kill -KILL $$"), &quiet())
            .await
            .unwrap_err();
        match err {
            ProcessError::UnexpectedExit { actual, .. } => {
                assert_eq!(actual, ExitDisposition::Signaled("SIGKILL".into()));
            }
            other => panic!("expected UnexpectedExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn kills_the_child_on_timeout() {
        let config = RunConfig {
            timeout: Some(Duration::from_millis(100)),
            ..RunConfig::default()
        };
        let started = Instant::now();
        let err = TokioProcessRunner
            .run(&sh("sleep 30"), &config)
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(10));
        match err {
            ProcessError::TimedOut { limit, .. } => {
                assert_eq!(limit, Duration::from_millis(100));
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_an_os_failure() {
        let err = TokioProcessRunner
            .run(&CommandSpec::new("ferat-no-such-tool"), &quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Os { .. }));
    }

    #[tokio::test]
    async fn uncaptured_streams_leave_the_transcript_empty() {
        let output = TokioProcessRunner
            .run(
                &sh("echo visible; echo hidden 1>&2").inherit_stderr(),
                &quiet(),
            )
            .await
            .unwrap();
        assert_eq!(output.stdout, "visible\n");
        assert_eq!(output.stderr, "");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn an_uncaptured_stream_is_inherited_from_the_parent() {
        // The child reports where its original stdout points.
        let output = TokioProcessRunner
            .run(
                &sh("exec 3>&1 1>&2; readlink /proc/self/fd/3").inherit_stdout(),
                &quiet(),
            )
            .await
            .unwrap();
        let target = output.stderr.trim().to_string();
        assert!(!target.is_empty());
        assert_ne!(target, "/dev/null");
    }
}
