//! Line-oriented mirroring of child output streams.
//!
//! Each stream of a child process gets a [`LineMirror`] task that drains
//! the pipe and forwards whole lines to a set of sinks, typically the
//! hosting terminal plus a capture buffer. Mirrors of the same child
//! share a [`TurnLock`] so that stdout and stderr interleave at line
//! boundaries instead of mid-line. Waiting for the lock is bounded by
//! [`TURN_LOCK_PATIENCE`]: a mirror whose sibling stalls writes anyway
//! rather than hold output back indefinitely.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ux::{Style, RESET};

/// How long a mirror waits for its turn before writing anyway.
pub const TURN_LOCK_PATIENCE: Duration = Duration::from_millis(400);

/// Fairness lock shared by the mirrors of one child process.
pub type TurnLock = Arc<AsyncMutex<()>>;

pub fn turn_lock() -> TurnLock {
    Arc::new(AsyncMutex::new(()))
}

/// Byte sink shared between a mirror task and the caller that reads the
/// transcript once the child is done.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the captured bytes, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AsyncWrite for CaptureBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// One destination for mirrored lines, optionally stylizing them.
pub struct MirrorSink {
    writer: Box<dyn AsyncWrite + Send + Sync + Unpin>,
    style: Option<Style>,
}

impl MirrorSink {
    pub fn plain(writer: impl AsyncWrite + Send + Sync + Unpin + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            style: None,
        }
    }

    /// A sink that wraps every written chunk in `style` and a reset.
    pub fn styled(writer: impl AsyncWrite + Send + Sync + Unpin + 'static, style: Style) -> Self {
        Self {
            writer: Box::new(writer),
            style: Some(style),
        }
    }

    async fn put(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(style) = self.style {
            self.writer.write_all(style.seq().as_bytes()).await?;
        }
        self.writer.write_all(bytes).await?;
        // The style never stays open across a flush.
        if self.style.is_some() {
            self.writer.write_all(RESET.as_bytes()).await?;
        }
        self.writer.flush().await
    }

    /// The trailing reset every styled stream ends with, written even
    /// when the stream produced nothing.
    async fn finish(&mut self) -> io::Result<()> {
        if self.style.is_some() {
            self.writer.write_all(RESET.as_bytes()).await?;
            self.writer.flush().await?;
        }
        Ok(())
    }
}

/// Drains one child stream and forwards it line by line.
pub struct LineMirror {
    source: Box<dyn AsyncRead + Send + Sync + Unpin>,
    sinks: Vec<MirrorSink>,
    turn: TurnLock,
    stop: Arc<AtomicBool>,
}

impl LineMirror {
    pub fn new(
        source: impl AsyncRead + Send + Sync + Unpin + 'static,
        turn: TurnLock,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source: Box::new(source),
            sinks: Vec::new(),
            turn,
            stop,
        }
    }

    pub fn sink(mut self, sink: MirrorSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Pump the stream until EOF or until the stop flag is raised.
    ///
    /// Output reaches the sinks only on a completed line, at EOF, or on
    /// stop, so concurrent mirrors never tear each other's lines apart.
    /// CRLF and LFCR sequences collapse to a single LF.
    pub async fn run(mut self) -> io::Result<()> {
        let mut chunk = [0u8; 8192];
        let mut pending: Vec<u8> = Vec::new();
        let mut after_newline = false;

        loop {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            let n = self.source.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                match byte {
                    b'\n' => {
                        if pending.last() == Some(&b'\r') {
                            pending.pop();
                        }
                        pending.push(b'\n');
                        self.emit(&mut pending).await?;
                        after_newline = true;
                    }
                    b'\r' if after_newline && pending.is_empty() => {
                        after_newline = false;
                    }
                    _ => {
                        pending.push(byte);
                        after_newline = false;
                    }
                }
            }
        }

        let _turn = self.take_turn().await;
        if !pending.is_empty() {
            for sink in &mut self.sinks {
                sink.put(&pending).await?;
            }
        }
        for sink in &mut self.sinks {
            sink.finish().await?;
        }
        Ok(())
    }

    async fn emit(&mut self, pending: &mut Vec<u8>) -> io::Result<()> {
        let _turn = self.take_turn().await;
        for sink in &mut self.sinks {
            sink.put(pending).await?;
        }
        pending.clear();
        Ok(())
    }

    async fn take_turn(&self) -> Option<OwnedMutexGuard<()>> {
        tokio::time::timeout(TURN_LOCK_PATIENCE, Arc::clone(&self.turn).lock_owned())
            .await
            .ok()
    }
}
