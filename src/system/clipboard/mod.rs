//! Clipboard writing utilities

#[cfg(target_os = "linux")]
mod linux;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

/// Max time we wait for the platform clipboard to accept new text before giving up.
const CLIPBOARD_WRITE_TIMEOUT_MS: u64 = 1200;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("Clipboard write failed: {0}")]
    WriteFailed(String),
    #[error("Clipboard write timed out after {0} ms")]
    TimedOut(u64),
    #[error("Clipboard worker stopped before finishing")]
    WorkerGone,
}

/// Destination for cleaned code. Any error is reported to the user as a failed copy.
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// System clipboard backed by `arboard`.
///
/// Clipboard access can block (e.g. on X11), so each write runs on the blocking pool and is
/// abandoned after a short timeout; the caller only ever awaits.
#[derive(Debug, Clone)]
pub struct SystemClipboard {
    timeout: Duration,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_millis(CLIPBOARD_WRITE_TIMEOUT_MS),
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClipboardSink for SystemClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let owned = text.to_owned();
        let worker = tokio::task::spawn_blocking(move || set_clipboard_text(owned));

        match tokio::time::timeout(self.timeout, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(error = %e, "Clipboard worker panicked or was cancelled");
                Err(ClipboardError::WorkerGone)
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(timeout_ms, "Clipboard write timed out");
                Err(ClipboardError::TimedOut(timeout_ms))
            }
        }
    }
}

/// Writes text to the platform clipboard.
/// - On Linux: Writes the explicit Clipboard buffer (`LinuxClipboardKind::Clipboard`) so Ctrl+V sees it.
/// - Elsewhere: Uses `arboard::Clipboard::set_text()`.
/// Logs only length; clipboard content never reaches the logs.
fn set_clipboard_text(text: String) -> Result<(), ClipboardError> {
    let len = text.len();

    #[cfg(target_os = "linux")]
    let result = linux::set_clipboard_text_linux(text);

    #[cfg(not(target_os = "linux"))]
    let result = arboard::Clipboard::new()
        .map_err(|e| ClipboardError::Unavailable(e.to_string()))
        .and_then(|mut cb| {
            cb.set_text(text)
                .map_err(|e| ClipboardError::WriteFailed(e.to_string()))
        });

    if result.is_ok() {
        debug!(len, "Wrote text to clipboard");
    }
    result
}
