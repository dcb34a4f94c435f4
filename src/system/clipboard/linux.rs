//! Linux-specific clipboard implementation

use super::ClipboardError;
use arboard::{Clipboard, LinuxClipboardKind, SetExtLinux};
use tracing::debug;

/// Writes text to the regular clipboard (not PRIMARY) on Linux.
pub(super) fn set_clipboard_text_linux(text: String) -> Result<(), ClipboardError> {
    let mut clipboard = Clipboard::new().map_err(|e| {
        debug!(error = %e, "No clipboard connection available");
        ClipboardError::Unavailable(e.to_string())
    })?;

    clipboard
        .set()
        .clipboard(LinuxClipboardKind::Clipboard)
        .text(text)
        .map_err(|e| ClipboardError::WriteFailed(e.to_string()))
}
