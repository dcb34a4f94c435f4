//! Transient confirmation shown on a copy button after a copy attempt.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::dom::{Document, NodeId};
use crate::lock_or_recover;

pub const COPIED_MESSAGE: &str = "Copied!";
pub const FAILED_MESSAGE: &str = "Failed!";
const FEEDBACK_STYLE: &str = "background-color: #4CAF50;";

/// Document shared between the scanner, the watcher and in-flight copy actions.
pub type SharedDocument = Arc<Mutex<Document>>;

/// Shows `message` on `button`, then restores `label` after `delay`.
///
/// The label comes from configuration rather than from the button, so a second click during
/// the delay cannot leave the message stuck. Requires a Tokio runtime for the revert.
pub fn show_feedback(
    doc: &SharedDocument,
    button: NodeId,
    message: &'static str,
    label: String,
    delay: Duration,
) {
    {
        let mut doc = lock_or_recover(doc);
        doc.set_text(button, message);
        doc.set_attr(button, "style", FEEDBACK_STYLE);
    }

    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("No async runtime, feedback will not revert");
        return;
    };

    let doc = Arc::clone(doc);
    runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        let mut doc = lock_or_recover(&doc);
        doc.set_text(button, &label);
        doc.remove_attr(button, "style");
        debug!(?button, "Feedback reverted");
    });
}
