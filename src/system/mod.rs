//! System interactions (clipboard) and the text cleanup they feed.

mod clipboard;
pub mod text_cleanup;

pub use clipboard::{ClipboardError, ClipboardSink, SystemClipboard};
pub use text_cleanup::clean_code;
