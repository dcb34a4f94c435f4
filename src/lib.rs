//! Adds "Copy Clean" buttons to code blocks and copies their code without line numbers,
//! prompts or stray markup.

pub mod commands;
pub mod config;
pub mod controller;
pub mod dom;
pub mod feedback;
pub mod paths;
pub mod scanner;
pub mod settings;
pub mod styles;
pub mod system;
pub mod watcher;

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing_subscriber::EnvFilter;

pub use config::{AppConfig, LogLevel};
pub use controller::{CodeCleaner, CopyError, FeatureState};
pub use settings::{Settings, SettingsStore};
pub use system::clean_code;

/// Locks `mutex`, taking over the data if a previous holder panicked.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Logs go to stderr so command output on stdout stays clean. `RUST_LOG` overrides `level`.
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        eprintln!("copy-code-cleaner: tracing already initialized");
    }
}
