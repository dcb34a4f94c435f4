//! Feature lifecycle: turns scanning on and off as settings change and runs copy actions.
//!
//! States: `Disabled`, `EnabledIdle` (scanned once, not watching) and `EnabledWatching`
//! (scanned, rescanning after DOM changes). The settings snapshot is only ever updated through
//! [`CodeCleaner::on_settings_changed`].

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::dom::{MutationRecord, NodeId};
use crate::feedback::{self, SharedDocument, COPIED_MESSAGE, FAILED_MESSAGE};
use crate::lock_or_recover;
use crate::scanner::{CopyAction, PageScanner, ScannerError, ScannerOptions};
use crate::settings::{is_truthy, Settings, StorageChanges, KEY_ENABLED, KEY_PRESERVE_INDENTATION};
use crate::styles;
use crate::system::{clean_code, ClipboardError, ClipboardSink};
use crate::watcher::DomWatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    Disabled,
    EnabledIdle,
    EnabledWatching,
}

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("No code block is registered for button {0:?}")]
    UnknownButton(NodeId),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

pub struct CodeCleaner {
    doc: SharedDocument,
    scanner: PageScanner,
    clipboard: Arc<dyn ClipboardSink>,
    settings: Mutex<Settings>,
    state: Mutex<FeatureState>,
    watcher: Arc<DomWatcher>,
    watch_mutations: bool,
    feedback_delay: Duration,
}

impl std::fmt::Debug for CodeCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeCleaner")
            .field("state", &self.state())
            .field("settings", &self.settings())
            .field("watcher", &self.watcher)
            .finish()
    }
}

impl CodeCleaner {
    /// Builds a cleaner for `doc`. With `watch_mutations` off, enabling scans once and stays
    /// in `EnabledIdle`.
    pub fn new(
        doc: SharedDocument,
        config: &AppConfig,
        settings: Settings,
        clipboard: Arc<dyn ClipboardSink>,
        watch_mutations: bool,
    ) -> Result<Arc<Self>, ScannerError> {
        let options = ScannerOptions::from_config(config)?;
        let debounce = config.debounce_delay;

        Ok(Arc::new_cyclic(|this: &Weak<Self>| {
            let this = this.clone();
            let watcher = DomWatcher::new(
                debounce,
                Arc::new(move || {
                    if let Some(cleaner) = this.upgrade() {
                        cleaner.rescan();
                    }
                }),
            );

            Self {
                doc,
                scanner: PageScanner::new(options),
                clipboard,
                settings: Mutex::new(settings),
                state: Mutex::new(FeatureState::Disabled),
                watcher: Arc::new(watcher),
                watch_mutations,
                feedback_delay: config.feedback_delay,
            }
        }))
    }

    pub fn state(&self) -> FeatureState {
        *lock_or_recover(&self.state)
    }

    pub fn settings(&self) -> Settings {
        *lock_or_recover(&self.settings)
    }

    pub fn document(&self) -> SharedDocument {
        Arc::clone(&self.doc)
    }

    /// Injects styles, then enables the feature if the loaded settings say so.
    pub fn start(&self) -> FeatureState {
        {
            let mut doc = lock_or_recover(&self.doc);
            styles::inject_styles(&mut doc);
        }
        if self.settings().enabled {
            self.enable();
        } else {
            info!("Code cleaner disabled by settings");
        }
        self.state()
    }

    /// Applies a batch of settings changes.
    pub fn on_settings_changed(&self, changes: &StorageChanges) {
        if let Some(change) = changes.get(KEY_ENABLED) {
            let enabled = is_truthy(change.new_value.as_ref());
            lock_or_recover(&self.settings).enabled = enabled;
            if enabled {
                self.enable();
            } else {
                self.disable();
            }
        }
        if let Some(change) = changes.get(KEY_PRESERVE_INDENTATION) {
            let preserve = is_truthy(change.new_value.as_ref());
            lock_or_recover(&self.settings).preserve_indentation = preserve;
            debug!(preserve, "Preserve indentation updated");
        }
    }

    fn enable(&self) {
        let mut doc = lock_or_recover(&self.doc);
        let body = doc.body();
        self.scanner.scan(&mut doc, body);

        let next = if self.watch_mutations {
            self.watcher.start();
            let watcher = Arc::clone(&self.watcher);
            doc.observe(
                body,
                Arc::new(move |record: &MutationRecord| watcher.on_mutation(record)),
            );
            FeatureState::EnabledWatching
        } else {
            FeatureState::EnabledIdle
        };
        *lock_or_recover(&self.state) = next;
        info!(state = ?next, "Code cleaner enabled");
    }

    fn disable(&self) {
        self.watcher.stop();
        let mut doc = lock_or_recover(&self.doc);
        doc.disconnect();
        let body = doc.body();
        self.scanner.cleanup(&mut doc, body);
        *lock_or_recover(&self.state) = FeatureState::Disabled;
        info!("Code cleaner disabled");
    }

    fn rescan(&self) {
        if self.state() != FeatureState::EnabledWatching {
            debug!("Rescan skipped, not watching");
            return;
        }
        let mut doc = lock_or_recover(&self.doc);
        let body = doc.body();
        self.scanner.scan(&mut doc, body);
    }

    /// Registered blocks with their buttons.
    pub fn actions(&self) -> Vec<CopyAction> {
        self.scanner.actions()
    }

    /// The text a copy of `block` would put on the clipboard right now.
    pub fn cleaned_text(&self, block: NodeId) -> String {
        let preserve = self.settings().preserve_indentation;
        let raw = {
            let doc = lock_or_recover(&self.doc);
            self.scanner.extract_code(&doc, block)
        };
        clean_code(&raw, preserve)
    }

    /// Runs the action behind `button`: clean the block's current text, copy it, and show
    /// the outcome on the button. A failed write only affects this click.
    pub async fn copy_clean(&self, button: NodeId) -> Result<String, CopyError> {
        let Some(block) = self.scanner.block_for(button) else {
            warn!(?button, "Copy requested for an unknown button");
            return Err(CopyError::UnknownButton(button));
        };

        let cleaned = self.cleaned_text(block);
        let label = self.scanner.options().button_label.clone();

        match self.clipboard.write_text(&cleaned).await {
            Ok(()) => {
                info!(len = cleaned.len(), "Copied clean code");
                feedback::show_feedback(&self.doc, button, COPIED_MESSAGE, label, self.feedback_delay);
                Ok(cleaned)
            }
            Err(e) => {
                error!(error = %e, "Failed to copy text");
                feedback::show_feedback(&self.doc, button, FAILED_MESSAGE, label, self.feedback_delay);
                Err(CopyError::Clipboard(e))
            }
        }
    }
}
