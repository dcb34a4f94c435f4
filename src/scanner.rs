//! Finds code blocks in a document and decorates each with a "Copy Clean" button.
//!
//! A scan is idempotent: registered blocks carry the `data-ccc-processed` marker and are skipped
//! on later passes. [`PageScanner::cleanup`] undoes every change a scan made. Wrappers and
//! buttons taken down by a cleanup are kept and reused by later scans.

use std::sync::Mutex;

use scraper::{CaseSensitivity, Selector};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::dom::{Document, NodeId};
use crate::lock_or_recover;

pub const PROCESSED_ATTR: &str = "data-ccc-processed";
pub const WRAPPER_CLASS: &str = "ccc-copy-button-wrapper";
pub const BUTTON_CLASS: &str = "ccc-copy-button";

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("Invalid code selectors {selectors:?}: {message}")]
    CodeSelectors { selectors: String, message: String },
    #[error("Invalid noise selectors {selectors:?}: {message}")]
    NoiseSelectors { selectors: String, message: String },
}

/// What counts as a code block and how its button looks.
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    pub code_selectors: Selector,
    pub noise_selectors: Selector,
    /// Trimmed text must be strictly longer than this.
    pub min_text_len: usize,
    pub button_label: String,
}

impl ScannerOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self, ScannerError> {
        let code_selectors = Selector::parse(&config.code_selectors).map_err(|e| {
            ScannerError::CodeSelectors {
                selectors: config.code_selectors.clone(),
                message: e.to_string(),
            }
        })?;
        let noise_selectors = Selector::parse(&config.noise_selectors).map_err(|e| {
            ScannerError::NoiseSelectors {
                selectors: config.noise_selectors.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(Self {
            code_selectors,
            noise_selectors,
            min_text_len: config.min_text_len,
            button_label: config.button_label.clone(),
        })
    }
}

/// A registered block and the button injected for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyAction {
    pub button: NodeId,
    pub block: NodeId,
}

/// A detached wrapper and the button inside it.
#[derive(Debug, Clone, Copy)]
struct Control {
    wrapper: NodeId,
    button: NodeId,
}

#[derive(Debug)]
pub struct PageScanner {
    options: ScannerOptions,
    /// Registered actions in registration order.
    actions: Mutex<Vec<CopyAction>>,
    spare: Mutex<Vec<Control>>,
}

impl PageScanner {
    pub fn new(options: ScannerOptions) -> Self {
        Self {
            options,
            actions: Mutex::new(Vec::new()),
            spare: Mutex::new(Vec::new()),
        }
    }

    pub fn options(&self) -> &ScannerOptions {
        &self.options
    }

    /// Registers every qualifying block under `root` that is not registered yet.
    /// Returns the number of newly registered blocks.
    pub fn scan(&self, doc: &mut Document, root: NodeId) -> usize {
        let candidates = doc.select_all(root, &self.options.code_selectors);
        let mut registered = 0;

        for block in candidates {
            if doc.has_attr(block, PROCESSED_ATTR) {
                continue;
            }
            if doc.text_content(block).trim().chars().count() <= self.options.min_text_len {
                continue;
            }
            if self.has_matching_ancestor(doc, block) {
                continue;
            }

            let Some(button) = self.add_copy_button(doc, block) else {
                debug!(?block, "Code block has no parent, skipping");
                continue;
            };
            doc.set_attr(block, PROCESSED_ATTR, "true");
            lock_or_recover(&self.actions).push(CopyAction { button, block });
            registered += 1;
        }

        if registered > 0 {
            info!(registered, "Registered code blocks");
        }
        registered
    }

    /// Nested matches (e.g. `<code>` inside `<pre>`) defer to the outermost block.
    fn has_matching_ancestor(&self, doc: &Document, block: NodeId) -> bool {
        doc.ancestors(block)
            .any(|ancestor| doc.matches(ancestor, &self.options.code_selectors))
    }

    /// Wraps `block` in a relatively positioned container holding the button, then the block.
    fn add_copy_button(&self, doc: &mut Document, block: NodeId) -> Option<NodeId> {
        let parent = doc.parent(block)?;
        let control = self.take_control(doc);

        doc.insert_before(parent, control.wrapper, block);
        doc.append_child(control.wrapper, block);
        doc.insert_before(control.wrapper, control.button, block);
        Some(control.button)
    }

    /// A spare wrapper/button pair reset to its initial look, or a new one.
    fn take_control(&self, doc: &mut Document) -> Control {
        if let Some(control) = lock_or_recover(&self.spare).pop() {
            doc.set_text(control.button, &self.options.button_label);
            doc.remove_attr(control.button, "style");
            return control;
        }

        let wrapper = doc.create_element("div");
        doc.set_attr(wrapper, "class", WRAPPER_CLASS);
        doc.set_attr(wrapper, "style", "position: relative;");

        let button = doc.create_element("button");
        doc.set_attr(button, "class", BUTTON_CLASS);
        doc.set_attr(button, "type", "button");
        doc.set_text(button, &self.options.button_label);
        doc.append_child(wrapper, button);
        Control { wrapper, button }
    }

    /// Removes every injected button and marker under `root`, putting blocks back where they
    /// were. Safe to call when nothing was scanned.
    pub fn cleanup(&self, doc: &mut Document, root: NodeId) {
        let wrappers: Vec<NodeId> = doc
            .descendants(root)
            .into_iter()
            .filter(|id| has_class(doc, *id, WRAPPER_CLASS))
            .collect();

        let mut removed = 0;
        let mut spare = lock_or_recover(&self.spare);
        for wrapper in wrappers {
            let Some(parent) = doc.parent(wrapper) else {
                continue;
            };
            let mut button = None;
            for child in doc.children(wrapper) {
                if button.is_none() && has_class(doc, child, BUTTON_CLASS) {
                    button = Some(child);
                } else {
                    doc.insert_before(parent, child, wrapper);
                }
            }
            doc.detach(wrapper);
            if let Some(button) = button {
                spare.push(Control { wrapper, button });
            }
            removed += 1;
        }

        for marked in doc.descendants(root) {
            doc.remove_attr(marked, PROCESSED_ATTR);
        }

        lock_or_recover(&self.actions).clear();
        if removed > 0 {
            info!(removed, "Removed copy buttons");
        }
    }

    /// Reads a block's code: its text without noise elements. The page is not modified.
    pub fn extract_code(&self, doc: &Document, block: NodeId) -> String {
        doc.text_content_excluding(block, &self.options.noise_selectors)
    }

    /// Block registered for `button`, if any.
    pub fn block_for(&self, button: NodeId) -> Option<NodeId> {
        lock_or_recover(&self.actions)
            .iter()
            .find(|action| action.button == button)
            .map(|action| action.block)
    }

    /// All registered actions in registration order.
    pub fn actions(&self) -> Vec<CopyAction> {
        lock_or_recover(&self.actions).clone()
    }
}

fn has_class(doc: &Document, id: NodeId, class: &str) -> bool {
    doc.element(id)
        .is_some_and(|el| el.has_class(class, CaseSensitivity::CaseSensitive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> PageScanner {
        PageScanner::new(ScannerOptions::from_config(&AppConfig::default()).unwrap())
    }

    fn sel(selectors: &str) -> Selector {
        Selector::parse(selectors).unwrap()
    }

    fn count(doc: &Document, selectors: &str) -> usize {
        doc.select_all(doc.root(), &sel(selectors)).len()
    }

    const PAGE: &str = r#"<html><head></head><body>
        <p>Intro text with <code>x</code> inline.</p>
        <pre><code>fn main() {
    println!("hello");
}</code></pre>
        <div class="sourcecode"><span class="line-number">1</span>$ cargo run --release</div>
    </body></html>"#;

    #[test]
    fn scan_registers_outer_blocks_only() {
        let mut doc = Document::parse_html(PAGE);
        let scanner = scanner();
        let body = doc.body();

        assert_eq!(scanner.scan(&mut doc, body), 2);
        assert_eq!(count(&doc, ".ccc-copy-button"), 2);
        assert_eq!(count(&doc, "[data-ccc-processed]"), 2);

        let pre = doc.select_all(body, &sel("pre"))[0];
        let code_in_pre = doc.select_all(pre, &sel("code"))[0];
        assert!(doc.has_attr(pre, PROCESSED_ATTR));
        assert!(!doc.has_attr(code_in_pre, PROCESSED_ATTR));
    }

    #[test]
    fn scan_is_idempotent() {
        let mut doc = Document::parse_html(PAGE);
        let scanner = scanner();
        let body = doc.body();

        scanner.scan(&mut doc, body);
        assert_eq!(scanner.scan(&mut doc, body), 0);
        assert_eq!(count(&doc, ".ccc-copy-button"), 2);
        assert_eq!(count(&doc, ".ccc-copy-button-wrapper"), 2);
        assert_eq!(scanner.actions().len(), 2);
    }

    #[test]
    fn short_blocks_are_ignored() {
        let mut doc = Document::parse_html("<pre>  tiny  </pre><pre>0123456789</pre>");
        let body = doc.body();
        assert_eq!(scanner().scan(&mut doc, body), 0);
    }

    #[test]
    fn button_sits_before_block_inside_wrapper() {
        let mut doc = Document::parse_html("<pre>echo hello world</pre>");
        let scanner = scanner();
        let body = doc.body();
        scanner.scan(&mut doc, body);

        let action = scanner.actions()[0];
        let wrapper = doc.parent(action.block).unwrap();
        assert_eq!(doc.children(wrapper), vec![action.button, action.block]);
        assert_eq!(doc.text_content(action.button), "Copy Clean");
        assert_eq!(doc.attr(wrapper, "style"), Some("position: relative;"));
        assert_eq!(doc.parent(wrapper), Some(body));
        assert_eq!(scanner.block_for(action.button), Some(action.block));
    }

    #[test]
    fn cleanup_restores_the_original_markup() {
        let mut doc = Document::parse_html(PAGE);
        let scanner = scanner();
        let body = doc.body();
        let before = doc.outer_html(body);

        scanner.scan(&mut doc, body);
        scanner.scan(&mut doc, body);
        scanner.cleanup(&mut doc, body);

        assert_eq!(doc.outer_html(body), before);
        assert_eq!(count(&doc, ".ccc-copy-button, .ccc-copy-button-wrapper"), 0);
        assert_eq!(count(&doc, "[data-ccc-processed]"), 0);
        assert!(scanner.actions().is_empty());

        // Blocks can be registered again after a teardown.
        assert_eq!(scanner.scan(&mut doc, body), 2);
    }

    #[test]
    fn cleanup_without_scan_is_a_no_op() {
        let mut doc = Document::parse_html(PAGE);
        let body = doc.body();
        let before = doc.outer_html(body);
        scanner().cleanup(&mut doc, body);
        assert_eq!(doc.outer_html(body), before);
    }

    #[test]
    fn repeated_teardown_reuses_controls() {
        let mut doc = Document::parse_html(PAGE);
        let scanner = scanner();
        let body = doc.body();

        scanner.scan(&mut doc, body);
        let first_buttons: Vec<NodeId> = scanner.actions().iter().map(|a| a.button).collect();
        let allocated = doc.node_count();

        for _ in 0..200 {
            scanner.cleanup(&mut doc, body);
            assert_eq!(scanner.scan(&mut doc, body), 2);
        }
        assert_eq!(doc.node_count(), allocated);

        let mut buttons: Vec<NodeId> = scanner.actions().iter().map(|a| a.button).collect();
        buttons.retain(|b| first_buttons.contains(b));
        assert_eq!(buttons.len(), 2);
        for action in scanner.actions() {
            assert_eq!(doc.text_content(action.button), "Copy Clean");
        }
    }

    #[test]
    fn reused_button_loses_feedback_look() {
        let mut doc = Document::parse_html("<pre>echo hello world</pre>");
        let scanner = scanner();
        let body = doc.body();
        scanner.scan(&mut doc, body);

        let button = scanner.actions()[0].button;
        doc.set_text(button, "Copied!");
        doc.set_attr(button, "style", "background-color: #4CAF50;");
        scanner.cleanup(&mut doc, body);
        scanner.scan(&mut doc, body);

        assert_eq!(scanner.actions()[0].button, button);
        assert_eq!(doc.text_content(button), "Copy Clean");
        assert_eq!(doc.attr(button, "style"), None);
    }

    #[test]
    fn extract_code_drops_noise_elements() {
        let doc = Document::parse_html(
            r#"<pre><div class="toolbar">Copy</div><span class="line-number">1</span>let x = 1;
<span aria-hidden="true">2</span>let y = 2;<button class="copy-button">copy</button></pre>"#,
        );
        let pre = doc.select_all(doc.root(), &sel("pre"))[0];
        assert_eq!(scanner().extract_code(&doc, pre), "let x = 1;\nlet y = 2;");
        // The page itself is untouched.
        assert!(doc.text_content(pre).contains("Copy"));
    }

    #[test]
    fn configured_selectors_accept_full_css() {
        let config = AppConfig {
            code_selectors: ".highlight pre, div:not(.nav) > code, [data-lang] code".to_string(),
            noise_selectors: "pre > .gutter, .highlight .prompt".to_string(),
            ..AppConfig::default()
        };
        let scanner = PageScanner::new(ScannerOptions::from_config(&config).unwrap());
        let mut doc = Document::parse_html(
            r#"<div class="highlight"><pre><span class="gutter">1</span><span class="prompt">$ </span>cargo test --all</pre></div>
            <pre>outside any highlight block</pre>
            <div class="nav"><code>navigation code text</code></div>
            <section data-lang="rust"><code>let answer = 42;</code></section>"#,
        );
        let body = doc.body();

        assert_eq!(scanner.scan(&mut doc, body), 2);
        let texts: Vec<String> = scanner
            .actions()
            .iter()
            .map(|action| scanner.extract_code(&doc, action.block))
            .collect();
        assert_eq!(texts, ["cargo test --all", "let answer = 42;"]);
    }

    #[test]
    fn invalid_selectors_are_reported() {
        let config = AppConfig {
            code_selectors: "pre >".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            ScannerOptions::from_config(&config),
            Err(ScannerError::CodeSelectors { .. })
        ));

        let config = AppConfig {
            noise_selectors: ".toolbar,".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            ScannerOptions::from_config(&config),
            Err(ScannerError::NoiseSelectors { .. })
        ));
    }
}
