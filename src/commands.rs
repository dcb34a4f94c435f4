//! Command-line commands: clean text, scan saved pages, copy a block, manage settings.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfig, ConfigError};
use crate::controller::{CodeCleaner, CopyError, FeatureState};
use crate::dom::Document;
use crate::scanner::ScannerError;
use crate::settings::{Settings, SettingsStore, KEY_ENABLED, KEY_PRESERVE_INDENTATION};
use crate::system::{clean_code, SystemClipboard};

pub const USAGE: &str = "Usage: copy-code-cleaner <command>

Commands:
  clean [--normalize-indent]   Clean code read from stdin and print it
  scan <file.html>             List the code blocks a page would get buttons for
  copy <file.html> <index>     Copy the cleaned block at <index> to the clipboard
  settings                     Show the stored settings
  set <key> <true|false>       Change a setting (isEnabled, preserveIndentation)
  install                      Write the default settings";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Usage(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scanner(#[from] ScannerError),
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error("Copy Code Cleaner is disabled (run `set isEnabled true`)")]
    Disabled,
    #[error("No code block at index {index} ({count} found)")]
    NoSuchBlock { index: usize, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clean { normalize_indent: bool },
    Scan { file: PathBuf },
    Copy { file: PathBuf, index: usize },
    Settings,
    Set { key: String, value: bool },
    Install,
}

impl Command {
    pub fn parse<I>(args: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let Some(name) = args.next() else {
            return Err(CommandError::Usage("Missing command".to_string()));
        };

        let command = match name.as_str() {
            "clean" => {
                let normalize_indent = match args.next().as_deref() {
                    None => false,
                    Some("--normalize-indent") => true,
                    Some(other) => {
                        return Err(CommandError::Usage(format!("Unknown option: {}", other)))
                    }
                };
                Self::Clean { normalize_indent }
            }
            "scan" => Self::Scan {
                file: required(args.next(), "scan needs a file")?.into(),
            },
            "copy" => {
                let file: PathBuf = required(args.next(), "copy needs a file")?.into();
                let index = required(args.next(), "copy needs a block index")?;
                let index: usize = index
                    .parse()
                    .map_err(|_| CommandError::Usage(format!("Invalid block index: {}", index)))?;
                Self::Copy { file, index }
            }
            "settings" => Self::Settings,
            "set" => {
                let key = required(args.next(), "set needs a key")?;
                if key != KEY_ENABLED && key != KEY_PRESERVE_INDENTATION {
                    return Err(CommandError::Usage(format!("Unknown setting: {}", key)));
                }
                let value = match required(args.next(), "set needs a value")?.as_str() {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(CommandError::Usage(format!(
                            "Expected true or false, got {}",
                            other
                        )))
                    }
                };
                Self::Set { key, value }
            }
            "install" => Self::Install,
            other => return Err(CommandError::Usage(format!("Unknown command: {}", other))),
        };

        if let Some(extra) = args.next() {
            return Err(CommandError::Usage(format!("Unexpected argument: {}", extra)));
        }
        Ok(command)
    }
}

fn required(arg: Option<String>, message: &str) -> Result<String, CommandError> {
    arg.ok_or_else(|| CommandError::Usage(message.to_string()))
}

/// Runs `command`, printing results to stdout.
pub async fn run(command: Command, config: &AppConfig) -> Result<(), CommandError> {
    match command {
        Command::Clean { normalize_indent } => {
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            let preserve = !normalize_indent && open_store().settings().preserve_indentation;
            println!("{}", clean_code(&raw, preserve));
        }
        Command::Scan { file } => {
            let cleaner = load_page(&file, config, open_store().settings())?;
            let actions = cleaner.actions();
            for (index, action) in actions.iter().enumerate() {
                let text = cleaner.cleaned_text(action.block);
                let first_line = text.lines().next().unwrap_or_default();
                println!("[{}] {} lines: {}", index, text.lines().count(), first_line);
            }
            info!(blocks = actions.len(), path = %file.display(), "Scan finished");
        }
        Command::Copy { file, index } => {
            let cleaner = load_page(&file, config, open_store().settings())?;
            let actions = cleaner.actions();
            let action = actions.get(index).ok_or(CommandError::NoSuchBlock {
                index,
                count: actions.len(),
            })?;
            let copied = cleaner.copy_clean(action.button).await?;
            println!("Copied {} lines", copied.lines().count());
        }
        Command::Settings => {
            let settings = open_store().settings();
            println!("{}: {}", KEY_ENABLED, settings.enabled);
            println!("{}: {}", KEY_PRESERVE_INDENTATION, settings.preserve_indentation);
        }
        Command::Set { key, value } => {
            let store = SettingsStore::open_default()?;
            let mut updates = serde_json::Map::new();
            updates.insert(key.clone(), Value::Bool(value));
            store.set(updates)?;
            println!("{}: {}", key, value);
        }
        Command::Install => {
            SettingsStore::open_default()?.install_defaults()?;
            println!("Default settings written");
        }
    }
    Ok(())
}

/// Settings store at the default location, or defaults in memory if it cannot be read.
fn open_store() -> SettingsStore {
    match SettingsStore::open_default() {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "Could not open settings, using defaults");
            SettingsStore::in_memory()
        }
    }
}

/// Parses a saved page and runs the cleaner over it once.
fn load_page(
    path: &Path,
    config: &AppConfig,
    settings: Settings,
) -> Result<Arc<CodeCleaner>, CommandError> {
    let html = fs::read_to_string(path)?;
    let doc = Arc::new(Mutex::new(Document::parse_html(&html)));
    let cleaner = CodeCleaner::new(
        doc,
        config,
        settings,
        Arc::new(SystemClipboard::new()),
        false,
    )?;
    if cleaner.start() == FeatureState::Disabled {
        return Err(CommandError::Disabled);
    }
    Ok(cleaner)
}
