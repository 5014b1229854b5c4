use crate::summary::{SummaryOptions, DEFAULT_PROJECT_MARKER};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const FILENAME: &str = "hooknotify.toml";

/// Environment variable naming an explicit preferences file.
pub const CONFIG_ENV: &str = "HOOKNOTIFY_CONFIG";

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Chat message template: either an inline Jinja2 string or a path to a
/// template file (relative to the preferences file).
///
/// In TOML this looks like one of:
///
/// ```toml
/// [chat.template]
/// inline = "{{ summary }}"
///
/// # or
///
/// [chat.template]
/// file = "chat.tmpl"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MessageTemplate {
    /// An inline Jinja2 template string.
    Inline(String),
    /// Path to a template file (relative to the preferences file).
    File(String),
}

impl Default for MessageTemplate {
    fn default() -> Self {
        MessageTemplate::Inline("{{ summary }}".into())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VoicePreferences {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for VoicePreferences {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChatPreferences {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URL of the Bot API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub template: MessageTemplate,
}

impl Default for ChatPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: default_api_base(),
            template: MessageTemplate::default(),
        }
    }
}

/// User-facing preferences stored in `hooknotify.toml`.
///
/// Credentials never live here; they come from the environment
/// (see `channels::ChannelConfig`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Preferences {
    /// Path segment preceding the project directory in transcript paths.
    #[serde(default = "default_project_marker")]
    pub project_marker: String,

    /// Upper bound for each outbound call (HTTP request or subprocess).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub voice: VoicePreferences,

    #[serde(default)]
    pub chat: ChatPreferences,

    /// Directory of the file these were loaded from, for resolving
    /// relative template paths.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_api_base() -> String {
    DEFAULT_TELEGRAM_API.into()
}

fn default_project_marker() -> String {
    DEFAULT_PROJECT_MARKER.into()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            project_marker: default_project_marker(),
            timeout_secs: default_timeout_secs(),
            voice: VoicePreferences::default(),
            chat: ChatPreferences::default(),
            base_dir: None,
        }
    }
}

impl Preferences {
    /// The preferences file to use: `explicit`, then `$HOOKNOTIFY_CONFIG`,
    /// then `<config dir>/hooknotify/hooknotify.toml`.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| dirs::config_dir().map(|d| d.join("hooknotify").join(FILENAME)))
    }

    /// Load preferences from `path`.
    ///
    /// A missing file means defaults; nothing is written back. Missing keys
    /// in an existing file are filled in with defaults via serde.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let mut prefs: Preferences = toml::from_str(&contents)
                    .with_context(|| format!("parsing {}", path.display()))?;
                prefs.base_dir = path.parent().map(Path::to_path_buf);
                Ok(prefs)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            project_marker: self.project_marker.clone(),
        }
    }

    /// Resolve the chat message template to a string.
    pub fn load_chat_template(&self) -> Result<String> {
        match &self.chat.template {
            MessageTemplate::Inline(s) => Ok(s.clone()),
            MessageTemplate::File(filename) => {
                let path = match &self.base_dir {
                    Some(dir) => dir.join(filename),
                    None => PathBuf::from(filename),
                };
                fs::read_to_string(&path)
                    .with_context(|| format!("reading template {}", path.display()))
            }
        }
    }
}
