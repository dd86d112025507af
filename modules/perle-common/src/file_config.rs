use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

/// TOML-backed tunables. Every section and field has a default, so an
/// absent file is the same as an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub schedule: ScheduleConfig,
    pub selection: SelectionConfig,
    pub narration: NarrationConfig,
    pub video: VideoConfig,
    pub source: SourceConfig,
    pub caption: CaptionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScheduleConfig {
    /// Local wall-clock times (`HH:MM`) at which `serve` runs a cycle.
    pub times: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            times: vec!["09:00".to_string(), "18:00".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SelectionConfig {
    /// Pick at random among this many most recently added unpublished items.
    pub window: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { window: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NarrationConfig {
    pub language: String,
    pub voice: Option<String>,
    pub speaking_rate: f32,
    pub max_attempts: u32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            language: "it-IT".to_string(),
            voice: None,
            speaking_rate: 1.0,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub font_size: f32,
    pub min_font_size: f32,
    pub line_spacing: f32,
    pub margin: u32,
    pub background: String,
    pub foreground: String,
    pub accent: String,
    pub tail_padding_secs: f32,
    pub encode_timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            font_size: 72.0,
            min_font_size: 40.0,
            line_spacing: 1.3,
            margin: 90,
            background: "#1b1b2f".to_string(),
            foreground: "#f5f5f5".to_string(),
            accent: "#e7b75f".to_string(),
            tail_padding_secs: 1.0,
            encode_timeout_secs: 180,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SourceConfig {
    /// Candidate container selectors, tried in order; the first with a match wins.
    pub selectors: Vec<String>,
    /// Narrower child selector for the snippet body inside a container.
    pub text_selector: Option<String>,
    pub category_selector: Option<String>,
    pub author_selector: Option<String>,
    /// Browserless waits for this selector before returning the DOM.
    pub wait_for: Option<String>,
    pub max_chars: usize,
    pub delimiter: char,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            selectors: vec![
                ".perla".to_string(),
                "article".to_string(),
                "blockquote".to_string(),
            ],
            text_selector: Some(".perla-text".to_string()),
            category_selector: Some(".categoria".to_string()),
            author_selector: Some(".autore".to_string()),
            wait_for: None,
            max_chars: 500,
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CaptionConfig {
    pub hashtags: Vec<String>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            hashtags: vec!["#perle".to_string()],
        }
    }
}

impl FileConfig {
    /// Parse a TOML string.
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }
}
