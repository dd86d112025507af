use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Which content source feeds the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Published spreadsheet exported as CSV.
    Tabular,
    /// Rendered web page scraped with selectors.
    Document,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tabular" | "sheet" | "csv" => Ok(Self::Tabular),
            "document" | "page" | "scrape" => Ok(Self::Document),
            other => Err(format!("unknown source kind '{other}' (expected tabular|document)")),
        }
    }
}

/// Where finished videos go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Telegram,
    DryRun,
}

impl FromStr for DeliveryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "dry-run" | "dryrun" | "none" => Ok(Self::DryRun),
            other => Err(format!("unknown delivery kind '{other}' (expected telegram|dry-run)")),
        }
    }
}

/// Secrets and environment-specific settings. Tunables live in
/// [`crate::FileConfig`].
///
/// Credentials are optional here: a missing token surfaces as a
/// configuration error of the step that needs it, not at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,

    // Source
    pub source_kind: SourceKind,
    pub sheet_csv_url: Option<String>,
    pub scrape_url: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,

    // Studio
    pub tts_api_key: Option<String>,
    pub tts_endpoint: Option<String>,
    pub font_path: Option<PathBuf>,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,

    // Delivery
    pub delivery_kind: DeliveryKind,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Operator alerts
    pub alert_webhook_url: Option<String>,
}

impl Config {
    /// Load from the process environment (after reading `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let source_kind = match get("SOURCE_KIND") {
            Some(v) => v.parse().map_err(|message| ConfigError::Invalid {
                key: "SOURCE_KIND",
                message,
            })?,
            None => SourceKind::Tabular,
        };
        let delivery_kind = match get("DELIVERY_KIND") {
            Some(v) => v.parse().map_err(|message| ConfigError::Invalid {
                key: "DELIVERY_KIND",
                message,
            })?,
            None => DeliveryKind::Telegram,
        };

        let config = Self {
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data")),
            config_path: get("PERLE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("perle.toml")),
            source_kind,
            sheet_csv_url: get("SHEET_CSV_URL"),
            scrape_url: get("SCRAPE_URL"),
            browserless_url: get("BROWSERLESS_URL"),
            browserless_token: get("BROWSERLESS_TOKEN"),
            tts_api_key: get("TTS_API_KEY"),
            tts_endpoint: get("TTS_ENDPOINT"),
            font_path: get("FONT_PATH").map(PathBuf::from),
            ffmpeg_bin: get("FFMPEG_BIN").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_bin: get("FFPROBE_BIN").unwrap_or_else(|| "ffprobe".to_string()),
            delivery_kind,
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: get("TELEGRAM_CHAT_ID"),
            alert_webhook_url: get("ALERT_WEBHOOK_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    /// The source URL is the one setting without which nothing can run.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.source_kind {
            SourceKind::Tabular if self.sheet_csv_url.is_none() => {
                Err(ConfigError::Missing("SHEET_CSV_URL"))
            }
            SourceKind::Document if self.scrape_url.is_none() => {
                Err(ConfigError::Missing("SCRAPE_URL"))
            }
            _ => Ok(()),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("perle.json")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.data_dir.join("videos")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }

    pub fn log_redacted(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let n = v.chars().count().min(5);
                    let head: String = v.chars().take(n).collect();
                    format!("{head}...({} chars)", v.chars().count())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATA_DIR: {}", self.data_dir.display());
        tracing::info!("  PERLE_CONFIG: {}", self.config_path.display());
        tracing::info!("  SOURCE_KIND: {:?}", self.source_kind);
        tracing::info!("  SHEET_CSV_URL: {}", self.sheet_csv_url.as_deref().unwrap_or("<not set>"));
        tracing::info!("  SCRAPE_URL: {}", self.scrape_url.as_deref().unwrap_or("<not set>"));
        tracing::info!("  BROWSERLESS_URL: {}", self.browserless_url.as_deref().unwrap_or("<not set>"));
        tracing::info!("  BROWSERLESS_TOKEN: {}", preview_opt(&self.browserless_token));
        tracing::info!("  TTS_API_KEY: {}", preview_opt(&self.tts_api_key));
        tracing::info!("  DELIVERY_KIND: {:?}", self.delivery_kind);
        tracing::info!("  TELEGRAM_BOT_TOKEN: {}", preview_opt(&self.telegram_bot_token));
        tracing::info!("  TELEGRAM_CHAT_ID: {}", self.telegram_chat_id.as_deref().unwrap_or("<not set>"));
        tracing::info!("  ALERT_WEBHOOK_URL: {}", preview_opt(&self.alert_webhook_url));
    }
}
