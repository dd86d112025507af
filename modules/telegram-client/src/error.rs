use thiserror::Error;

pub type Result<T> = std::result::Result<T, TelegramError>;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(String),

    /// The Bot API answered with `ok: false` or a non-2xx status.
    #[error("API error (code {code}): {description}")]
    Api { code: u16, description: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TelegramError::Parse(err.to_string())
        } else {
            TelegramError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TelegramError {
    fn from(err: serde_json::Error) -> Self {
        TelegramError::Parse(err.to_string())
    }
}
