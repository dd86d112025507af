use thiserror::Error;

pub type Result<T> = std::result::Result<T, TtsError>;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Nothing to synthesize")]
    EmptyInput,
}

impl From<reqwest::Error> for TtsError {
    fn from(err: reqwest::Error) -> Self {
        TtsError::Network(err.to_string())
    }
}

impl From<base64::DecodeError> for TtsError {
    fn from(err: base64::DecodeError) -> Self {
        TtsError::Parse(format!("audioContent is not valid base64: {err}"))
    }
}
