use thiserror::Error;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Source returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Source misconfigured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Unavailable(err.to_string())
    }
}

impl From<browserless_client::BrowserlessError> for SourceError {
    fn from(err: browserless_client::BrowserlessError) -> Self {
        match err {
            browserless_client::BrowserlessError::Client(msg) => SourceError::Config(msg),
            other => SourceError::Unavailable(other.to_string()),
        }
    }
}
