use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserlessError>;

/// Errors from the Browserless `/content` endpoint.
#[derive(Debug, Error)]
pub enum BrowserlessError {
    #[error("Browserless unreachable: {0}")]
    Network(String),

    /// Browserless answered but could not render the page.
    #[error("Browserless returned {status} while rendering: {message}")]
    Api { status: u16, message: String },

    /// Bad base URL or client setup; retrying will not help.
    #[error("Invalid Browserless setup: {0}")]
    Client(String),
}

impl From<reqwest::Error> for BrowserlessError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            BrowserlessError::Client(err.to_string())
        } else {
            BrowserlessError::Network(err.to_string())
        }
    }
}
