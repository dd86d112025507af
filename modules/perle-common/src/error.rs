use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

/// Why a candidate was refused at the ingestion boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("text is empty")]
    EmptyText,

    #[error("text has {found} meaningful characters, need at least {min}")]
    TooShort { found: usize, min: usize },

    #[error("id is empty")]
    EmptyId,

    #[error("record {id} is marked published but lacks {missing}")]
    IncompletePublication { id: String, missing: &'static str },
}
