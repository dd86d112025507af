use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProductionError>;

/// Sub-step of artifact production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Narration,
    Render,
    Compose,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Narration => write!(f, "narration"),
            Self::Render => write!(f, "render"),
            Self::Compose => write!(f, "compose"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProductionError {
    #[error("{stage} failed: {message}")]
    Failed { stage: Stage, message: String },

    /// Missing key, font or binary. Retrying will not help.
    #[error("{stage} not configured: {message}")]
    Config { stage: Stage, message: String },
}

impl ProductionError {
    pub fn failed(stage: Stage, message: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            message: message.into(),
        }
    }

    pub fn config(stage: Stage, message: impl Into<String>) -> Self {
        Self::Config {
            stage,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Failed { stage, .. } | Self::Config { stage, .. } => *stage,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
