use thiserror::Error;

use perle_sources::SourceError;
use perle_store::StoreError;
use perle_studio::ProductionError;

use crate::delivery::DeliveryError;

/// Why a cycle ended without publishing.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Source returned no items")]
    EmptySource,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Production(#[from] ProductionError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Cycle panicked: {0}")]
    Panicked(String),
}

impl CycleError {
    /// Configuration problems get logged at error level; the rest are
    /// expected operational failures.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Delivery(DeliveryError::Configuration(_))
                | Self::Production(ProductionError::Config { .. })
                | Self::Source(SourceError::Config(_))
        )
    }
}
