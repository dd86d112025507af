pub mod config;
pub mod error;
pub mod file_config;
pub mod text;
pub mod types;

pub use config::{Config, DeliveryKind, SourceKind};
pub use error::{ConfigError, ValidationError};
pub use file_config::FileConfig;
pub use types::{ContentItem, ItemId, Publication, MIN_MEANINGFUL_CHARS};
