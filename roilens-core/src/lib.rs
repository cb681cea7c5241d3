pub mod config;
pub mod types;

pub use config::{Config, ConfigError, Secrets, SecretsError, Settings, SettingsError};
pub use types::{
    DocumentEntity, DocumentOutcome, ExtractedDocument, RoiRequest, ValidationError,
};
