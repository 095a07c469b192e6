//! Error types for the settings store.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("schema declares reserved key '{0}'")]
    ReservedKey(String),

    #[error("schema declares key '{0}' more than once")]
    DuplicateKey(String),

    #[error("schema item has an empty key")]
    EmptyKey,
}
