//! Error types for the reconcile library.

use thiserror::Error;

/// Errors that can occur while reading, reconciling or writing exports.
///
/// Every variant carries owned strings so the error stays `Clone` and can be
/// reported after the inputs it refers to are gone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Error deserializing the JSON export
    #[error("JSON error: {0}")]
    Json(String),

    /// A JSON item lacks a key that is required for login items
    #[error("item '{item}' is missing required key '{key}'")]
    MissingKey { item: String, key: String },

    /// A JSON item carries a key with an unexpected value type
    #[error("item '{item}': key '{key}' must be {expected}")]
    InvalidValue {
        item: String,
        key: String,
        expected: &'static str,
    },

    /// Encrypted JSON exports cannot be read
    #[error("encrypted exports are not supported; export the vault as unencrypted JSON")]
    EncryptedExport,

    /// Error parsing or serializing the XML export
    #[error("XML error: {0}")]
    Xml(String),

    /// A tree entry lacks one of its required string fields
    #[error("entry '{entry}' is missing required field '{field}'")]
    MissingField { entry: String, field: String },

    /// An entry or item has an empty name, which cannot act as a join key
    #[error("{source_kind} contains an entry with an empty name")]
    EmptyName { source_kind: &'static str },

    /// Error writing interchange CSV
    #[error("CSV error: {0}")]
    Csv(String),

    /// Reading or writing a file failed
    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },
}

impl SyncError {
    pub(crate) fn io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        SyncError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Json(err.to_string())
    }
}

impl From<quick_xml::Error> for SyncError {
    fn from(err: quick_xml::Error) -> Self {
        SyncError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SyncError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        SyncError::Xml(err.to_string())
    }
}

impl From<csv::Error> for SyncError {
    fn from(err: csv::Error) -> Self {
        SyncError::Csv(err.to_string())
    }
}

/// Result type alias for reconcile operations.
pub type SyncResult<T> = Result<T, SyncError>;
