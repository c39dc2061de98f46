use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VersetError {
    #[error("Cannot read version store {path}: {reason}")]
    StoreUnreadable { path: PathBuf, reason: String },

    #[error("Unknown version key: {0}")]
    UnknownKey(String),

    #[error("Invalid {kind} value for {key}: {value:?}")]
    InvalidValueFormat {
        key: String,
        kind: String,
        value: String,
    },

    #[error("{key} = {value:?} is below minimum {minimum:?} ({min_key})")]
    BelowMinimumVersion {
        key: String,
        value: String,
        min_key: String,
        minimum: String,
    },

    #[error("Registry configuration error: {0}")]
    RegistryConfig(String),

    #[error("No match for {key} in {path} (locator {locator:?})")]
    NoMatch {
        key: String,
        path: PathBuf,
        locator: String,
    },

    #[error("Ambiguous locator for {key} in {path}: {count} matches")]
    AmbiguousMatch {
        key: String,
        path: PathBuf,
        count: usize,
    },

    #[error("Consistency violation in {path}: {key} reads {found:?}, store has {expected:?}")]
    ConsistencyViolation {
        path: PathBuf,
        key: String,
        found: String,
        expected: String,
    },

    #[error("Failed to persist {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("Cannot bump {key}: {reason}")]
    UnsupportedBumpTarget { key: String, reason: String },

    #[error("Rollback failed after {cause}; could not restore {path}: {reason}")]
    RollbackFailed {
        cause: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid change: {0}")]
    InvalidChange(String),

    #[error("Validation failed with {0} finding(s)")]
    ValidationFailed(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, VersetError>;
