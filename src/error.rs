//! Error types shared across the crate.

use std::path::PathBuf;

/// Errors raised by [`Store`](crate::store::Store) mutations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A middleware refused the value; nothing was committed.
    #[error("middleware rejected `{key}`: {reason}")]
    Rejected { key: String, reason: String },

    /// `update` needs both the current value and the patch to be objects.
    #[error("cannot merge into `{key}`: {found} is not an object")]
    NotAnObject { key: String, found: &'static str },

    /// A listener kept writing back into the store from its own notification.
    #[error("notification depth {depth} exceeded while writing `{key}`")]
    NotifyDepthExceeded { key: String, depth: usize },

    #[error("value for `{key}` is not representable as JSON: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StoreError {
    /// Shorthand for middleware that wants to veto a write.
    pub fn rejected(key: &str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while registering routes.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("route pattern `{pattern}` does not compile: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors from a [`StorageBackend`](crate::store::StorageBackend).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid storage key `{0}`")]
    InvalidKey(String),

    #[error("snapshot under `{key}` is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors loading a [`ClientConfig`](crate::config::ClientConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors from the REST client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("network: {0}")]
    Network(reqwest::Error),

    #[error("decode: {0}")]
    Decode(String),

    /// The collection is not listed per client on the backend.
    #[error("`{resource}` cannot be listed per client")]
    NotNested { resource: &'static str },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err)
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
