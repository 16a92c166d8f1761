/// This module defines the error types for fedscout.
///
/// # Error Taxonomy
///
/// Errors fall into three groups with different propagation rules:
///
/// 1. **Backend failures** (`Backend`, `Timeout`)
///    Raised while a performer runs or crawls. They are isolated to the
///    performer that produced them and reported through the listener's
///    `on_error` callback, tagged with the session token:
///    ```rust,ignore
///    listener.on_error(token, &SearchError::backend("tpb", "connection reset"));
///    ```
///
/// 2. **Caller errors** (`MalformedFilter`, `StaleToken`, `SessionClosed`)
///    Returned directly to the caller before anything is dispatched:
///    ```rust,ignore
///    match SearchRequest::parse("ubuntu +:keyword:") {
///        Ok(request) => manager.begin(request),
///        Err(SearchError::MalformedFilter(msg)) => // Show the message,
///        Err(e) => // Handle other errors
///    }
///    ```
///
/// 3. **Setup errors** (`WorkerPool`, `ConfigError`, `IoError`)
///    Raised while building the engine; fatal for that engine instance only.
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations
pub type ScoutResult<T> = Result<T, SearchError>;

/// Errors that can occur while dispatching, filtering or ranking a search
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Backend error in {performer}: {message}")]
    Backend { performer: String, message: String },
    #[error("Performer {performer} exceeded its deadline of {}", format_deadline(.deadline))]
    Timeout { performer: String, deadline: Duration },
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),
    #[error("Stale search token: {0}")]
    StaleToken(u64),
    #[error("Search session {0} has already completed")]
    SessionClosed(u64),
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn format_deadline(deadline: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*deadline)
}

impl SearchError {
    pub fn backend(performer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            performer: performer.into(),
            message: message.into(),
        }
    }

    pub fn timeout(performer: impl Into<String>, deadline: Duration) -> Self {
        Self::Timeout {
            performer: performer.into(),
            deadline,
        }
    }

    pub fn malformed_filter(msg: impl Into<String>) -> Self {
        Self::MalformedFilter(msg.into())
    }

    pub fn worker_pool(msg: impl Into<String>) -> Self {
        Self::WorkerPool(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Timeouts are backend failures as far as the session is concerned.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Timeout { .. })
    }

    /// Stable numeric code for listeners that forward errors over a boundary
    pub fn code(&self) -> i32 {
        match self {
            Self::Backend { .. } => -1,
            Self::Timeout { .. } => -2,
            Self::MalformedFilter(_) => -3,
            Self::StaleToken(_) => -4,
            Self::SessionClosed(_) => -5,
            Self::WorkerPool(_) => -6,
            Self::ConfigError(_) => -7,
            Self::IoError(_) => -8,
        }
    }
}
