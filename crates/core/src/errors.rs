use thiserror::Error;

/// Unified error type for the metalstack-core library.
/// Store, config and terminal operations return `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Storage / File ──────────────────────────────────────────────
    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── Configuration ───────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Item not found at position {0}")]
    ItemNotFound(usize),

    // ── Display ─────────────────────────────────────────────────────
    #[error("Terminal error: {0}")]
    Terminal(String),

    // ── API / Network ───────────────────────────────────────────────
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Failure of a single price fetch.
///
/// These never abort the dashboard: the event loop catches them at the
/// dispatch boundary and stores them in the view as an error marker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("rate limited")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out")]
    Timeout,
}

/// Chart scaling failure. Handled inside the renderer, never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("series has no price range to scale")]
    DegenerateSeries,
}

/// Rejected dashboard transition. The event loop ignores these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid transition: {event} after {state}")]
    InvalidTransition { event: String, state: String },
}

/// Price series construction failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("series timestamps out of order at index {index}")]
    OutOfOrder { index: usize },
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return FetchError::Timeout;
        }
        if e.status().is_some_and(|s| s.as_u16() == 429) {
            return FetchError::RateLimited;
        }
        if e.is_decode() {
            return FetchError::InvalidResponse(sanitize(&e.to_string()));
        }
        FetchError::Network(sanitize(&e.to_string()))
    }
}

/// Strip query parameters from any URL in an error message so the API key
/// never ends up on screen or in the log.
pub fn sanitize(message: &str) -> String {
    match message.find('?') {
        Some(idx) => format!("{}?<query redacted>", &message[..idx]),
        None => message.to_string(),
    }
}
