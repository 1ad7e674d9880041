use thiserror::Error;

/// Errors raised while establishing an authenticated session
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials for {0}")]
    InvalidCredentials(String),

    #[error("{indexer} unreachable: {reason}")]
    Unreachable { indexer: String, reason: String },

    #[error("unexpected login page structure on {indexer}: {detail}")]
    UnexpectedPage { indexer: String, detail: String },

    #[error("login timed out for {0}")]
    Timeout(String),
}

/// Errors raised while fetching result pages from a tracker
#[derive(Debug, Error)]
pub enum FetchError {
    /// The tracker rejected the session mid-use (login page or 401/403).
    /// Recovered locally with a single re-authentication and retry.
    #[error("session rejected by the tracker")]
    SessionExpired,

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by the tracker")]
    RateLimited,

    /// Raised before any network call when the current time falls outside
    /// the indexer's configured operating hours.
    #[error("outside the configured operating hours")]
    OutOfHours,
}

/// Top-level error surfaced to the Torznab layer
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unknown indexer: {0}")]
    UnknownIndexer(String),

    #[error("indexer {0} is disabled or outside its allowed hours")]
    Disabled(String),
}
