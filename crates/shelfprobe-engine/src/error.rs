use thiserror::Error;

/// Raw text that cannot be interpreted as a price or quantity.
///
/// Always local to one candidate: the candidate is dropped, the run goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no numeric amount in \"{input}\"")]
    NoAmount { input: String },

    #[error("malformed number \"{input}\": {reason}")]
    MalformedNumber { input: String, reason: String },

    #[error("negative amount in \"{input}\"")]
    NegativeAmount { input: String },

    #[error("no currency symbol, code, or hint for \"{input}\"")]
    MissingCurrency { input: String },

    #[error("no recognised quantity unit in \"{input}\"")]
    UnknownUnit { input: String },

    #[error("quantity \"{input}\" is zero")]
    ZeroQuantity { input: String },

    #[error("candidate has no {field}")]
    MissingField { field: &'static str },
}

/// Failures reported by the browse layer. Any of these ends the run with
/// `timeout`.
#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("rate limited by {url}; retry after {retry_after_secs}s")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{action} failed: {reason}")]
    Action { action: String, reason: String },

    #[error("no page loaded; navigate first")]
    NotNavigated,
}

/// Why a scroll step could not complete.
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error(transparent)]
    Browse(#[from] BrowseError),

    #[error("run deadline elapsed")]
    DeadlineElapsed,
}

/// Construction-time failures of engine components.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid CSS selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
