use lightbox_model::CacheKey;
use thiserror::Error;

/// Why a fetch produced no displayable resource.
///
/// Every variant is recorded as a negative cache entry, so it is cloned
/// out to each requester and replayed on later lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection-level failure; no HTTP status was received.
    #[error("{message}")]
    Transport { message: String },

    #[error("HTTP {status}")]
    Http { status: u16 },

    /// The body could not be read or turned into a resource handle.
    #[error("{message}")]
    Decode { status: u16, message: String },
}

impl FetchError {
    /// Status code recorded with the failure; 0 for transport failures.
    pub fn status_code(&self) -> u16 {
        match self {
            FetchError::Transport { .. } => 0,
            FetchError::Http { status } | FetchError::Decode { status, .. } => {
                *status
            }
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Errors surfaced by cache lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("not cached: {0}")]
    NotCached(CacheKey),

    /// The fetch performed (or joined) by this call failed.
    #[error("fetch failed: {0}")]
    FetchFailed(FetchError),

    /// A negative entry replayed without touching the network.
    #[error("cached failure: {0}")]
    CachedFailure(FetchError),
}

impl CacheError {
    /// The underlying fetch failure, if this is not a plain miss.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            CacheError::NotCached(_) => None,
            CacheError::FetchFailed(err) | CacheError::CachedFailure(err) => {
                Some(err)
            }
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.fetch_error()
            .map(FetchError::status_code)
            .filter(|status| *status != 0)
    }
}

/// Setup errors outside the per-item fetch path.
#[derive(Error, Debug)]
pub enum LightboxError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, LightboxError>;
