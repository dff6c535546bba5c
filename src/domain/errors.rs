use thiserror::Error;

/// Result type alias for collection operations
pub type Result<T> = std::result::Result<T, CollectError>;

/// Errors raised while collecting workflow artifacts
///
/// Only `Config` is fatal; every other variant is caught at the repository
/// or artifact boundary and recorded in the manifest.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Bad or missing repository list, credential, or output directory
    #[error("configuration error: {0}")]
    Config(String),

    /// The API refused access to a repository, or it does not exist
    #[error("access denied for {repo}: {message}")]
    Access {
        /// Repository in `owner/name` form
        repo: String,
        /// Error detail from the API
        message: String,
    },

    /// A repository has no runs or artifacts to collect
    #[error("nothing to collect for {repo}: {message}")]
    NotFound { repo: String, message: String },

    /// An artifact transfer failed or was incomplete
    #[error("download failed for {repo} artifact '{artifact}': {message}")]
    Download {
        repo: String,
        artifact: String,
        message: String,
    },

    /// Bundling the collected tree failed
    #[error("archive failed: {0}")]
    Archive(String),

    /// HTTP request failed before any status was received
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned an unexpected error status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse a response or serialize a document
    #[error("failed to parse: {0}")]
    Parse(String),

    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectError {
    /// Create a fatal configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an access error for a repository
    pub fn access(repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Access {
            repo: repo.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error for a repository
    pub fn not_found(repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            repo: repo.into(),
            message: message.into(),
        }
    }

    /// Create a per-artifact download error
    pub fn download(
        repo: impl Into<String>,
        artifact: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Download {
            repo: repo.into(),
            artifact: artifact.into(),
            message: message.into(),
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// True for errors that must abort the run before any collection starts
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
