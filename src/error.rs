//! Error types for ingestion, the analysis service, the REST API and the stores.
use thiserror::Error;

/// Extensions accepted by the local decoder, as shown to the user.
pub const ACCEPTED_EXTENSIONS: &str = ".csv, .xlsx, .xls, .xlsm";

/// Whole-file failures of the local decoder. These are the only ingestion
/// errors that reach the caller.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// File extension is not one the decoder understands
    #[error("Unsupported format for '{file_name}'. Choose a {} file", ACCEPTED_EXTENSIONS)]
    UnsupportedFormat { file_name: String },

    /// Spreadsheet binary could not be opened or its first sheet read
    #[error("Unable to read the workbook: {0}")]
    Workbook(String),

    /// Delimited text could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error while reading the upload from disk
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote analysis failures. Absorbed by the orchestrator's local fallback.
#[derive(Debug, Error)]
pub enum AnalysisServiceError {
    #[error("Analysis service is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Analysis timed out after {0}s")]
    Timeout(u64),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Malformed analysis response: {0}")]
    Malformed(String),
}

/// Failures of the JSON auth/users API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Non-success status; carries the response body, or `HTTP <status>` when empty
    #[error("{body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Administrator role required")]
    Forbidden,

    #[error("Not signed in")]
    Unauthenticated,
}

impl ApiError {
    /// The backend refused the credentials, as opposed to being unreachable.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            ApiError::Status {
                status: 401 | 403,
                ..
            }
        )
    }
}

/// Persistence failures of the dataset and session stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
