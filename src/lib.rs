//! Supplier performance data: ingestion of uploaded tables, normalization to
//! canonical rows, reports and export.
pub mod auth;
pub mod config;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod mapper;
pub mod output;
pub mod remote;
pub mod reports;
pub mod store;
pub mod types;
pub mod util;

pub use ingest::{AnalyzeOptions, IngestOutcome, Ingestor};
pub use loader::{decode_file, UploadFile};
pub use types::CanonicalRow;
