//! Ingestion orchestrator: remote analysis first, local decoding as fallback.
//!
//! A remote failure or an empty remote result is never surfaced; only the
//! local decoder's whole-file errors reach the caller.
use crate::error::DecodeError;
use crate::loader::{decode_file, UploadFile};
use crate::remote::AnalysisService;
use crate::types::CanonicalRow;

pub const DEFAULT_SHEET2: &str = "Biscuiterie";
pub const DEFAULT_SHEET3: &str = "MARGE ARRIERE";

/// Caller overrides for the backend's sheet selectors.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub sheet2: Option<String>,
    pub sheet3: Option<String>,
}

/// Which stage produced the rows.
#[derive(Debug)]
pub enum IngestOutcome {
    Remote(Vec<CanonicalRow>),
    Local(Vec<CanonicalRow>),
    Failed(DecodeError),
}

impl IngestOutcome {
    pub fn into_rows(self) -> Result<Vec<CanonicalRow>, DecodeError> {
        match self {
            IngestOutcome::Remote(rows) | IngestOutcome::Local(rows) => Ok(rows),
            IngestOutcome::Failed(e) => Err(e),
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            IngestOutcome::Remote(_) => "server",
            IngestOutcome::Local(_) => "local",
            IngestOutcome::Failed(_) => "none",
        }
    }
}

pub struct Ingestor {
    service: Option<Box<dyn AnalysisService>>,
    default_sheet2: String,
    default_sheet3: String,
}

impl Ingestor {
    /// Local decoding only.
    pub fn local() -> Self {
        Self {
            service: None,
            default_sheet2: DEFAULT_SHEET2.to_string(),
            default_sheet3: DEFAULT_SHEET3.to_string(),
        }
    }

    pub fn with_service(service: Box<dyn AnalysisService>) -> Self {
        Self {
            service: Some(service),
            ..Self::local()
        }
    }

    pub fn with_sheet_defaults(mut self, sheet2: impl Into<String>, sheet3: impl Into<String>) -> Self {
        self.default_sheet2 = sheet2.into();
        self.default_sheet3 = sheet3.into();
        self
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    /// Rows for `file`, from the server when possible.
    pub async fn analyze_smart(
        &self,
        file: &UploadFile,
        options: &AnalyzeOptions,
    ) -> Result<Vec<CanonicalRow>, DecodeError> {
        self.analyze_tagged(file, options).await.into_rows()
    }

    pub async fn analyze_tagged(&self, file: &UploadFile, options: &AnalyzeOptions) -> IngestOutcome {
        if let Some(service) = &self.service {
            let sheet2 = options.sheet2.as_deref().unwrap_or(&self.default_sheet2);
            let sheet3 = options.sheet3.as_deref().unwrap_or(&self.default_sheet3);

            match service.analyze(file, sheet2, sheet3).await {
                Ok(rows) if !rows.is_empty() => {
                    tracing::info!(file = %file.name, rows = rows.len(), "Using server analysis");
                    return IngestOutcome::Remote(rows);
                }
                Ok(_) => {
                    tracing::warn!(file = %file.name, "Server returned no rows, falling back to local analysis");
                }
                Err(error) => {
                    tracing::warn!(file = %file.name, %error, "Server analysis unavailable, falling back to local analysis");
                }
            }
        }

        match decode_file(file) {
            Ok(rows) => {
                tracing::info!(file = %file.name, rows = rows.len(), "Using local analysis");
                IngestOutcome::Local(rows)
            }
            Err(e) => IngestOutcome::Failed(e),
        }
    }
}
