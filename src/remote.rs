//! Remote analysis client
//!
//! Uploads the raw file to the analysis backend (`POST /analyze`) and
//! coerces the returned rows into [`CanonicalRow`]s. The backend owns its
//! schema, so field names are fixed and rows are not filtered.

use crate::error::AnalysisServiceError;
use crate::loader::UploadFile;
use crate::types::CanonicalRow;
use crate::util::{to_nullable_number, to_number};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_ANALYZE_TIMEOUT_SECS: u64 = 120;
const USER_AGENT: &str = concat!("supplier-score/", env!("CARGO_PKG_VERSION"));

/// Anything that can turn an upload into rows server-side.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(
        &self,
        file: &UploadFile,
        sheet2: &str,
        sheet3: &str,
    ) -> Result<Vec<CanonicalRow>, AnalysisServiceError>;
}

/// HTTP client for the analysis backend
pub struct RemoteAnalyzer {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RemoteAnalyzer {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AnalysisServiceError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(AnalysisServiceError::NotConfigured);
        }
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AnalysisServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/analyze", self.base_url)
    }

    fn map_send_error(&self, e: reqwest::Error) -> AnalysisServiceError {
        if e.is_timeout() {
            AnalysisServiceError::Timeout(self.timeout.as_secs())
        } else {
            AnalysisServiceError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl AnalysisService for RemoteAnalyzer {
    async fn analyze(
        &self,
        file: &UploadFile,
        sheet2: &str,
        sheet3: &str,
    ) -> Result<Vec<CanonicalRow>, AnalysisServiceError> {
        let url = self.endpoint();
        tracing::debug!(url = %url, file = %file.name, sheet2, sheet3, "Submitting file for analysis");

        let part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        let form = Form::new()
            .part("file", part)
            .text("sheet2", sheet2.to_string())
            .text("sheet3", sheet3.to_string());

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = if body.is_empty() {
                status.canonical_reason().unwrap_or("").to_string()
            } else {
                body
            };
            return Err(AnalysisServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let payload: Value = serde_json::from_str(&text)
            .map_err(|e| AnalysisServiceError::Malformed(e.to_string()))?;
        let rows = coerce_server_rows(&payload)?;

        tracing::info!(file = %file.name, rows = rows.len(), "Received analysis from server");
        Ok(rows)
    }
}

/// Coerce an analysis payload (`{"rows": [...]}` or a bare array).
pub fn coerce_server_rows(payload: &Value) -> Result<Vec<CanonicalRow>, AnalysisServiceError> {
    let rows = match payload.get("rows") {
        Some(rows) if !rows.is_null() => rows,
        _ => payload,
    };
    let items = rows
        .as_array()
        .ok_or_else(|| AnalysisServiceError::Malformed("expected an array of rows".to_string()))?;
    Ok(items.iter().map(coerce_server_row).collect())
}

pub fn coerce_server_row(item: &Value) -> CanonicalRow {
    let field = |name: &str| item.get(name);

    let ca_part_du_ssf = to_number(field("caPartDuSsf"));
    let marge_arriere = to_nullable_number(field("margeArriere"));
    let score_fournisseur = match field("scoreFournisseur") {
        Some(v) if !v.is_null() => to_number(v),
        _ => CanonicalRow::derived_score(ca_part_du_ssf, marge_arriere),
    };

    CanonicalRow {
        famille: json_text(field("famille")),
        ss_famille: json_text(field("ssFamille")),
        fournisseur: json_text(field("fournisseur")),
        ca_total_ss_famille: to_number(field("caTotalSsFamille")),
        ca_fournisseur_dans_ssf: to_number(field("caFournisseurDansSsf")),
        ca_part_du_ssf,
        marge_arriere,
        score_fournisseur,
    }
}

fn json_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
