use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tabled::Tabled;

/// One record of an uploaded table, keyed by canonical header.
pub type RawRecord = HashMap<String, String>;

/// Normalized per-supplier row shared by both ingestion paths.
///
/// Serialized with the same field names the analysis backend uses, so a
/// persisted dataset and a server payload have one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRow {
    pub famille: String,
    pub ss_famille: String,
    pub fournisseur: String,
    pub ca_total_ss_famille: f64,
    pub ca_fournisseur_dans_ssf: f64,
    /// Percentage points of the sub-category revenue.
    pub ca_part_du_ssf: f64,
    /// `None` means no margin reported, which is not the same as zero.
    pub marge_arriere: Option<f64>,
    pub score_fournisseur: f64,
}

impl CanonicalRow {
    /// Score used when a source does not supply one: share plus margin.
    pub fn derived_score(ca_part_du_ssf: f64, marge_arriere: Option<f64>) -> f64 {
        ca_part_du_ssf + marge_arriere.unwrap_or(0.0)
    }

    pub fn has_identity(&self) -> bool {
        !self.famille.is_empty() && !self.ss_famille.is_empty() && !self.fournisseur.is_empty()
    }
}

impl AsRef<CanonicalRow> for CanonicalRow {
    fn as_ref(&self) -> &CanonicalRow {
        self
    }
}

/// Identity field a filter or picker applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey {
    Famille,
    SsFamille,
    Fournisseur,
}

impl FilterKey {
    pub fn value_of<'a>(&self, row: &'a CanonicalRow) -> &'a str {
        match self {
            FilterKey::Famille => &row.famille,
            FilterKey::SsFamille => &row.ss_famille,
            FilterKey::Fournisseur => &row.fournisseur,
        }
    }
}

/// Exact-match filters; an empty string means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    pub famille: String,
    pub ss_famille: String,
    pub fournisseur: String,
}

impl Filters {
    pub fn get(&self, key: FilterKey) -> &str {
        match key {
            FilterKey::Famille => &self.famille,
            FilterKey::SsFamille => &self.ss_famille,
            FilterKey::Fournisseur => &self.fournisseur,
        }
    }

    pub fn matches(&self, row: &CanonicalRow) -> bool {
        [FilterKey::Famille, FilterKey::SsFamille, FilterKey::Fournisseur]
            .iter()
            .all(|k| {
                let wanted = self.get(*k);
                wanted.is_empty() || k.value_of(row) == wanted
            })
    }

    pub fn is_empty(&self) -> bool {
        self.famille.is_empty() && self.ss_famille.is_empty() && self.fournisseur.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Famille,
    SsFamille,
    Fournisseur,
    CaTotalSsFamille,
    CaFournisseurDansSsf,
    CaPartDuSsf,
    MargeArriere,
    ScoreFournisseur,
}

impl SortKey {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, SortKey::Famille | SortKey::SsFamille | SortKey::Fournisseur)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiSummary {
    pub ss_familles: usize,
    pub fournisseurs: usize,
    pub total_ca: f64,
    pub avg_marge: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SubFamilyRevenueRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "SS-Famille")]
    #[tabled(rename = "SS-Famille")]
    pub ss_famille: String,
    #[serde(rename = "CA")]
    #[tabled(rename = "CA")]
    pub ca: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SupplierRankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Famille")]
    #[tabled(rename = "Famille")]
    pub famille: String,
    #[serde(rename = "SS-Famille")]
    #[tabled(rename = "SS-Famille")]
    pub ss_famille: String,
    #[serde(rename = "Fournisseur")]
    #[tabled(rename = "Fournisseur")]
    pub fournisseur: String,
    #[serde(rename = "PartSSF")]
    #[tabled(rename = "Part SSF %")]
    pub part_ssf: String,
    #[serde(rename = "Marge")]
    #[tabled(rename = "Marge %")]
    pub marge: String,
    #[serde(rename = "Score")]
    #[tabled(rename = "Score %")]
    pub score: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CompetitorRow {
    #[serde(rename = "Fournisseur")]
    #[tabled(rename = "Fournisseur")]
    pub fournisseur: String,
    #[serde(rename = "CA")]
    #[tabled(rename = "CA")]
    pub ca: String,
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub source_rows: usize,
    pub filtered_rows: usize,
    pub filters: Filters,
    pub kpis: KpiSummary,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}
