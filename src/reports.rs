use crate::types::{
    CanonicalRow, CompetitorRow, FilterKey, KpiSummary, SortKey, SortOrder, SubFamilyRevenueRow,
    SupplierRankingRow,
};
use crate::util::{format_mad, format_number, format_pct};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

pub const ITEMS_PER_PAGE: usize = 20;
pub const TOP_SS_FAMILLES: usize = 10;

/// Dashboard cards. All zero for an empty slice.
pub fn kpi_summary<R: AsRef<CanonicalRow>>(rows: &[R]) -> KpiSummary {
    let rows: Vec<&CanonicalRow> = rows.iter().map(|r| r.as_ref()).collect();
    let ss_familles: HashSet<&str> = rows.iter().map(|r| r.ss_famille.as_str()).collect();
    let fournisseurs: HashSet<&str> = rows.iter().map(|r| r.fournisseur.as_str()).collect();
    let total_ca: f64 = rows.iter().map(|r| r.ca_fournisseur_dans_ssf).sum();
    let avg_marge = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|r| r.marge_arriere.unwrap_or(0.0)).sum::<f64>() / rows.len() as f64
    };
    KpiSummary {
        ss_familles: ss_familles.len(),
        fournisseurs: fournisseurs.len(),
        total_ca,
        avg_marge,
    }
}

/// Sorted unique values of one identity field, for filter pickers.
pub fn distinct_values(rows: &[CanonicalRow], key: FilterKey) -> Vec<String> {
    let set: BTreeSet<&str> = rows.iter().map(|r| key.value_of(r)).collect();
    set.into_iter().map(str::to_string).collect()
}

/// Revenue per sub-category, largest first.
pub fn top_ss_familles<R: AsRef<CanonicalRow>>(rows: &[R], n: usize) -> Vec<(String, f64)> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for r in rows {
        let r: &CanonicalRow = r.as_ref();
        *totals.entry(r.ss_famille.as_str()).or_default() += r.ca_fournisseur_dans_ssf;
    }
    let mut out: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(name, ca)| (name.to_string(), ca))
        .collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out.truncate(n);
    out
}

pub fn render_top_ss_familles(top: &[(String, f64)]) -> Vec<SubFamilyRevenueRow> {
    top.iter()
        .enumerate()
        .map(|(idx, (name, ca))| SubFamilyRevenueRow {
            rank: idx + 1,
            ss_famille: name.clone(),
            ca: format_mad(*ca),
        })
        .collect()
}

/// Case-insensitive substring search over the three identity fields.
pub fn search_rows<'a>(rows: &'a [CanonicalRow], term: &str) -> Vec<&'a CanonicalRow> {
    let needle = term.to_lowercase();
    rows.iter()
        .filter(|r| {
            r.famille.to_lowercase().contains(&needle)
                || r.ss_famille.to_lowercase().contains(&needle)
                || r.fournisseur.to_lowercase().contains(&needle)
        })
        .collect()
}

fn numeric_value(row: &CanonicalRow, key: SortKey) -> f64 {
    match key {
        SortKey::CaTotalSsFamille => row.ca_total_ss_famille,
        SortKey::CaFournisseurDansSsf => row.ca_fournisseur_dans_ssf,
        SortKey::CaPartDuSsf => row.ca_part_du_ssf,
        // No reported margin sorts below every real one.
        SortKey::MargeArriere => row.marge_arriere.unwrap_or(f64::NEG_INFINITY),
        SortKey::ScoreFournisseur => row.score_fournisseur,
        SortKey::Famille | SortKey::SsFamille | SortKey::Fournisseur => 0.0,
    }
}

fn text_value(row: &CanonicalRow, key: SortKey) -> &str {
    match key {
        SortKey::Famille => &row.famille,
        SortKey::SsFamille => &row.ss_famille,
        SortKey::Fournisseur => &row.fournisseur,
        _ => "",
    }
}

/// Stable sort in place.
pub fn sort_rows(rows: &mut [&CanonicalRow], key: SortKey, order: SortOrder) {
    rows.sort_by(|a, b| {
        let ord = if key.is_numeric() {
            numeric_value(a, key)
                .partial_cmp(&numeric_value(b, key))
                .unwrap_or(Ordering::Equal)
        } else {
            text_value(a, key)
                .to_lowercase()
                .cmp(&text_value(b, key).to_lowercase())
        };
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

/// Number of pages, never less than one.
pub fn page_count(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 1;
    }
    total.div_ceil(per_page).max(1)
}

/// Rows of the 1-based `page`; out-of-range pages are empty.
pub fn paginate<T>(rows: &[T], page: usize, per_page: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(per_page);
    if start >= rows.len() {
        return &[];
    }
    let end = (start + per_page).min(rows.len());
    &rows[start..end]
}

/// Suppliers of one sub-category by revenue, for the row drill-down.
pub fn competitors_in(rows: &[CanonicalRow], ss_famille: &str) -> Vec<CompetitorRow> {
    let mut peers: Vec<&CanonicalRow> = rows.iter().filter(|r| r.ss_famille == ss_famille).collect();
    peers.sort_by(|a, b| {
        b.ca_fournisseur_dans_ssf
            .partial_cmp(&a.ca_fournisseur_dans_ssf)
            .unwrap_or(Ordering::Equal)
    });
    peers
        .into_iter()
        .map(|r| CompetitorRow {
            fournisseur: r.fournisseur.clone(),
            ca: format_mad(r.ca_fournisseur_dans_ssf),
        })
        .collect()
}

/// Rows ranked by supplier score, best first.
pub fn supplier_ranking<R: AsRef<CanonicalRow>>(rows: &[R], n: usize) -> Vec<SupplierRankingRow> {
    let mut ranked: Vec<&CanonicalRow> = rows.iter().map(|r| r.as_ref()).collect();
    sort_rows(&mut ranked, SortKey::ScoreFournisseur, SortOrder::Desc);
    ranked.truncate(n);
    ranking_rows(&ranked, 1)
}

/// Display rows in the given order, numbered from `first_rank`.
pub fn ranking_rows(rows: &[&CanonicalRow], first_rank: usize) -> Vec<SupplierRankingRow> {
    rows.iter()
        .enumerate()
        .map(|(idx, r)| SupplierRankingRow {
            rank: first_rank + idx,
            famille: r.famille.clone(),
            ss_famille: r.ss_famille.clone(),
            fournisseur: r.fournisseur.clone(),
            part_ssf: format_pct(r.ca_part_du_ssf),
            marge: r.marge_arriere.map(format_pct).unwrap_or_else(|| "-".to_string()),
            score: format_number(r.score_fournisseur, 2),
        })
        .collect()
}
