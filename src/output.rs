use crate::types::CanonicalRow;
use crate::util::format_export_number;
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub const EXPORT_FILE_NAME: &str = "analyse_fournisseurs.csv";

pub const EXPORT_HEADERS: [&str; 8] = [
    "Famille",
    "SS-Famille",
    "Fournisseur",
    "CA Total SS-Famille",
    "CA Fournisseur dans SSF",
    "CA Part du SSF %",
    "Marge Arrière %",
    "Score Fournisseur %",
];

fn sanitize(s: &str) -> String {
    s.replace("\r\n", " ").replace('\n', " ").trim().to_string()
}

/// Spreadsheet-friendly export: BOM, `;` separated, French decimals.
pub fn export_csv_string<R: AsRef<CanonicalRow>>(rows: &[R]) -> Result<String, Box<dyn Error>> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(EXPORT_HEADERS)?;
    for r in rows {
        let r = r.as_ref();
        wtr.write_record([
            sanitize(&r.famille),
            sanitize(&r.ss_famille),
            sanitize(&r.fournisseur),
            format_export_number(r.ca_total_ss_famille),
            format_export_number(r.ca_fournisseur_dans_ssf),
            format_export_number(r.ca_part_du_ssf),
            r.marge_arriere.map(format_export_number).unwrap_or_default(),
            format_export_number(r.score_fournisseur),
        ])?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    let mut body = String::from_utf8(bytes)?;
    // Lines are joined, not terminated.
    if body.ends_with('\n') {
        body.pop();
    }
    Ok(format!("\u{feff}{}", body))
}

pub fn write_export_csv<R: AsRef<CanonicalRow>>(path: &Path, rows: &[R]) -> Result<(), Box<dyn Error>> {
    let s = export_csv_string(rows)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_table(rows, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubFamilyRevenueRow;

    fn row(famille: &str, marge: Option<f64>) -> CanonicalRow {
        CanonicalRow {
            famille: famille.into(),
            ss_famille: "Pates".into(),
            fournisseur: "Barilla".into(),
            ca_total_ss_famille: 1_234_567.891,
            ca_fournisseur_dans_ssf: 400.0,
            ca_part_du_ssf: 32.123456,
            marge_arriere: marge,
            score_fournisseur: 44.5,
        }
    }

    #[test]
    fn export_layout_matches_contract() {
        let csv = export_csv_string(&[row("Epicerie", Some(12.0))]).unwrap();
        assert!(csv.starts_with('\u{feff}'));
        let body = csv.trim_start_matches('\u{feff}');
        let lines: Vec<&str> = body.split('\n').collect();
        assert_eq!(
            lines[0],
            "Famille;SS-Famille;Fournisseur;CA Total SS-Famille;CA Fournisseur dans SSF;CA Part du SSF %;Marge Arrière %;Score Fournisseur %"
        );
        assert_eq!(lines[1], "Epicerie;Pates;Barilla;1234567,891;400;32,1235;12;44,5");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn export_collapses_newlines_and_blanks_missing_margin() {
        let csv = export_csv_string(&[row("Epi\r\ncerie\nsalée ", None)]).unwrap();
        let line = csv.split('\n').nth(1).unwrap();
        assert!(line.starts_with("Epi cerie salée;"));
        assert!(line.contains(";32,1235;;44,5"));
    }

    #[test]
    fn export_of_empty_dataset_is_header_only() {
        let rows: Vec<CanonicalRow> = Vec::new();
        let csv = export_csv_string(&rows).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn render_table_handles_empty_and_truncates() {
        let empty: Vec<SubFamilyRevenueRow> = Vec::new();
        assert_eq!(render_table(&empty, 5), "(no rows)");
        let rows: Vec<SubFamilyRevenueRow> = (1..=3)
            .map(|rank| SubFamilyRevenueRow {
                rank,
                ss_famille: format!("SSF{rank}"),
                ca: "0".into(),
            })
            .collect();
        let table = render_table(&rows, 2);
        assert!(table.contains("SSF2"));
        assert!(!table.contains("SSF3"));
    }
}
