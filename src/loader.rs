use crate::error::DecodeError;
use crate::mapper::map_record;
use crate::types::{CanonicalRow, RawRecord};
use crate::util::canonicalize_header;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::{ReaderBuilder, StringRecord};
use std::io::Cursor;
use std::path::Path;

/// An uploaded file held in memory: its original name decides how it is read.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Workbook,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }

    /// Lowercased extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    pub fn format(&self) -> Result<FileFormat, DecodeError> {
        match self.extension().as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("xlsx" | "xls" | "xlsm") => Ok(FileFormat::Workbook),
            _ => Err(DecodeError::UnsupportedFormat {
                file_name: self.name.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_records: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
}

/// Decode an upload into canonical rows, dropping rows without identity.
pub fn decode_file(file: &UploadFile) -> Result<Vec<CanonicalRow>, DecodeError> {
    decode_file_with_report(file).map(|(rows, _)| rows)
}

pub fn decode_file_with_report(
    file: &UploadFile,
) -> Result<(Vec<CanonicalRow>, LoadReport), DecodeError> {
    let records = match file.format()? {
        FileFormat::Csv => {
            let text = String::from_utf8_lossy(&file.bytes);
            read_csv_records(&text)?
        }
        FileFormat::Workbook => read_workbook_records(&file.bytes)?,
    };

    let total_records = records.len();
    let rows: Vec<CanonicalRow> = records
        .iter()
        .map(map_record)
        .filter(CanonicalRow::has_identity)
        .collect();

    let report = LoadReport {
        total_records,
        kept_rows: rows.len(),
        dropped_rows: total_records - rows.len(),
    };
    tracing::debug!(
        file = %file.name,
        total = report.total_records,
        kept = report.kept_rows,
        dropped = report.dropped_rows,
        "Decoded upload locally"
    );
    Ok((rows, report))
}

/// Parse comma-separated text into canonical-header records.
///
/// The text is split on line breaks first and every line is parsed on its
/// own, so a stray quote only affects its line. Blank lines are skipped;
/// the first remaining line is the header. Short lines are padded with
/// empty cells.
pub fn read_csv_records(text: &str) -> Result<Vec<RawRecord>, DecodeError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty());

    let header: Vec<String> = match lines.next() {
        Some(line) => parse_csv_line(line)?.iter().map(canonicalize_header).collect(),
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for line in lines {
        let cells = parse_csv_line(line)?;
        let rec: RawRecord = header
            .iter()
            .enumerate()
            .map(|(j, key)| (key.clone(), cells.get(j).unwrap_or("").to_string()))
            .collect();
        records.push(rec);
    }
    Ok(records)
}

fn parse_csv_line(line: &str) -> Result<StringRecord, DecodeError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    let mut record = StringRecord::new();
    rdr.read_record(&mut record)?;
    Ok(record)
}

/// Read the first sheet of a workbook into canonical-header records.
pub fn read_workbook_records(bytes: &[u8]) -> Result<Vec<RawRecord>, DecodeError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| DecodeError::Workbook(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| DecodeError::Workbook(e.to_string()))?,
        // A workbook without sheets has no rows.
        None => return Ok(Vec::new()),
    };

    let mut rows_iter = range.rows();
    let Some(header_row) = rows_iter.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| canonicalize_header(&cell_to_string(cell)))
        .collect();

    let mut records = Vec::new();
    for row in rows_iter {
        let values: Vec<String> = row.iter().map(cell_to_string).collect();
        if values.iter().all(|v| v.is_empty()) {
            continue;
        }
        let rec: RawRecord = headers
            .iter()
            .enumerate()
            .filter(|(_, key)| !key.is_empty())
            .map(|(j, key)| (key.clone(), values.get(j).cloned().unwrap_or_default()))
            .collect();
        records.push(rec);
    }
    Ok(records)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
famille,ssFamille,fournisseur,ca_total_ssfamille,ca_fournisseur_dans_ssf,ca_part_du_ssf_pct,marge_arriere_pct
Epicerie,Pates,Barilla,1000,400,40,12
";

    #[test]
    fn decodes_single_csv_row_with_derived_score() {
        let file = UploadFile::new("ventes.csv", SAMPLE_CSV);
        let rows = decode_file(&file).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fournisseur, "Barilla");
        assert_eq!(rows[0].ss_famille, "Pates");
        assert_eq!(rows[0].score_fournisseur, 52.0);
    }

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        let csv = "\
Famille,SS-Famille,Fournisseur,CA Part du SSF %
\"Epicerie, salée\",\"Pates \"\"fraîches\"\"\",Barilla,\"12,5\"
";
        let rows = decode_file(&UploadFile::new("x.csv", csv)).unwrap();
        assert_eq!(rows[0].famille, "Epicerie, salée");
        assert_eq!(rows[0].ss_famille, "Pates \"fraîches\"");
        assert_eq!(rows[0].ca_part_du_ssf, 12.5);
    }

    #[test]
    fn blank_lines_and_short_rows_are_tolerated() {
        let csv = "\r\n\
famille,ssfamille,fournisseur,marge_arriere\r\n\
\r\n\
A,B,C\r\n\
   \r\n\
D,E,F,3\r\n";
        let rows = decode_file(&UploadFile::new("x.CSV", csv)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].marge_arriere, None);
        assert_eq!(rows[1].marge_arriere, Some(3.0));
    }

    #[test]
    fn unbalanced_quote_only_costs_its_line() {
        let csv = "famille,ssfamille,fournisseur,ca_part_du_ssf\n\"Epicerie,Pates,Barilla,10\nA,B,C,20\nD,E,F,30\n";
        let rows = decode_file(&UploadFile::new("x.csv", csv)).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.fournisseur.as_str()).collect();
        assert_eq!(names, vec!["C", "F"]);
        assert_eq!(rows[1].ca_part_du_ssf, 30.0);
    }

    #[test]
    fn quoted_line_break_does_not_join_lines() {
        let csv = "famille,ssfamille,fournisseur\n\"Epi\ncerie\",Pates,Barilla\nA,B,C\n";
        let rows = decode_file(&UploadFile::new("x.csv", csv)).unwrap();
        assert!(rows.iter().all(|r| !r.famille.contains('\n')));
        assert_eq!(rows.last().unwrap().fournisseur, "C");
    }

    #[test]
    fn rows_without_identity_are_dropped() {
        let csv = "\
famille,ssfamille,fournisseur,ca_part_du_ssf
A,B,C,10
A,,C,20
,B,C,30
A,B,,40
";
        let (rows, report) = decode_file_with_report(&UploadFile::new("x.csv", csv)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            report,
            LoadReport {
                total_records: 4,
                kept_rows: 1,
                dropped_rows: 3
            }
        );
    }

    #[test]
    fn header_only_or_empty_file_yields_no_rows() {
        let header_only = UploadFile::new("x.csv", "famille,ssfamille,fournisseur\n");
        assert!(decode_file(&header_only).unwrap().is_empty());
        let empty = UploadFile::new("x.csv", "");
        assert!(decode_file(&empty).unwrap().is_empty());
    }

    #[test]
    fn leading_bom_does_not_pollute_first_header() {
        let csv = format!("\u{feff}{}", SAMPLE_CSV);
        let rows = decode_file(&UploadFile::new("x.csv", csv)).unwrap();
        assert_eq!(rows[0].famille, "Epicerie");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        for name in ["data.pdf", "data", "data.csv.txt"] {
            let err = decode_file(&UploadFile::new(name, "a,b")).unwrap_err();
            assert!(matches!(err, DecodeError::UnsupportedFormat { .. }), "{name}");
        }
    }

    #[test]
    fn extension_dispatch_is_case_insensitive() {
        assert_eq!(UploadFile::new("a.XLSX", Vec::<u8>::new()).format().unwrap(), FileFormat::Workbook);
        assert_eq!(UploadFile::new("a.Xlsm", Vec::<u8>::new()).format().unwrap(), FileFormat::Workbook);
        assert_eq!(UploadFile::new("a.xls", Vec::<u8>::new()).format().unwrap(), FileFormat::Workbook);
        assert_eq!(UploadFile::new("a.Csv", Vec::<u8>::new()).format().unwrap(), FileFormat::Csv);
    }

    #[test]
    fn corrupt_workbook_is_a_workbook_error() {
        let err = decode_file(&UploadFile::new("broken.xlsx", b"not a zip".to_vec())).unwrap_err();
        assert!(matches!(err, DecodeError::Workbook(_)));
    }
}
