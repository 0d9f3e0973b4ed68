use rust_xlsxwriter::Workbook;
use supplier_score::error::DecodeError;
use supplier_score::loader::{decode_file, decode_file_with_report, UploadFile};

const HEADERS: [&str; 7] = [
    "Famille",
    "SS-Famille",
    "Fournisseur",
    "CA Total SS-Famille",
    "CA Fournisseur dans SSF",
    "CA Part du SSF %",
    "Marge Arrière %",
];

fn workbook_bytes() -> Vec<u8> {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    for (col, h) in HEADERS.iter().enumerate() {
        ws.write_string(0, col as u16, *h).unwrap();
    }

    ws.write_string(1, 0, "Epicerie").unwrap();
    ws.write_string(1, 1, "Pates").unwrap();
    ws.write_string(1, 2, "Barilla").unwrap();
    ws.write_number(1, 3, 1000.0).unwrap();
    ws.write_number(1, 4, 400.0).unwrap();
    ws.write_number(1, 5, 40.0).unwrap();
    ws.write_string(1, 6, "12,5 %").unwrap();

    // Row 2 left blank on purpose.

    ws.write_string(3, 0, "Epicerie").unwrap();
    ws.write_string(3, 1, "Riz").unwrap();
    ws.write_string(3, 2, "Taureau").unwrap();
    ws.write_number(3, 3, 500.0).unwrap();
    ws.write_number(3, 4, 250.0).unwrap();
    ws.write_number(3, 5, 50.0).unwrap();

    // No supplier: dropped.
    ws.write_string(4, 0, "Epicerie").unwrap();
    ws.write_string(4, 1, "Riz").unwrap();
    ws.write_number(4, 4, 10.0).unwrap();

    wb.save_to_buffer().unwrap()
}

#[test]
fn first_sheet_is_decoded_with_display_headers() {
    let file = UploadFile::new("fournisseurs.xlsx", workbook_bytes());
    let (rows, report) = decode_file_with_report(&file).unwrap();

    assert_eq!(report.total_records, 3);
    assert_eq!(report.kept_rows, 2);
    assert_eq!(report.dropped_rows, 1);

    let barilla = &rows[0];
    assert_eq!(barilla.ss_famille, "Pates");
    assert_eq!(barilla.ca_total_ss_famille, 1000.0);
    assert_eq!(barilla.ca_fournisseur_dans_ssf, 400.0);
    assert_eq!(barilla.marge_arriere, Some(12.5));
    assert_eq!(barilla.score_fournisseur, 52.5);

    let taureau = &rows[1];
    assert_eq!(taureau.fournisseur, "Taureau");
    assert_eq!(taureau.marge_arriere, None);
    assert_eq!(taureau.score_fournisseur, 50.0);
}

#[test]
fn extension_case_does_not_matter() {
    let upper = decode_file(&UploadFile::new("FOURNISSEURS.XLSX", workbook_bytes())).unwrap();
    let lower = decode_file(&UploadFile::new("fournisseurs.xlsx", workbook_bytes())).unwrap();
    assert_eq!(upper, lower);
}

#[test]
fn header_only_workbook_gives_no_rows() {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    for (col, h) in HEADERS.iter().enumerate() {
        ws.write_string(0, col as u16, *h).unwrap();
    }
    let bytes = wb.save_to_buffer().unwrap();
    let rows = decode_file(&UploadFile::new("vide.xlsx", bytes)).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn garbage_bytes_are_a_workbook_error() {
    let err = decode_file(&UploadFile::new("cassé.xlsx", b"not a zip".to_vec())).unwrap_err();
    assert!(matches!(err, DecodeError::Workbook(_)));
}

#[test]
fn only_the_first_sheet_is_read() {
    let mut wb = Workbook::new();
    for (sheet, supplier) in [("Premier", "First"), ("Second", "Other")] {
        let ws = wb.add_worksheet();
        ws.set_name(sheet).unwrap();
        for (col, h) in HEADERS.iter().enumerate() {
            ws.write_string(0, col as u16, *h).unwrap();
        }
        ws.write_string(1, 0, "Epicerie").unwrap();
        ws.write_string(1, 1, "Pates").unwrap();
        ws.write_string(1, 2, supplier).unwrap();
        ws.write_number(1, 5, 10.0).unwrap();
    }
    let bytes = wb.save_to_buffer().unwrap();

    let rows = decode_file(&UploadFile::new("deux.xlsx", bytes)).unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.fournisseur.as_str()).collect();
    assert_eq!(names, vec!["First"]);
}
