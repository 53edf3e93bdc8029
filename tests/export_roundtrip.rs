use cnes_rs::export::{
    BOM, ExportError, Table, csv_string, csv_to_xlsx, save_csv, save_csv_text,
};
use tempfile::tempdir;

fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
    Table::new(
        headers.iter().map(|s| s.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect(),
    )
}

#[test]
fn csv_has_bom_and_exact_lines() {
    let t = table(
        &["Estado", "2020", "2023"],
        &[&["São Paulo", "75000", "82000"]],
    );
    let text = csv_string(&t).unwrap();

    assert!(text.starts_with(BOM));
    let body = text.strip_prefix(BOM).unwrap();
    let mut lines = body.lines();
    assert_eq!(lines.next(), Some("Estado,2020,2023"));
    assert_eq!(lines.next(), Some("São Paulo,75000,82000"));
    assert_eq!(lines.next(), None);
}

#[test]
fn comma_cell_is_quoted_and_round_trips() {
    let t = table(&["cidade"], &[&["Rio de Janeiro, RJ"]]);
    let text = csv_string(&t).unwrap();
    let body = text.strip_prefix(BOM).unwrap();

    assert!(body.contains("\"Rio de Janeiro, RJ\""));

    let mut rdr = csv::Reader::from_reader(body.as_bytes());
    let record = rdr.records().next().unwrap().unwrap();
    assert_eq!(&record[0], "Rio de Janeiro, RJ");
}

#[test]
fn embedded_quotes_are_doubled_and_round_trip() {
    let original = r#"Fulano "Apelido" Silva"#;
    let t = table(&["nome"], &[&[original]]);
    let text = csv_string(&t).unwrap();
    let body = text.strip_prefix(BOM).unwrap();

    assert!(body.contains(r#""Fulano ""Apelido"" Silva""#));

    let mut rdr = csv::Reader::from_reader(body.as_bytes());
    let record = rdr.records().next().unwrap().unwrap();
    assert_eq!(&record[0], original);
}

#[test]
fn plain_cells_stay_unquoted() {
    let t = table(&["uf", "leitos"], &[&["SP", "92000"]]);
    let text = csv_string(&t).unwrap();
    assert!(!text.contains('"'));
}

#[test]
fn newline_cell_round_trips() {
    let original = "linha um\nlinha dois";
    let t = table(&["obs"], &[&[original]]);
    let text = csv_string(&t).unwrap();
    let body = text.strip_prefix(BOM).unwrap();

    let mut rdr = csv::Reader::from_reader(body.as_bytes());
    let record = rdr.records().next().unwrap().unwrap();
    assert_eq!(&record[0], original);
}

#[test]
fn xlsx_conversion_produces_zip_container() {
    let t = table(
        &["Região", "Leitos 2020", "Leitos 2023"],
        &[
            &["Sudeste", "140000", "150000"],
            &["Sul", "45000", "47000"],
        ],
    );
    let buffer = csv_to_xlsx(&csv_string(&t).unwrap()).unwrap();
    // XLSX is a ZIP archive.
    assert_eq!(&buffer[..4], b"PK\x03\x04");
}

#[test]
fn xlsx_conversion_skips_empty_lines() {
    let csv_text = format!("{}a,b\n\n1,2\n\n\n", BOM);
    let buffer = csv_to_xlsx(&csv_text).unwrap();
    assert!(!buffer.is_empty());
}

#[test]
fn xlsx_conversion_handles_large_tables() {
    // Crosses the 1000-row chunk boundary.
    let mut csv_text = String::from("col_a,col_b\n");
    for i in 0..2500 {
        csv_text.push_str(&format!("{},{}\n", i, i * 2));
    }
    let buffer = csv_to_xlsx(&csv_text).unwrap();
    assert_eq!(&buffer[..2], b"PK");
}

#[test]
fn corrupt_csv_raises_descriptive_error() {
    let err = csv_to_xlsx("a,b\n1,2,3\n").unwrap_err();
    assert!(matches!(err, ExportError::CorruptCsv));
    assert!(err.to_string().contains("corrupted or invalid"));
}

#[test]
fn save_csv_writes_file_with_bom() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("estados.csv");
    let t = table(&["Estado"], &[&["Acre"]]);
    save_csv(&t, &path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..3], [0xEF, 0xBB, 0xBF]);
}

#[test]
fn save_csv_text_adds_bom_only_when_missing() {
    let dir = tempdir().unwrap();

    let with = dir.path().join("with.csv");
    save_csv_text(&format!("{}a,b\n", BOM), &with).unwrap();
    let without = dir.path().join("without.csv");
    save_csv_text("a,b\n", &without).unwrap();

    assert_eq!(std::fs::read(&with).unwrap(), std::fs::read(&without).unwrap());
}
