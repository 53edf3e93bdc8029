//! Export tabular data as CSV text or XLSX binary.
//!
//! CSV output is what spreadsheet applications expect from pt-BR data
//! sources: UTF-8 with a BOM, comma-delimited, cells quoted (with internal
//! quotes doubled) only when they contain a comma, quote, or newline.

use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// UTF-8 byte-order mark prepended to CSV exports so spreadsheet
/// applications detect the encoding.
pub const BOM: &str = "\u{feff}";

/// Rows written per batch during CSV→XLSX conversion, with a scheduler
/// yield between batches.
const XLSX_CHUNK_ROWS: usize = 1000;

/// Worksheet name used by every spreadsheet export.
const SHEET_NAME: &str = "Dados";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("the received CSV appears corrupted or invalid")]
    CorruptCsv,

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV buffer was not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("spreadsheet write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// In-memory table: a header row plus data rows, all stringly typed, the
/// shape every exportable view reduces to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

/// Serialize a table to CSV text, BOM-prefixed, LF-terminated rows.
pub fn csv_string(table: &Table) -> Result<String, ExportError> {
    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(format!("{}{}", BOM, String::from_utf8(bytes)?))
}

/// Save a table as a `.csv` file.
pub fn save_csv<P: AsRef<Path>>(table: &Table, path: P) -> Result<(), ExportError> {
    let mut f = File::create(path)?;
    f.write_all(csv_string(table)?.as_bytes())?;
    Ok(())
}

/// Convert CSV text into a single-sheet XLSX binary buffer.
///
/// Empty lines are skipped. Rows are written in chunks of
/// [`XLSX_CHUNK_ROWS`], yielding the thread between chunks so a large
/// conversion does not monopolize its scheduler slot. A CSV parse error
/// aborts with [`ExportError::CorruptCsv`]; no partial sheet is produced.
pub fn csv_to_xlsx(csv_text: &str) -> Result<Vec<u8>, ExportError> {
    let text = csv_text.strip_prefix(BOM).unwrap_or(csv_text);

    // Strict field counts: a ragged row is how a truncated or corrupted
    // export manifests after parsing.
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(text.as_bytes());
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|_| ExportError::CorruptCsv)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let mut row_idx = 0u32;
    for chunk in rows.chunks(XLSX_CHUNK_ROWS) {
        for row in chunk {
            for (col, cell) in row.iter().enumerate() {
                worksheet.write_string(row_idx, col as u16, cell.as_str())?;
            }
            row_idx += 1;
        }
        std::thread::yield_now();
    }

    Ok(workbook.save_to_buffer()?)
}

/// Serialize a table through the CSV writer and save it as an `.xlsx` file.
pub fn save_xlsx<P: AsRef<Path>>(table: &Table, path: P) -> Result<(), ExportError> {
    let buffer = csv_to_xlsx(&csv_string(table)?)?;
    let mut f = File::create(path)?;
    f.write_all(&buffer)?;
    Ok(())
}

/// Save server-produced CSV text as an `.xlsx` file.
pub fn save_xlsx_from_csv<P: AsRef<Path>>(csv_text: &str, path: P) -> Result<(), ExportError> {
    let buffer = csv_to_xlsx(csv_text)?;
    let mut f = File::create(path)?;
    f.write_all(&buffer)?;
    Ok(())
}

/// Save server-produced CSV text as a `.csv` file, adding the BOM when the
/// server did not send one.
pub fn save_csv_text<P: AsRef<Path>>(csv_text: &str, path: P) -> Result<(), ExportError> {
    let mut f = File::create(path)?;
    if !csv_text.starts_with(BOM) {
        f.write_all(BOM.as_bytes())?;
    }
    f.write_all(csv_text.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Table {
        Table::new(
            vec!["Estado".into(), "2020".into(), "2023".into()],
            vec![vec!["São Paulo".into(), "75000".into(), "82000".into()]],
        )
    }

    #[test]
    fn write_csv_and_xlsx_files() {
        let dir = tempdir().unwrap();
        let csvp = dir.path().join("t.csv");
        let xlsxp = dir.path().join("t.xlsx");
        save_csv(&sample(), &csvp).unwrap();
        save_xlsx(&sample(), &xlsxp).unwrap();
        assert!(csvp.exists());
        assert!(std::fs::metadata(&xlsxp).unwrap().len() > 0);
    }

    #[test]
    fn corrupt_csv_is_rejected() {
        // A ragged row is the typical shape of a truncated export.
        let err = csv_to_xlsx("a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, ExportError::CorruptCsv));
    }
}
