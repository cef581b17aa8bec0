//! CSV input boundary: reads prospect rows in file order.

use std::path::Path;

use prospectclean_shared::{ColumnsConfig, ProspectCleanError, ProspectRow, Result};
use tracing::debug;

/// An input table: header plus rows in original file order.
#[derive(Debug, Clone)]
pub struct CsvTable {
    /// Column names in file order.
    pub header: Vec<String>,
    /// Rows with stable zero-based indexes.
    pub rows: Vec<ProspectRow>,
}

/// Read the input CSV at `path` and check that every configured column is
/// present in the header.
pub fn read_table(path: &Path, columns: &ColumnsConfig) -> Result<CsvTable> {
    let content = read_file_as_utf8(path)?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| ProspectCleanError::Source(format!("{}: {e}", path.display())))?
        .iter()
        .map(String::from)
        .collect();

    let required = [
        &columns.last_name,
        &columns.first_name,
        &columns.company,
        &columns.email,
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|col| !header.iter().any(|h| h == **col))
        .map(|col| col.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(ProspectCleanError::Source(format!(
            "{}: missing column(s) {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| ProspectCleanError::Source(format!("{}: {e}", path.display())))?;
        let fields = header
            .iter()
            .cloned()
            .zip(record.iter().map(String::from))
            .collect();
        rows.push(ProspectRow { index, fields });
    }

    debug!(path = %path.display(), rows = rows.len(), "input table read");

    Ok(CsvTable { header, rows })
}

/// Read a file as UTF-8, falling back to Latin-1 for legacy exports.
fn read_file_as_utf8(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| ProspectCleanError::Source(format!("{}: {e}", path.display())))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            debug!(path = %path.display(), "input is not UTF-8, decoding as Latin-1");
            Ok(e.into_bytes().iter().map(|&b| b as char).collect())
        }
    }
}
