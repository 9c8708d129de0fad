use std::path::Path;

use crate::error::Error;
use crate::events::SourceRecord;

/// Reads the image listing from a CSV file.
///
/// Rows whose URL cell is empty are skipped before indexing, so
/// `original_index` counts usable rows only. The optional cap truncates the
/// listing after that filtering. Listing files come out of dataframe
/// exports and routinely contain quoted, multi-line description fields.
pub fn read_records(
    path: &Path,
    url_column: &str,
    max_images: Option<usize>,
) -> Result<Vec<SourceRecord>, Error> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::Input(format!("failed to open {}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| Error::Input(format!("failed to read header of {}: {e}", path.display())))?
        .clone();
    let column = headers.iter().position(|h| h == url_column).ok_or_else(|| {
        Error::Input(format!(
            "column {url_column:?} not found in {} (saw: {})",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(", ")
        ))
    })?;

    let mut records = Vec::new();
    for row in reader.records() {
        if max_images.is_some_and(|max| records.len() >= max) {
            break;
        }
        let row =
            row.map_err(|e| Error::Input(format!("bad row in {}: {e}", path.display())))?;
        let url = row.get(column).unwrap_or("").trim();
        if url.is_empty() {
            continue;
        }
        records.push(SourceRecord {
            original_index: records.len() as u64,
            url: url.to_string(),
        });
    }
    Ok(records)
}
