//! Tolerant reader for raw delimited files
//!
//! Raw uploads are either `;` or `,` separated and may contain malformed
//! lines. Nothing here returns an error: an unreadable file is an empty frame.

use crate::shared::frame::{Frame, Value};
use std::path::Path;
use tracing::{debug, warn};

const PRIMARY_DELIMITER: u8 = b';';
const FALLBACK_DELIMITER: u8 = b',';

/// Read a raw file. Missing or unreadable files yield an empty frame.
pub fn read_raw(path: &Path) -> Frame {
    if !path.is_file() {
        debug!("[bronze] {} not found", path.display());
        return Frame::default();
    }

    match read_delimited(path, PRIMARY_DELIMITER) {
        Ok(frame) if !needs_fallback(&frame) => return frame,
        Ok(_) => debug!(
            "[bronze] {} parsed to one column with ';', retrying with ','",
            path.display()
        ),
        Err(e) => debug!(
            "[bronze] {} unreadable with ';' ({}), retrying with ','",
            path.display(),
            e
        ),
    }

    match read_delimited(path, FALLBACK_DELIMITER) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("[bronze] {} unreadable: {}", path.display(), e);
            Frame::default()
        }
    }
}

fn needs_fallback(frame: &Frame) -> bool {
    frame.columns().len() == 1 && frame.columns()[0].contains(',')
}

/// Parse with one delimiter. Rows with more fields than the header are
/// skipped, shorter rows are padded, empty cells are null.
pub fn read_delimited(path: &Path, delimiter: u8) -> Result<Frame, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let width = header.len();
    let mut frame = Frame::new(header);
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = record?;
        if record.len() > width {
            skipped += 1;
            continue;
        }
        let row = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::str(cell)
                }
            })
            .collect();
        frame.push_row(row);
    }

    if skipped > 0 {
        debug!(
            "[bronze] {}: skipped {} malformed rows",
            path.display(),
            skipped
        );
    }
    Ok(frame)
}

/// Drop columns with an empty header or an `Unnamed` prefix
pub fn strip_unnamed(frame: &Frame) -> Frame {
    frame.drop_columns(|c| c.trim().is_empty() || c.starts_with("Unnamed"))
}
