//! Parsing and validation of run metadata tables.
//!
//! The metadata file is a table with one row per sample, supplied as CSV
//! or as an Excel workbook (`.xls`/`.xlsx`, first sheet). Two columns are
//! required, `sample` and `barcode`, matched case-insensitively and under
//! a few accepted spellings (`samples`, `sample_name`, ...). Every other
//! column is passthrough: carried verbatim, in file order, into the
//! sample sheet.

use crate::error::{Error, Result};
use calamine::{open_workbook_auto, Data, Reader};
use log::debug;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const SAMPLE_COLUMN: &str = "sample";
pub const BARCODE_COLUMN: &str = "barcode";

/// Normalize an identifier for uniqueness checks and join lookups.
/// The verbatim value is what the sheet emits.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Accept `sample` / `samples` / `sample_name` (any case) for the column
/// named `required`, and likewise for `barcode`.
fn matches_required(header: &str, required: &str) -> bool {
    let h = header.to_ascii_lowercase();
    h == required || h == format!("{required}s") || h == format!("{required}_name")
}

/// One validated metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    pub sample: String,
    pub barcode: String,
    /// Passthrough fields, one per entry of [`MetadataTable::extra_columns`].
    pub extra: Vec<String>,
}

/// A parsed, validated metadata table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTable {
    /// Passthrough column headers, in file order.
    pub extra_columns: Vec<String>,
    pub rows: Vec<MetadataRow>,
}

impl MetadataTable {
    /// Load and validate the metadata table at `path`, dispatching on the
    /// file extension: `.csv`, `.xls` or `.xlsx`.
    ///
    /// Rows whose sample field is empty are skipped. Duplicate sample
    /// names or barcodes (after normalization) fail the load, as does a
    /// missing required column or a ragged/unreadable file.
    pub fn load(path: &Path) -> Result<MetadataTable> {
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => MetadataTable::from_csv(path),
            Some("xls") | Some("xlsx") => MetadataTable::from_excel(path),
            _ => Err(Error::UnsupportedMetadataFormat(path.to_path_buf())),
        }
    }

    /// Load a metadata CSV.
    pub fn from_csv(path: &Path) -> Result<MetadataTable> {
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let format_err = |source| Error::Format {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path)?;
        let mut rdr = csv::Reader::from_reader(BufReader::new(file));

        let mut headers = rdr.headers().map_err(format_err)?.clone();
        headers.trim();
        let headers: Vec<String> = headers.iter().map(String::from).collect();

        let mut records = Vec::new();
        for record in rdr.records() {
            let mut record = record.map_err(format_err)?;
            record.trim();
            records.push(record.iter().map(String::from).collect());
        }

        MetadataTable::from_rows(path, headers, records)
    }

    /// Load the first sheet of an Excel workbook.
    pub fn from_excel(path: &Path) -> Result<MetadataTable> {
        let excel_err = |source| Error::Spreadsheet {
            path: path.to_path_buf(),
            source,
        };

        let mut workbook = open_workbook_auto(path).map_err(excel_err)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| excel_err(calamine::Error::Msg("workbook has no sheets")))?
            .map_err(excel_err)?;

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Err(excel_err(calamine::Error::Msg("sheet has no header row")));
        };
        let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();
        let records: Vec<Vec<String>> = rows
            .map(|r| r.iter().map(cell_to_string).collect())
            .collect();

        MetadataTable::from_rows(path, headers, records)
    }

    /// Validate trimmed header and data rows, shared by both loaders.
    fn from_rows(
        path: &Path,
        headers: Vec<String>,
        records: Vec<Vec<String>>,
    ) -> Result<MetadataTable> {
        let sample_col = headers
            .iter()
            .position(|h| matches_required(h, SAMPLE_COLUMN))
            .ok_or_else(|| Error::MissingColumn {
                path: path.to_path_buf(),
                column: SAMPLE_COLUMN,
            })?;
        let barcode_col = headers
            .iter()
            .position(|h| matches_required(h, BARCODE_COLUMN))
            .ok_or_else(|| Error::MissingColumn {
                path: path.to_path_buf(),
                column: BARCODE_COLUMN,
            })?;

        let extra_cols: Vec<usize> = (0..headers.len())
            .filter(|&i| i != sample_col && i != barcode_col)
            .collect();
        let extra_columns: Vec<String> = extra_cols.iter().map(|&i| headers[i].clone()).collect();

        let field = |record: &[String], i: usize| -> String {
            record.get(i).cloned().unwrap_or_default()
        };

        let mut seen_samples = HashSet::new();
        let mut seen_barcodes = HashSet::new();
        let mut rows = Vec::new();

        for record in &records {
            let sample = field(record, sample_col);
            if sample.is_empty() {
                debug!("skipping metadata row with empty sample field");
                continue;
            }
            let barcode = field(record, barcode_col);

            if !seen_samples.insert(normalize_id(&sample)) {
                return Err(Error::DuplicateSample(sample));
            }
            if !barcode.is_empty() && !seen_barcodes.insert(normalize_id(&barcode)) {
                return Err(Error::DuplicateBarcode(barcode));
            }

            let extra = extra_cols.iter().map(|&i| field(record, i)).collect();
            rows.push(MetadataRow {
                sample,
                barcode,
                extra,
            });
        }

        Ok(MetadataTable {
            extra_columns,
            rows,
        })
    }
}

/// Render one worksheet cell the way it reads in the sheet. Excel stores
/// whole numbers as floats, so an integral float renders without the
/// trailing `.0`.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}
