//! Error taxonomy for sample sheet construction.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while building a sample sheet.
///
/// Every variant here is deterministic: re-running the build with the same
/// inputs cannot succeed. None of these are retried inside the builder;
/// retry, if any, is the job runner's decision via [`crate::exec`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("input path '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("run directory '{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("malformed metadata file '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed metadata file '{path}': {source}")]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("unsupported metadata file format '{0}'; use .csv, .xls or .xlsx")]
    UnsupportedMetadataFormat(PathBuf),

    #[error(
        "metadata file '{path}' is missing required column '{column}' \
         (accepted spellings: '{column}', '{column}s', '{column}_name', any case)"
    )]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("unsupported platform '{0}'; expected 'nanopore' (alias 'ont') or 'illumina'")]
    UnsupportedPlatform(String),

    #[error(
        "amplicon scheme '{0}' is not recognized; built-in schemes use the format \
         'name/length/version' (e.g. artic-inrb-mpox/2500/v1.0.0)"
    )]
    SchemeNotFound(String),

    #[error("custom amplicon scheme path '{0}' does not exist")]
    CustomSchemeNotFound(PathBuf),

    #[error("metadata contains duplicate sample name '{0}'; sample names must be unique")]
    DuplicateSample(String),

    #[error("metadata contains duplicate barcode '{0}'; barcodes must be unique")]
    DuplicateBarcode(String),

    #[error(
        "sample sheet join failed: metadata rows with no reads under the run directory: [{}]; \
         read locations with no metadata row: [{}]",
        .missing_reads.join(", "),
        .missing_metadata.join(", ")
    )]
    UnmatchedSamples {
        missing_reads: Vec<String>,
        missing_metadata: Vec<String>,
    },

    #[error("no samples resolved: nothing in the metadata matched a read location under the run directory")]
    NoSamples,

    #[error("failed to write sample sheet '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
