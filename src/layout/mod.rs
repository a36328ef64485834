//! Discovery of per-sample read locations under a sequencing run directory.

pub mod bcl2fastq;
pub mod nanopore;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use bcl2fastq::Bcl2FastqDef;
pub use nanopore::NanoporeLayoutDef;

/// Sequencing platform. Selects the run-directory layout convention used
/// to discover each sample's reads.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Nanopore,
    Illumina,
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Platform> {
        match s.to_ascii_lowercase().as_str() {
            "nanopore" | "ont" => Ok(Platform::Nanopore),
            "illumina" => Ok(Platform::Illumina),
            _ => Err(Error::UnsupportedPlatform(s.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Nanopore => write!(f, "nanopore"),
            Platform::Illumina => write!(f, "illumina"),
        }
    }
}

/// One physical sample found under the run directory.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct DiscoveredSample {
    /// Normalized join key: the barcode directory name (nanopore) or the
    /// demultiplexed sample name (illumina).
    pub key: String,
    /// Where this sample's reads live: a barcode directory (nanopore) or
    /// the R1 FASTQ (illumina).
    pub read_path: PathBuf,
}

/// A method to find the per-sample read locations under a run directory,
/// based on some configuration held by `self` and the naming conventions
/// encoded in the implementing type.
pub trait FindReads {
    fn find_reads(&self) -> Result<Vec<DiscoveredSample>>;
}

/// A pointer to one sequencing run's raw output on disk. The layout can
/// follow the Oxford Nanopore `barcodeNN/` directory convention or the
/// Illumina `bcl2fastq` filename convention. Use `find_reads()` to get the
/// concrete [`DiscoveredSample`]s for a run.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub enum RunLayout {
    Nanopore(NanoporeLayoutDef),
    Bcl2Fastq(Bcl2FastqDef),
}

impl RunLayout {
    /// The layout convention `platform` implies, rooted at `run_dir`.
    /// The run directory must already exist.
    pub fn new(platform: Platform, run_dir: &Path) -> Result<RunLayout> {
        if !run_dir.exists() {
            return Err(Error::NotFound(run_dir.to_path_buf()));
        }
        if !run_dir.is_dir() {
            return Err(Error::NotADirectory(run_dir.to_path_buf()));
        }
        Ok(match platform {
            Platform::Nanopore => RunLayout::Nanopore(NanoporeLayoutDef {
                run_dir: run_dir.to_path_buf(),
            }),
            Platform::Illumina => RunLayout::Bcl2Fastq(Bcl2FastqDef {
                run_dir: run_dir.to_path_buf(),
            }),
        })
    }
}

impl FindReads for RunLayout {
    fn find_reads(&self) -> Result<Vec<DiscoveredSample>> {
        match self {
            RunLayout::Nanopore(d) => d.find_reads(),
            RunLayout::Bcl2Fastq(d) => d.find_reads(),
        }
    }
}
