use super::{DiscoveredSample, FindReads};
use crate::error::Result;
use crate::metadata::normalize_id;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

lazy_static! {
    static ref BCL2FASTQ_REGEX: Regex =
        Regex::new(r"^([\w_-]+)_S(\d+)_L(\d+)_([RI][A12])_(\d+).fastq(.gz)?$").unwrap();
    static ref BCL2FASTQ_NO_LANE_SPLIT_REGEX: Regex =
        Regex::new(r"^([\w_-]+)_S(\d+)_([RI][A12])_(\d+).fastq(.gz)?$").unwrap();
}

/// A pointer to an Illumina run directory holding demultiplexed FASTQ
/// files in the `bcl2fastq` naming convention, e.g.
/// `sampleA_S1_L001_R1_001.fastq.gz`, with an optional `.gz` suffix.
/// One [`DiscoveredSample`] is reported per sample name, pointing at its
/// first R1 file.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct Bcl2FastqDef {
    pub run_dir: PathBuf,
}

impl FindReads for Bcl2FastqDef {
    fn find_reads(&self) -> Result<Vec<DiscoveredSample>> {
        let mut files = get_bcl2fastq_files(&self.run_dir)?;

        // Also look one level down, for the per-project folders emitted by
        // bcl2fastq when a sample sheet assigns projects.
        for entry in std::fs::read_dir(&self.run_dir)? {
            let entry = entry?.path();
            if entry.is_dir() {
                files.extend(get_bcl2fastq_files(entry)?);
            }
        }
        files.sort();

        // A sample with R2/index files but no R1 is tolerated here; it
        // simply stays undiscovered and surfaces as a join anomaly.
        let res = files
            .iter()
            .filter(|f| f.read == "R1")
            .unique_by(|f| normalize_id(&f.sample))
            .map(|f| DiscoveredSample {
                key: normalize_id(&f.sample),
                read_path: f.path.clone(),
            })
            .sorted()
            .collect();
        Ok(res)
    }
}

/// A parsed representation of a FASTQ filename produced by Illumina's
/// bcl2fastq tool, of the form `<sample>_S0_L001_R1_001.fastq`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct IlmnFastqFile {
    pub sample: String,
    pub s: usize,
    pub lane: Option<usize>,
    pub read: String,
    pub chunk: usize,
    pub path: PathBuf,
}

impl IlmnFastqFile {
    /// Attempt to parse `path` as a bcl2fastq-produced FASTQ file.
    pub fn new(path: impl AsRef<Path>) -> Option<IlmnFastqFile> {
        let filename = path.as_ref().file_name()?.to_str()?;

        if let Some(cap) = BCL2FASTQ_REGEX.captures(filename) {
            return Some(IlmnFastqFile {
                sample: cap[1].to_string(),
                s: cap[2].parse().ok()?,
                lane: Some(cap[3].parse().ok()?),
                read: cap[4].to_string(),
                chunk: cap[5].parse().ok()?,
                path: path.as_ref().into(),
            });
        }

        // Try the no-lane-split form next
        if let Some(cap) = BCL2FASTQ_NO_LANE_SPLIT_REGEX.captures(filename) {
            return Some(IlmnFastqFile {
                sample: cap[1].to_string(),
                s: cap[2].parse().ok()?,
                lane: None,
                read: cap[3].to_string(),
                chunk: cap[4].parse().ok()?,
                path: path.as_ref().into(),
            });
        }

        None
    }
}

/// All the bcl2fastq FASTQ files directly under `path`.
fn get_bcl2fastq_files(path: impl AsRef<Path>) -> Result<Vec<IlmnFastqFile>> {
    let mut res = Vec::new();
    for f in std::fs::read_dir(path)? {
        if let Some(parsed) = IlmnFastqFile::new(f?.path()) {
            res.push(parsed);
        }
    }
    Ok(res)
}
