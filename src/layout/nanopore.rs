use super::{DiscoveredSample, FindReads};
use crate::error::Result;
use crate::metadata::normalize_id;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

lazy_static! {
    static ref BARCODE_DIR_REGEX: Regex = Regex::new(r"^barcode\d+$").unwrap();
}

/// A pointer to an Oxford Nanopore run directory, where basecalling has
/// demultiplexed reads into one subdirectory per barcode
/// (`barcode01/`, `barcode02/`, ...). Reads that could not be assigned a
/// barcode land in `unclassified/`, which is never part of a sample sheet.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct NanoporeLayoutDef {
    pub run_dir: PathBuf,
}

impl FindReads for NanoporeLayoutDef {
    fn find_reads(&self) -> Result<Vec<DiscoveredSample>> {
        let mut res = Vec::new();

        for entry in std::fs::read_dir(&self.run_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if BARCODE_DIR_REGEX.is_match(name) {
                res.push(DiscoveredSample {
                    key: normalize_id(name),
                    read_path: path,
                });
            }
        }

        res.sort();
        Ok(res)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_barcode_dirs_discovered() -> Result<()> {
        let dir = tempdir()?;
        for d in ["barcode01", "barcode02", "barcode12"] {
            std::fs::create_dir(dir.path().join(d))?;
        }
        std::fs::create_dir(dir.path().join("unclassified"))?;
        std::fs::create_dir(dir.path().join("fastq_fail"))?;
        // A stray file named like a barcode dir must not be picked up.
        std::fs::write(dir.path().join("barcode99"), b"")?;

        let def = NanoporeLayoutDef {
            run_dir: dir.path().to_path_buf(),
        };
        let found = def.find_reads()?;

        let keys: Vec<&str> = found.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["barcode01", "barcode02", "barcode12"]);
        assert_eq!(found[0].read_path, dir.path().join("barcode01"));
        Ok(())
    }

    #[test]
    fn test_empty_run_dir() -> Result<()> {
        let dir = tempdir()?;
        let def = NanoporeLayoutDef {
            run_dir: dir.path().to_path_buf(),
        };
        assert!(def.find_reads()?.is_empty());
        Ok(())
    }
}
