//! Sample sheet assembly and atomic serialization.
//!
//! `build()` is a pure join: metadata rows against the read locations
//! discovered under the run directory, keyed by the platform's join
//! column. Its only side effect is deferred to [`SampleSheet::write_csv`],
//! which writes the finished sheet through a temp file and an atomic
//! rename so a partial sheet is never visible at the output path.

use crate::error::{Error, Result};
use crate::layout::{DiscoveredSample, FindReads, Platform, RunLayout};
use crate::metadata::{normalize_id, MetadataTable};
use crate::scheme::SchemeRef;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// How join anomalies (a metadata row with no reads, or reads with no
/// metadata row) are handled.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Drop unmatched rows from the sheet, one warning each. The default.
    #[default]
    Lenient,
    /// Any unmatched metadata row or read location fails the build,
    /// reporting both anomaly sets at once.
    Strict,
}

/// One resolved output record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSheetRow {
    pub sample: String,
    pub barcode: String,
    pub fastq_path: PathBuf,
    /// Passthrough metadata fields, one per [`SampleSheet::extra_columns`].
    pub extra: Vec<String>,
}

/// The assembled manifest: the terminal artifact of one build, created
/// exactly once and never updated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSheet {
    pub platform: Platform,
    pub scheme: SchemeRef,
    /// Passthrough metadata column headers, in metadata-file order.
    pub extra_columns: Vec<String>,
    /// Rows in metadata-file order.
    pub rows: Vec<SampleSheetRow>,
}

/// Everything needed to build one sample sheet.
#[derive(Debug, Clone)]
pub struct SampleSheetDef {
    pub platform: Platform,
    pub run_dir: PathBuf,
    pub metadata: PathBuf,
    pub scheme: SchemeRef,
    pub join_policy: JoinPolicy,
}

impl Platform {
    /// Which metadata column joins against the discovered read locations:
    /// nanopore runs are laid out by barcode directory, illumina runs by
    /// demultiplexed sample name.
    fn join_key(self, sample: &str, barcode: &str) -> String {
        match self {
            Platform::Nanopore => normalize_id(barcode),
            Platform::Illumina => normalize_id(sample),
        }
    }
}

impl SampleSheetDef {
    /// Build the sheet in memory. Deterministic: identical inputs yield an
    /// identical sheet, row order following the metadata file.
    pub fn build(&self) -> Result<SampleSheet> {
        let metadata = MetadataTable::load(&self.metadata)?;
        let discovered = RunLayout::new(self.platform, &self.run_dir)?.find_reads()?;

        let by_key: HashMap<&str, &DiscoveredSample> =
            discovered.iter().map(|d| (d.key.as_str(), d)).collect();

        let mut matched: HashSet<&str> = HashSet::new();
        let mut rows = Vec::new();
        let mut missing_reads = Vec::new();

        for row in &metadata.rows {
            let key = self.platform.join_key(&row.sample, &row.barcode);
            match by_key.get(key.as_str()) {
                Some(d) => {
                    matched.insert(d.key.as_str());
                    rows.push(SampleSheetRow {
                        sample: row.sample.clone(),
                        barcode: row.barcode.clone(),
                        fastq_path: d.read_path.clone(),
                        extra: row.extra.clone(),
                    });
                }
                None => missing_reads.push(row.sample.clone()),
            }
        }

        let missing_metadata: Vec<String> = discovered
            .iter()
            .filter(|d| !matched.contains(d.key.as_str()))
            .map(|d| d.key.clone())
            .collect();

        if self.join_policy == JoinPolicy::Strict
            && !(missing_reads.is_empty() && missing_metadata.is_empty())
        {
            return Err(Error::UnmatchedSamples {
                missing_reads,
                missing_metadata,
            });
        }
        for sample in &missing_reads {
            warn!(
                "dropping metadata row '{sample}': no reads found under {}",
                self.run_dir.display()
            );
        }
        for key in &missing_metadata {
            warn!(
                "reads for '{key}' under {} have no metadata row",
                self.run_dir.display()
            );
        }

        if rows.is_empty() {
            return Err(Error::NoSamples);
        }

        Ok(SampleSheet {
            platform: self.platform,
            scheme: self.scheme.clone(),
            extra_columns: metadata.extra_columns,
            rows,
        })
    }
}

impl SampleSheet {
    /// Output header, fixed order: identifier/path columns, passthrough
    /// metadata columns, then platform/scheme columns.
    pub fn header(&self) -> Vec<&str> {
        let mut h = vec!["sample", "barcode", "fastq_path"];
        h.extend(self.extra_columns.iter().map(String::as_str));
        h.extend(["platform", "amplicon_scheme", "scheme_path"]);
        h
    }

    fn record(&self, row: &SampleSheetRow) -> Vec<String> {
        let mut r = vec![
            row.sample.clone(),
            row.barcode.clone(),
            row.fastq_path.display().to_string(),
        ];
        r.extend(row.extra.iter().cloned());
        r.extend([
            self.platform.to_string(),
            self.scheme.name.clone(),
            self.scheme.path.clone(),
        ]);
        r
    }

    /// Write the sheet as CSV at `output`, atomically: serialize to a temp
    /// file in the output's directory, then rename into place. On error
    /// the canonical path is left untouched.
    pub fn write_csv(&self, output: &Path) -> Result<()> {
        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let write_err = |source| Error::Write {
            path: output.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut wtr = csv::Writer::from_writer(&mut tmp);
            wtr.write_record(self.header()).map_err(write_err)?;
            for row in &self.rows {
                wtr.write_record(self.record(row)).map_err(write_err)?;
            }
            wtr.flush()?;
        }
        tmp.persist(output).map_err(|e| Error::Io(e.error))?;

        info!("wrote {} samples to {}", self.rows.len(), output.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn scheme() -> SchemeRef {
        SchemeRef::resolve("artic-inrb-mpox/2500/v1.0.0", None).unwrap()
    }

    /// Nanopore run dir with the given barcode subdirectories, plus a
    /// metadata CSV next to it.
    fn fixture(barcodes: &[&str], metadata_csv: &str) -> (tempfile::TempDir, SampleSheetDef) {
        let dir = tempdir().unwrap();
        let run_dir = dir.path().join("run");
        fs::create_dir(&run_dir).unwrap();
        for b in barcodes {
            fs::create_dir(run_dir.join(b)).unwrap();
        }
        let metadata = dir.path().join("metadata.csv");
        fs::write(&metadata, metadata_csv).unwrap();

        let def = SampleSheetDef {
            platform: Platform::Nanopore,
            run_dir,
            metadata,
            scheme: scheme(),
            join_policy: JoinPolicy::Lenient,
        };
        (dir, def)
    }

    #[test]
    fn test_build_and_write() {
        let (dir, def) = fixture(
            &["barcode01", "barcode02"],
            "sample,barcode,location\nSA-01,barcode01,Kinshasa\nSA-02,barcode02,Goma\n",
        );
        let sheet = def.build().unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(
            sheet.header(),
            vec![
                "sample",
                "barcode",
                "fastq_path",
                "location",
                "platform",
                "amplicon_scheme",
                "scheme_path"
            ]
        );
        assert_eq!(sheet.rows[0].fastq_path, def.run_dir.join("barcode01"));

        let out = dir.path().join("sample_sheet.csv");
        sheet.write_csv(&out).unwrap();
        let content = fs::read_to_string(&out).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "sample,barcode,fastq_path,location,platform,amplicon_scheme,scheme_path"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("SA-01,barcode01,"));
        assert!(first.ends_with(
            ",Kinshasa,nanopore,artic-inrb-mpox/2500/v1.0.0,artic-inrb-mpox/2500/v1.0.0"
        ));
    }

    #[test]
    fn test_idempotent_output() {
        let (dir, def) = fixture(
            &["barcode01", "barcode02"],
            "sample,barcode\nSA-01,barcode01\nSA-02,barcode02\n",
        );
        let out1 = dir.path().join("a.csv");
        let out2 = dir.path().join("b.csv");
        def.build().unwrap().write_csv(&out1).unwrap();
        def.build().unwrap().write_csv(&out2).unwrap();
        assert_eq!(fs::read(&out1).unwrap(), fs::read(&out2).unwrap());
    }

    #[test]
    fn test_lenient_drops_unmatched() {
        // run dir has {01,02,03}; metadata has {01,02,04}
        let (_dir, def) = fixture(
            &["barcode01", "barcode02", "barcode03"],
            "sample,barcode\nSA-01,barcode01\nSA-02,barcode02\nSA-04,barcode04\n",
        );
        let sheet = def.build().unwrap();
        let samples: Vec<&str> = sheet.rows.iter().map(|r| r.sample.as_str()).collect();
        assert_eq!(samples, vec!["SA-01", "SA-02"]);
    }

    #[test]
    fn test_strict_reports_both_anomaly_sets() {
        let (_dir, mut def) = fixture(
            &["barcode01", "barcode02", "barcode03"],
            "sample,barcode\nSA-01,barcode01\nSA-02,barcode02\nSA-04,barcode04\n",
        );
        def.join_policy = JoinPolicy::Strict;
        let err = def.build().unwrap_err();
        match err {
            Error::UnmatchedSamples {
                missing_reads,
                missing_metadata,
            } => {
                assert_eq!(missing_reads, vec!["SA-04"]);
                assert_eq!(missing_metadata, vec!["barcode03"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_samples_resolved() {
        let (_dir, def) = fixture(&["barcode01"], "sample,barcode\nSA-09,barcode09\n");
        assert!(matches!(def.build().unwrap_err(), Error::NoSamples));
    }

    #[test]
    fn test_duplicate_leaves_no_output() {
        let (dir, def) = fixture(
            &["barcode01"],
            "sample,barcode\nSA-01,barcode01\nSA-01,barcode02\n",
        );
        let out = dir.path().join("sample_sheet.csv");
        let err = def.build().unwrap_err();
        assert!(matches!(err, Error::DuplicateSample(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_failed_rename_leaves_canonical_path_untouched() {
        let (dir, def) = fixture(&["barcode01"], "sample,barcode\nSA-01,barcode01\n");
        let sheet = def.build().unwrap();

        // A directory squatting on the output path makes the final rename
        // fail after the temp file was fully written. The canonical path
        // must be untouched and no stray temp file left behind.
        let out = dir.path().join("sample_sheet.csv");
        fs::create_dir(&out).unwrap();
        assert!(sheet.write_csv(&out).is_err());
        assert!(out.is_dir());

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["metadata.csv", "run", "sample_sheet.csv"]);
    }

    #[test]
    fn test_write_replaces_prior_sheet_atomically() {
        let (dir, def) = fixture(&["barcode01"], "sample,barcode\nSA-01,barcode01\n");
        let out = dir.path().join("sample_sheet.csv");
        fs::write(&out, "stale").unwrap();
        def.build().unwrap().write_csv(&out).unwrap();
        let content = fs::read_to_string(&out).unwrap();
        assert!(content.starts_with("sample,barcode,fastq_path"));
    }

    #[test]
    fn test_illumina_joins_on_sample_name() {
        let dir = tempdir().unwrap();
        let run_dir = dir.path().join("run");
        fs::create_dir(&run_dir).unwrap();
        fs::write(run_dir.join("SA-01_S1_L001_R1_001.fastq.gz"), b"").unwrap();

        let metadata = dir.path().join("metadata.csv");
        fs::write(&metadata, "sample,barcode\nSA-01,AACCGGTT\n").unwrap();

        let def = SampleSheetDef {
            platform: Platform::Illumina,
            run_dir: run_dir.clone(),
            metadata,
            scheme: scheme(),
            join_policy: JoinPolicy::Strict,
        };
        let sheet = def.build().unwrap();
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(
            sheet.rows[0].fastq_path,
            run_dir.join("SA-01_S1_L001_R1_001.fastq.gz")
        );
    }
}
