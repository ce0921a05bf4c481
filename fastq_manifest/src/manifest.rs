//! Build, write and read the paired-end FASTQ manifest.
//!
//! The manifest is a tab-separated text file with the header
//! [`MANIFEST_HEADER`] and one row per sample, in the order samples were
//! first discovered.

use crate::errors::ManifestError;
use crate::filenames::fastq_dir::find_fastqs;
use crate::filenames::{FastqNamePatterns, ReadDirection};
use amp_types::parameters::{DuplicatePolicy, ManifestParams};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_HEADER: &str =
    "sample-id\tforward-absolute-filepath\treverse-absolute-filepath";

#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct ManifestEntry {
    pub sample_id: String,
    pub forward: PathBuf,
    pub reverse: PathBuf,
}

/// Complete sample rows, unique by sample id.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct SampleManifest {
    entries: Vec<ManifestEntry>,
}

impl SampleManifest {
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, sample_id: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.sample_id == sample_id)
    }

    /// The manifest text, newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::from(MANIFEST_HEADER);
        out.push('\n');
        for e in &self.entries {
            out.push_str(&format!(
                "{}\t{}\t{}\n",
                e.sample_id,
                e.forward.display(),
                e.reverse.display()
            ));
        }
        out
    }

    /// Write the manifest to `path`, replacing any existing file.
    /// The parent directory must already exist.
    pub fn write_tsv(&self, path: &Path) -> Result<(), ManifestError> {
        std::fs::write(path, self.render()).map_err(ManifestError::io(path))
    }

    pub fn read_tsv(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(ManifestError::io(path))?;
        let malformed = |line: usize, reason: String| ManifestError::MalformedManifest {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut lines = text.lines().enumerate();
        match lines.next() {
            Some((_, header)) if header == MANIFEST_HEADER => {}
            Some((_, header)) => {
                return Err(malformed(1, format!("unexpected header '{header}'")));
            }
            None => return Err(malformed(1, "missing header".to_string())),
        }

        let mut entries: Vec<ManifestEntry> = Vec::new();
        for (i, line) in lines {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let [sample_id, forward, reverse] = fields[..] else {
                return Err(malformed(
                    i + 1,
                    format!("expected 3 tab-separated fields, found {}", fields.len()),
                ));
            };
            if entries.iter().any(|e| e.sample_id == sample_id) {
                return Err(malformed(i + 1, format!("duplicate sample id '{sample_id}'")));
            }
            entries.push(ManifestEntry {
                sample_id: sample_id.to_string(),
                forward: forward.into(),
                reverse: reverse.into(),
            });
        }
        Ok(SampleManifest { entries })
    }
}

#[derive(Default)]
struct ReadSlots {
    forward: Option<PathBuf>,
    reverse: Option<PathBuf>,
}

impl ReadSlots {
    fn slot(&mut self, direction: ReadDirection) -> &mut Option<PathBuf> {
        match direction {
            ReadDirection::Forward => &mut self.forward,
            ReadDirection::Reverse => &mut self.reverse,
        }
    }
}

/// True when `samples` paired rows do not account for exactly `files`
/// discovered read files.
pub fn count_mismatch(samples: usize, files: usize) -> bool {
    samples * 2 != files
}

/// Groups the FASTQ files of a directory tree into manifest rows.
pub struct ManifestBuilder {
    patterns: FastqNamePatterns,
}

impl ManifestBuilder {
    pub fn new(params: &ManifestParams) -> Result<Self, ManifestError> {
        Ok(ManifestBuilder {
            patterns: FastqNamePatterns::new(params)?,
        })
    }

    pub fn patterns(&self) -> &FastqNamePatterns {
        &self.patterns
    }

    /// Discover the read files under `input_dir` and pair them by sample.
    pub fn build(&self, input_dir: &Path) -> Result<SampleManifest, ManifestError> {
        let files = find_fastqs(input_dir, &self.patterns)?;
        info!("found {} FASTQ files under {}", files.len(), input_dir.display());
        let manifest = self.build_from_files(&files)?;
        if count_mismatch(manifest.len(), files.len()) {
            warn!(
                "{} samples were paired from {} files; some files may not have been included",
                manifest.len(),
                files.len()
            );
        }
        Ok(manifest)
    }

    /// Pair an explicit list of read files by sample, in list order.
    pub fn build_from_files(&self, files: &[PathBuf]) -> Result<SampleManifest, ManifestError> {
        let mut order: Vec<String> = Vec::new();
        let mut slots: HashMap<String, ReadSlots> = HashMap::new();

        for path in files {
            let sample_id = self.patterns.sample_id(path)?;
            let direction = self.patterns.direction(path)?;
            debug!("{} -> {sample_id} ({direction})", path.display());

            let reads = slots.entry(sample_id.clone()).or_insert_with(|| {
                order.push(sample_id.clone());
                ReadSlots::default()
            });
            let slot = reads.slot(direction);
            if let Some(first) = slot.as_ref() {
                match self.patterns.duplicates {
                    DuplicatePolicy::Error => {
                        return Err(ManifestError::DuplicateRead {
                            sample_id,
                            direction,
                            first: first.clone(),
                            second: path.clone(),
                        });
                    }
                    DuplicatePolicy::LastWins => {
                        debug!(
                            "replacing {direction} read of {sample_id}: {} -> {}",
                            first.display(),
                            path.display()
                        );
                    }
                }
            }
            *slot = Some(path.clone());
        }

        let mut entries = Vec::with_capacity(order.len());
        for sample_id in order {
            let Some(reads) = slots.remove(&sample_id) else {
                continue;
            };
            let (forward, reverse) = match (reads.forward, reads.reverse) {
                (Some(f), Some(r)) => (f, r),
                (None, _) => {
                    return Err(ManifestError::MissingRead {
                        sample_id,
                        direction: ReadDirection::Forward,
                    });
                }
                (_, None) => {
                    return Err(ManifestError::MissingRead {
                        sample_id,
                        direction: ReadDirection::Reverse,
                    });
                }
            };
            entries.push(ManifestEntry {
                sample_id,
                forward,
                reverse,
            });
        }
        Ok(SampleManifest { entries })
    }

    /// Build the manifest for `input_dir` and write it to `output`.
    /// Nothing is written unless every sample is complete.
    pub fn write_manifest(
        &self,
        input_dir: &Path,
        output: &Path,
    ) -> Result<SampleManifest, ManifestError> {
        let manifest = self.build(input_dir)?;
        manifest.write_tsv(output)?;
        info!(
            "wrote manifest with {} samples to {}",
            manifest.len(),
            output.display()
        );
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Reads {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    fn reads(names: &[&str]) -> Reads {
        let dir = tempfile::tempdir().unwrap();
        let root = std::path::absolute(dir.path()).unwrap();
        for name in names {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"@r\nACGT\n+\nIIII\n").unwrap();
        }
        Reads { _dir: dir, root }
    }

    fn builder() -> ManifestBuilder {
        ManifestBuilder::new(&ManifestParams::default()).unwrap()
    }

    #[test]
    fn test_single_pair() -> Result<()> {
        let r = reads(&["S1_1.fastq.gz", "S1_2.fastq.gz"]);
        let out = r.root.join("manifest.tsv");
        builder().write_manifest(&r.root, &out)?;

        let expected = format!(
            "{MANIFEST_HEADER}\nS1\t{}\t{}\n",
            r.root.join("S1_1.fastq.gz").display(),
            r.root.join("S1_2.fastq.gz").display()
        );
        assert_eq!(fs::read_to_string(&out)?, expected);
        Ok(())
    }

    #[test]
    fn test_rows_follow_first_discovery() -> Result<()> {
        let r = reads(&[
            "B_2.fastq.gz",
            "A_1.fastq.gz",
            "B_1.fastq.gz",
            "A_2.fastq.gz",
            "sub/C_1.fq.gz",
            "sub/C_2.fq.gz",
        ]);
        let manifest = builder().build(&r.root)?;
        let ids: Vec<&str> = manifest
            .entries()
            .iter()
            .map(|e| e.sample_id.as_str())
            .collect();
        // .fastq.gz files sorted by path come first, then .fq.gz
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(manifest.get("C").unwrap().reverse, r.root.join("sub/C_2.fq.gz"));
        Ok(())
    }

    #[test]
    fn test_unsplittable_name_fails() {
        let r = reads(&["S1_1.fastq.gz", "S1_2.fastq.gz", "X.fastq.gz"]);
        let out = r.root.join("manifest.tsv");
        let err = builder().write_manifest(&r.root, &out).unwrap_err();
        match err {
            ManifestError::SampleIdNotFound { path } => {
                assert_eq!(path, r.root.join("X.fastq.gz"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!out.exists());
    }

    #[test]
    fn test_unknown_direction_fails() {
        let r = reads(&["S1_3.fastq.gz"]);
        assert!(matches!(
            builder().build(&r.root),
            Err(ManifestError::DirectionNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_reverse_writes_nothing() {
        let r = reads(&["S1_1.fastq.gz", "S1_2.fastq.gz", "S2_1.fastq.gz"]);
        let out = r.root.join("manifest.tsv");
        let err = builder().write_manifest(&r.root, &out).unwrap_err();
        match err {
            ManifestError::MissingRead {
                sample_id,
                direction,
            } => {
                assert_eq!(sample_id, "S2");
                assert_eq!(direction, ReadDirection::Reverse);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_forward() {
        let r = reads(&["S9_2.fastq.gz"]);
        assert_eq!(
            builder().build(&r.root).unwrap_err().to_string(),
            "Missing forward read for sample: S9"
        );
    }

    #[test]
    fn test_forward_precedence_in_manifest() -> Result<()> {
        let params = ManifestParams {
            forward_pattern: "R".to_string(),
            reverse_pattern: "R2".to_string(),
            ..ManifestParams::default()
        };
        let r = reads(&["S1_R1.fastq.gz", "S1_R2.fastq.gz"]);
        let err = ManifestBuilder::new(&params)?.build(&r.root).unwrap_err();
        // both files classify as forward
        assert!(matches!(
            err,
            ManifestError::DuplicateRead {
                direction: ReadDirection::Forward,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_duplicate_policy() -> Result<()> {
        let r = reads(&[
            "a/S1_1.fastq.gz",
            "b/S1_1.fastq.gz",
            "a/S1_2.fastq.gz",
        ]);
        let err = builder().build(&r.root).unwrap_err();
        match err {
            ManifestError::DuplicateRead {
                sample_id,
                first,
                second,
                ..
            } => {
                assert_eq!(sample_id, "S1");
                assert_eq!(first, r.root.join("a/S1_1.fastq.gz"));
                assert_eq!(second, r.root.join("b/S1_1.fastq.gz"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let params = ManifestParams {
            duplicates: DuplicatePolicy::LastWins,
            ..ManifestParams::default()
        };
        let manifest = ManifestBuilder::new(&params)?.build(&r.root)?;
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.entries()[0].forward, r.root.join("b/S1_1.fastq.gz"));
        Ok(())
    }

    #[test]
    fn test_count_mismatch_still_builds() -> Result<()> {
        assert!(!count_mismatch(2, 4));
        assert!(count_mismatch(1, 3));
        assert!(count_mismatch(0, 1));

        let r = reads(&[
            "a/S1_1.fastq.gz",
            "b/S1_1.fastq.gz",
            "a/S1_2.fastq.gz",
        ]);
        let params = ManifestParams {
            duplicates: DuplicatePolicy::LastWins,
            ..ManifestParams::default()
        };
        let builder = ManifestBuilder::new(&params)?;
        let files = find_fastqs(&r.root, builder.patterns())?;
        let manifest = builder.build(&r.root)?;
        assert_eq!(files.len(), 3);
        assert_eq!(manifest.len(), 1);
        assert!(count_mismatch(manifest.len(), files.len()));
        Ok(())
    }

    #[test]
    fn test_write_then_read() -> Result<()> {
        let r = reads(&[
            "S1_1.fastq.gz",
            "S1_2.fastq.gz",
            "S2_1.fastq.gz",
            "S2_2.fastq.gz",
        ]);
        let out = r.root.join("manifest.tsv");
        fs::write(&out, "stale")?;
        let written = builder().write_manifest(&r.root, &out)?;
        assert_eq!(written.len(), 2);
        assert_eq!(SampleManifest::read_tsv(&out)?, written);
        Ok(())
    }

    #[test]
    fn test_missing_output_dir_is_an_error() {
        let r = reads(&["S1_1.fastq.gz", "S1_2.fastq.gz"]);
        let out = r.root.join("no/such/dir/manifest.tsv");
        assert!(matches!(
            builder().write_manifest(&r.root, &out),
            Err(ManifestError::Io { .. })
        ));
    }

    #[test]
    fn test_read_rejects_bad_rows() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("m.tsv");

        fs::write(&path, "sample-id,forward,reverse\n")?;
        assert!(SampleManifest::read_tsv(&path).is_err());

        fs::write(&path, format!("{MANIFEST_HEADER}\nS1\t/a_1.fq.gz\n"))?;
        assert!(matches!(
            SampleManifest::read_tsv(&path),
            Err(ManifestError::MalformedManifest { line: 2, .. })
        ));
        Ok(())
    }
}
