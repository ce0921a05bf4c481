//! Read sample ids and read directions out of FASTQ filenames.

pub mod fastq_dir;

use crate::errors::ManifestError;
use amp_types::parameters::{DuplicatePolicy, ManifestParams};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::Path;

#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(rename_all = "snake_case")]
pub enum ReadDirection {
    Forward,
    Reverse,
}

impl Display for ReadDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReadDirection::Forward => "forward",
            ReadDirection::Reverse => "reverse",
        })
    }
}

/// The naming convention of a directory of paired-end reads.
#[derive(Clone, Debug)]
pub struct FastqNamePatterns {
    pub extensions: Vec<String>,
    pub filter: Option<String>,
    pub duplicates: DuplicatePolicy,
    split: Regex,
    forward: Regex,
    reverse: Regex,
}

fn compile(pattern: &str) -> Result<Regex, ManifestError> {
    Regex::new(pattern).map_err(|source| ManifestError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

impl FastqNamePatterns {
    pub fn new(params: &ManifestParams) -> Result<Self, ManifestError> {
        Ok(FastqNamePatterns {
            extensions: params.extensions.clone(),
            filter: params.filter.clone(),
            duplicates: params.duplicates,
            split: compile(&params.split_pattern)?,
            forward: compile(&params.forward_pattern)?,
            reverse: compile(&params.reverse_pattern)?,
        })
    }

    /// The sample id is the text before the first split match.
    /// A filename the pattern does not split has no sample id.
    pub fn sample_id(&self, path: &Path) -> Result<String, ManifestError> {
        let not_found = || ManifestError::SampleIdNotFound {
            path: path.to_path_buf(),
        };
        let filename = file_name(path).ok_or_else(not_found)?;
        let mut fields = self.split.splitn(filename, 2);
        match (fields.next(), fields.next()) {
            (Some(id), Some(_)) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(not_found()),
        }
    }

    /// The forward pattern is tried first, so a filename matching both is forward.
    pub fn direction(&self, path: &Path) -> Result<ReadDirection, ManifestError> {
        let filename = file_name(path).ok_or_else(|| ManifestError::DirectionNotFound {
            path: path.to_path_buf(),
        })?;
        if self.forward.is_match(filename) {
            Ok(ReadDirection::Forward)
        } else if self.reverse.is_match(filename) {
            Ok(ReadDirection::Reverse)
        } else {
            Err(ManifestError::DirectionNotFound {
                path: path.to_path_buf(),
            })
        }
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|f| f.to_str())
}
