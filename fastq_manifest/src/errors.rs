use crate::filenames::ReadDirection;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Input directory does not exist: {}", .path.display())]
    InputDirMissing { path: PathBuf },

    #[error(
        "No FASTQ files ending in {extensions} were found under {}",
        .path.display()
    )]
    NoFastqs { path: PathBuf, extensions: String },

    #[error("Sample ID not found in file: {}", .path.display())]
    SampleIdNotFound { path: PathBuf },

    #[error("Forward/reverse patterns not found in file: {}", .path.display())]
    DirectionNotFound { path: PathBuf },

    #[error(
        "Sample {sample_id} has more than one {direction} read file:\n{}\n{}",
        .first.display(),
        .second.display()
    )]
    DuplicateRead {
        sample_id: String,
        direction: ReadDirection,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Missing {direction} read for sample: {sample_id}")]
    MissingRead {
        sample_id: String,
        direction: ReadDirection,
    },

    #[error("Invalid filename pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Invalid search pattern '{pattern}'")]
    InvalidGlob {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Line {line} of manifest {}: {reason}", .path.display())]
    MalformedManifest {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ManifestError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ManifestError {
        let path = path.into();
        move |source| ManifestError::Io { path, source }
    }
}
