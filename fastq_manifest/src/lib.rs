//! Pair forward and reverse FASTQ files by sample and write the
//! tab-separated manifest consumed by `qiime tools import`.

// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]

pub mod errors;
pub mod filenames;
pub mod manifest;

pub use errors::ManifestError;
pub use filenames::{FastqNamePatterns, ReadDirection};
pub use manifest::{ManifestBuilder, ManifestEntry, SampleManifest, MANIFEST_HEADER};
