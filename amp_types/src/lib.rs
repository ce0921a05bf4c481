//! amp_types
//! Types shared by the manifest builder and the pipeline stage wrappers.

// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]

pub mod artifact;
pub mod metadata;
pub mod parameters;

pub use artifact::{ArtifactType, OutputKind, PersistedOutput, StageOutput};
pub use metadata::{MetadataError, MetadataTable};
pub use parameters::PipelineParameters;
