//! One module per pipeline step. Every stage checks its external inputs
//! and the metadata columns it names before the first `qiime` call.

pub mod abundance;
pub mod cluster;
pub mod demux;
pub mod denoise;
pub mod diversity;
pub mod filter;
pub mod import;
pub mod metadata;
pub mod phylogeny;
pub mod rarefaction;
pub mod taxonomy;

use crate::stage::StageError;
use amp_types::MetadataTable;
use std::path::Path;

/// Fail unless the metadata file at `path` has every column in `columns`.
pub(crate) fn require_metadata_columns<S: AsRef<str>>(
    path: &Path,
    columns: &[S],
) -> Result<(), StageError> {
    MetadataTable::load(path)?.require_columns(columns)?;
    Ok(())
}
