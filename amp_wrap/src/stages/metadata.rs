//! Metadata tabulation and the delimiter conversion utility.

use crate::stage::{require_inputs, ActionInvocation, StageReport, StageRunner};
use amp_types::metadata::transform_to_tsv;
use amp_types::{PipelineParameters, StageOutput};
use anyhow::Result;
use log::info;

pub const TABULATED_METADATA: &str = "tabulated_metadata";

pub fn tabulate(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let metadata = &params.metadata.file;
    require_inputs([metadata.as_path()])?;

    let inv = ActionInvocation::new("metadata", "tabulate")
        .metadata("input", metadata)
        .output(StageOutput::visualization("visualization", TABULATED_METADATA));

    let mut report = StageReport::new("metadata-tabulate");
    report.extend(runner.run(&inv)?);
    Ok(report)
}

/// Rewrite the delimited metadata table as tab-separated text.
/// Returns the number of data rows, or `None` in a dry run.
pub fn transform(params: &PipelineParameters, dry_run: bool) -> Result<Option<usize>> {
    let m = &params.metadata;
    require_inputs([m.transform_input.as_path()])?;
    if dry_run {
        println!(
            "convert {} ('{}'-delimited) to {}",
            m.transform_input.display(),
            m.transform_delimiter,
            m.transform_output.display()
        );
        return Ok(None);
    }
    let rows = transform_to_tsv(
        &m.transform_input,
        params.transform_delimiter(),
        &m.transform_output,
    )?;
    info!(
        "wrote {rows} metadata rows to {}",
        m.transform_output.display()
    );
    Ok(Some(rows))
}
