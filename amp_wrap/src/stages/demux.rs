use crate::stage::{require_inputs, ActionInvocation, StageReport, StageRunner};
use crate::stages::require_metadata_columns;
use amp_types::{ArtifactType, PipelineParameters, StageOutput};
use anyhow::Result;

pub const PER_SAMPLE_SEQUENCES: &str = "emp-demux";
pub const ERROR_CORRECTION_DETAILS: &str = "demux-details";

/// Demultiplex single-end EMP reads by the barcodes of a metadata column.
pub fn run(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let d = &params.demux;
    let barcodes = &params.metadata.tsv;
    require_inputs([d.seqs.as_path(), barcodes.as_path()])?;
    require_metadata_columns(barcodes, &[&d.barcode_column])?;

    let inv = ActionInvocation::new("demux", "emp-single")
        .input("seqs", &d.seqs)
        .metadata_column("barcodes", barcodes, &d.barcode_column)
        .output(StageOutput::artifact(
            "per_sample_sequences",
            PER_SAMPLE_SEQUENCES,
            ArtifactType::SequencesWithQuality,
        ))
        .output(StageOutput::artifact(
            "error_correction_details",
            ERROR_CORRECTION_DETAILS,
            ArtifactType::ErrorCorrectionDetails,
        ));

    let mut report = StageReport::new("demux");
    report.extend(runner.run(&inv)?);
    Ok(report)
}
