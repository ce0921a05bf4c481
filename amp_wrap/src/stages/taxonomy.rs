//! Taxonomic classification of the representative sequences.

use crate::stage::{require_inputs, ActionInvocation, StageReport, StageRunner};
use amp_types::{ArtifactType, PipelineParameters, StageOutput};
use anyhow::{Context, Result};
use log::info;

pub const TAXONOMY: &str = "taxonomy";
pub const BARPLOT: &str = "taxonomy_barplot";

/// Classify the reads with a pre-trained naive Bayes classifier, then plot
/// the per-sample composition.
///
/// The taxonomy is saved before the bar plot runs; a failed bar plot leaves
/// it in place.
pub fn run(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let t = &params.taxonomy;
    let metadata = &params.metadata.file;
    let inputs = [
        t.classifier.as_path(),
        t.reads.as_path(),
        t.table.as_path(),
        metadata.as_path(),
    ];
    if t.classifier.exists() {
        require_inputs(inputs)?;
    } else {
        require_inputs(inputs).with_context(|| {
            format!(
                "The classifier is not downloaded automatically. Fetch it from {}",
                t.classifier_url
            )
        })?;
    }

    let classify = ActionInvocation::new("feature-classifier", "classify-sklearn")
        .input("classifier", &t.classifier)
        .input("reads", &t.reads)
        .output(StageOutput::artifact(
            "classification",
            TAXONOMY,
            ArtifactType::Taxonomy,
        ));
    let taxonomy = runner.output_path(&classify, "classification");

    let mut report = StageReport::new("taxonomy");
    info!("classifying {}", t.reads.display());
    report.extend(runner.run(&classify)?);

    let barplot = ActionInvocation::new("taxa", "barplot")
        .input("table", &t.table)
        .input("taxonomy", taxonomy)
        .metadata("metadata", metadata)
        .output(StageOutput::visualization("visualization", BARPLOT));
    report.extend(runner.run(&barplot)?);
    Ok(report)
}
