//! Drop features seen in too few samples, and summarize the result.

use crate::stage::{require_inputs, ActionInvocation, StageReport, StageRunner};
use amp_types::{ArtifactType, PipelineParameters, StageOutput};
use anyhow::Result;
use std::path::Path;

pub const ASV_FILTERED: &str = "asv_table-filtered";
pub const OTU_FILTERED: &str = "otu_table-filtered";
pub const FEATURE_FREQUENCIES: &str = "asv_feature_frequencies";
pub const SAMPLE_FREQUENCIES: &str = "asv_sample_frequencies";
pub const FILTERED_SUMMARY: &str = "asv_table-filtered-summary";

fn filter_features(table: &Path, min_samples: u32, file_stem: &str) -> ActionInvocation {
    ActionInvocation::new("feature-table", "filter-features")
        .input("table", table)
        .param("min_samples", min_samples)
        .output(StageOutput::artifact(
            "filtered_table",
            file_stem,
            ArtifactType::FeatureTableFrequency,
        ))
}

/// Filter the ASV table, then the OTU table.
pub fn run(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let f = &params.filter;
    require_inputs([f.asv_table.as_path(), f.otu_table.as_path()])?;

    let mut report = StageReport::new("filter");
    for (table, stem) in [(&f.asv_table, ASV_FILTERED), (&f.otu_table, OTU_FILTERED)] {
        report.extend(runner.run(&filter_features(table, f.min_samples, stem))?);
    }
    Ok(report)
}

pub fn summarize(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let table = &params.filter_summary.table;
    let metadata = &params.metadata.file;
    require_inputs([table.as_path(), metadata.as_path()])?;

    let inv = ActionInvocation::new("feature-table", "summarize-plus")
        .input("table", table)
        .metadata("metadata", metadata)
        .output(StageOutput::artifact(
            "feature_frequencies",
            FEATURE_FREQUENCIES,
            ArtifactType::ImmutableMetadata,
        ))
        .output(StageOutput::artifact(
            "sample_frequencies",
            SAMPLE_FREQUENCIES,
            ArtifactType::ImmutableMetadata,
        ))
        .output(StageOutput::visualization("summary", FILTERED_SUMMARY));

    let mut report = StageReport::new("filter-summary");
    report.extend(runner.run(&inv)?);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::test_support::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filter_both_tables() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("calls.log");
        let mut params = PipelineParameters::default();
        params.filter.asv_table = dir.path().join("table.qza");
        params.filter.otu_table = dir.path().join("table-dn-97.qza");
        touch(&params.filter.asv_table);
        touch(&params.filter.otu_table);

        let runner = StageRunner::new(recording_qiime(&log)).with_work_dir(dir.path());
        let report = run(&runner, &params)?;
        assert_eq!(report.outputs.len(), 2);
        assert!(dir.path().join("asv_table-filtered.qza").exists());
        assert!(dir.path().join("otu_table-filtered.qza").exists());

        let calls = recorded_calls(&log);
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.contains("--p-min-samples 2")));
        Ok(())
    }

    #[test]
    fn test_missing_otu_table_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let mut params = PipelineParameters::default();
        params.filter.asv_table = dir.path().join("table.qza");
        params.filter.otu_table = dir.path().join("table-dn-97.qza");
        touch(&params.filter.asv_table);

        let runner = StageRunner::new(recording_qiime(&log)).with_work_dir(dir.path());
        let err = run(&runner, &params).unwrap_err();
        assert!(err.to_string().contains("table-dn-97.qza"));
        assert!(recorded_calls(&log).is_empty());
        assert!(!dir.path().join("asv_table-filtered.qza").exists());
    }

    #[test]
    fn test_summarize_plus() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut params = PipelineParameters::default();
        params.filter_summary.table = dir.path().join("asv_table-filtered.qza");
        params.metadata.file = dir.path().join("metadata_for_q.csv");
        touch(&params.filter_summary.table);
        touch(&params.metadata.file);

        let runner = StageRunner::new(fake_qiime(TOUCH_OUTPUTS)).with_work_dir(dir.path());
        let report = summarize(&runner, &params)?;
        assert_eq!(report.outputs.len(), 3);
        assert!(dir.path().join("asv_table-filtered-summary.qzv").exists());
        Ok(())
    }
}
