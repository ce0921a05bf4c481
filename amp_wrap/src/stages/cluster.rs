//! De novo OTU clustering and its summaries.

use crate::stage::{require_inputs, ActionInvocation, StageReport, StageRunner};
use amp_types::{ArtifactType, PipelineParameters, StageOutput};
use anyhow::Result;

pub const CLUSTERED_TABLE: &str = "table-dn-97";
pub const CLUSTERED_SEQUENCES: &str = "rep-seqs-dn-97";
pub const TABLE_SUMMARY: &str = "table-dn-97-summary";
pub const SEQUENCES_SUMMARY: &str = "rep-seqs-dn-97-summary";

/// Cluster the ASVs into OTUs at the configured identity with VSEARCH.
pub fn run(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let c = &params.cluster;
    require_inputs([c.rep_seqs.as_path(), c.table.as_path()])?;

    let inv = ActionInvocation::new("vsearch", "cluster-features-de-novo")
        .input("sequences", &c.rep_seqs)
        .input("table", &c.table)
        .param("perc_identity", c.perc_identity)
        .param("strand", c.strand.as_str())
        .param("threads", c.threads)
        .output(StageOutput::artifact(
            "clustered_table",
            CLUSTERED_TABLE,
            ArtifactType::FeatureTableFrequency,
        ))
        .output(StageOutput::artifact(
            "clustered_sequences",
            CLUSTERED_SEQUENCES,
            ArtifactType::RepresentativeSequences,
        ));

    let mut report = StageReport::new("cluster");
    report.extend(runner.run(&inv)?);
    Ok(report)
}

/// Visual summaries of the clustered table and sequences.
pub fn summarize(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let s = &params.cluster_summary;
    let metadata = &params.metadata.file;
    require_inputs([s.table.as_path(), s.rep_seqs.as_path(), metadata.as_path()])?;

    let table = ActionInvocation::new("feature-table", "summarize")
        .input("table", &s.table)
        .metadata("sample_metadata", metadata)
        .output(StageOutput::visualization("visualization", TABLE_SUMMARY));
    let seqs = ActionInvocation::new("feature-table", "tabulate-seqs")
        .input("data", &s.rep_seqs)
        .output(StageOutput::visualization("visualization", SEQUENCES_SUMMARY));

    let mut report = StageReport::new("cluster-summary");
    report.extend(runner.run(&table)?);
    report.extend(runner.run(&seqs)?);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::test_support::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cluster() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("calls.log");
        let mut params = PipelineParameters::default();
        params.cluster.table = dir.path().join("table.qza");
        params.cluster.rep_seqs = dir.path().join("rep-seqs.qza");
        touch(&params.cluster.table);
        touch(&params.cluster.rep_seqs);

        let runner = StageRunner::new(recording_qiime(&log)).with_work_dir(dir.path());
        let report = run(&runner, &params)?;
        assert_eq!(report.outputs.len(), 2);
        assert!(recorded_calls(&log)[0]
            .contains("--p-perc-identity 0.97 --p-strand plus --p-threads 0"));
        Ok(())
    }

    #[test]
    fn test_summaries() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("calls.log");
        let mut params = PipelineParameters::default();
        params.cluster_summary.table = dir.path().join("table-dn-97.qza");
        params.cluster_summary.rep_seqs = dir.path().join("rep-seqs-dn-97.qza");
        params.metadata.file = dir.path().join("metadata_for_q.csv");
        touch(&params.cluster_summary.table);
        touch(&params.cluster_summary.rep_seqs);
        touch(&params.metadata.file);

        let runner = StageRunner::new(recording_qiime(&log)).with_work_dir(dir.path());
        let report = summarize(&runner, &params)?;
        assert_eq!(
            report
                .outputs
                .iter()
                .map(|o| o.path.file_name().unwrap().to_string_lossy().into_owned())
                .collect::<Vec<_>>(),
            vec!["table-dn-97-summary.qzv", "rep-seqs-dn-97-summary.qzv"]
        );
        let calls = recorded_calls(&log);
        assert!(calls[0].starts_with("feature-table summarize --i-table"));
        assert!(calls[0].contains("--m-sample-metadata-file"));
        assert!(calls[1].starts_with("feature-table tabulate-seqs --i-data"));
        Ok(())
    }

    #[test]
    fn test_summary_checks_all_inputs_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let mut params = PipelineParameters::default();
        params.cluster_summary.table = dir.path().join("table-dn-97.qza");
        params.cluster_summary.rep_seqs = dir.path().join("rep-seqs-dn-97.qza");
        params.metadata.file = dir.path().join("metadata_for_q.csv");
        touch(&params.cluster_summary.table);
        touch(&params.metadata.file);

        let runner = StageRunner::new(recording_qiime(&log)).with_work_dir(dir.path());
        assert!(summarize(&runner, &params).is_err());
        assert!(recorded_calls(&log).is_empty());
        assert!(!dir.path().join("table-dn-97-summary.qzv").exists());
    }
}
