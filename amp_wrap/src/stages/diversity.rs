//! Core phylogenetic diversity metrics and the tests run on them.
//!
//! [`core_metrics`] returns a [`CoreMetrics`] naming where each metric was
//! saved; the significance tests and ordination plots take it as input.

use crate::stage::{
    require_inputs, ActionInvocation, FailurePolicy, StageReport, StageRunner,
};
use crate::stages::require_metadata_columns;
use amp_types::{ArtifactType, PersistedOutput, PipelineParameters, StageOutput};
use anyhow::Result;
use log::info;
use std::path::PathBuf;

pub const CORE_METRICS_DIR: &str = "core_metrics";

const VECTORS: [&str; 4] = [
    "faith_pd_vector",
    "observed_features_vector",
    "shannon_vector",
    "evenness_vector",
];
const METRICS: [&str; 4] = ["unweighted_unifrac", "weighted_unifrac", "jaccard", "bray_curtis"];

/// Every output of `core-metrics-phylogenetic`, saved under its own name.
fn core_metrics_outputs() -> Vec<StageOutput> {
    let mut outputs = vec![StageOutput::artifact(
        "rarefied_table",
        "rarefied_table",
        ArtifactType::FeatureTableFrequency,
    )];
    for v in VECTORS {
        outputs.push(StageOutput::artifact(v, v, ArtifactType::AlphaDiversity));
    }
    for m in METRICS {
        let name = format!("{m}_distance_matrix");
        outputs.push(StageOutput::artifact(&name, &name, ArtifactType::DistanceMatrix));
    }
    for m in METRICS {
        let name = format!("{m}_pcoa_results");
        outputs.push(StageOutput::artifact(&name, &name, ArtifactType::PcoaResults));
    }
    for m in METRICS {
        let name = format!("{m}_emperor");
        outputs.push(StageOutput::visualization(&name, &name));
    }
    outputs
}

/// Where the core metrics used downstream were saved.
#[derive(Clone, Debug)]
pub struct CoreMetrics {
    pub faith_pd_vector: PathBuf,
    pub evenness_vector: PathBuf,
    pub unweighted_unifrac_distance_matrix: PathBuf,
    pub unweighted_unifrac_pcoa_results: PathBuf,
    pub bray_curtis_pcoa_results: PathBuf,
    pub outputs: Vec<PersistedOutput>,
}

pub fn core_metrics(runner: &StageRunner, params: &PipelineParameters) -> Result<CoreMetrics> {
    let d = &params.diversity;
    let mut inv = ActionInvocation::new("diversity", "core-metrics-phylogenetic")
        .input("phylogeny", &d.tree)
        .input("table", &d.table)
        .param("sampling_depth", d.sampling_depth)
        .metadata("metadata", &params.metadata.file)
        .in_dir(d.output_dir.join(CORE_METRICS_DIR));
    for out in core_metrics_outputs() {
        inv = inv.output(out);
    }

    info!("computing core metrics at depth {}", d.sampling_depth);
    let outputs = runner.run(&inv)?;
    Ok(CoreMetrics {
        faith_pd_vector: runner.output_path(&inv, "faith_pd_vector"),
        evenness_vector: runner.output_path(&inv, "evenness_vector"),
        unweighted_unifrac_distance_matrix: runner
            .output_path(&inv, "unweighted_unifrac_distance_matrix"),
        unweighted_unifrac_pcoa_results: runner.output_path(&inv, "unweighted_unifrac_pcoa_results"),
        bray_curtis_pcoa_results: runner.output_path(&inv, "bray_curtis_pcoa_results"),
        outputs,
    })
}

/// Kruskal-Wallis tests of Faith PD and evenness against the metadata.
/// A failed test is recorded in `report` and the others still run.
pub fn alpha_group_significance(
    runner: &StageRunner,
    params: &PipelineParameters,
    metrics: &CoreMetrics,
    report: &mut StageReport,
) -> Result<()> {
    let d = &params.diversity;
    for (vector, suffix) in [
        (&metrics.faith_pd_vector, "faith_pd"),
        (&metrics.evenness_vector, "evenness"),
    ] {
        let inv = ActionInvocation::new("diversity", "alpha-group-significance")
            .input("alpha_diversity", vector)
            .metadata("metadata", &params.metadata.file)
            .output(StageOutput::visualization(
                "visualization",
                &format!("alpha_group_significance_{suffix}"),
            ))
            .in_dir(&d.output_dir);
        let result = runner.run_with_policy(&inv, FailurePolicy::Continue)?;
        report.record(&inv, result);
    }
    Ok(())
}

/// PERMANOVA on the unweighted UniFrac distances, one test per column.
pub fn beta_group_significance(
    runner: &StageRunner,
    params: &PipelineParameters,
    metrics: &CoreMetrics,
) -> Result<Vec<PersistedOutput>> {
    let d = &params.diversity;
    let mut outputs = Vec::new();
    for column in &d.beta_columns {
        info!("running PERMANOVA on unweighted UniFrac for '{column}'");
        let inv = ActionInvocation::new("diversity", "beta-group-significance")
            .input("distance_matrix", &metrics.unweighted_unifrac_distance_matrix)
            .metadata_column("metadata", &params.metadata.file, column)
            .param("pairwise", d.pairwise)
            .output(StageOutput::visualization(
                "visualization",
                &format!(
                    "beta_group_significance_unweighted_unifrac_{}",
                    column.to_lowercase()
                ),
            ))
            .in_dir(&d.output_dir);
        outputs.extend(runner.run(&inv)?);
    }
    Ok(outputs)
}

/// Emperor plots of the unweighted UniFrac and Bray-Curtis ordinations.
pub fn ordination(
    runner: &StageRunner,
    params: &PipelineParameters,
    metrics: &CoreMetrics,
) -> Result<Vec<PersistedOutput>> {
    let d = &params.diversity;
    let mut outputs = Vec::new();
    for (pcoa, metric) in [
        (&metrics.unweighted_unifrac_pcoa_results, "unweighted_unifrac"),
        (&metrics.bray_curtis_pcoa_results, "bray_curtis"),
    ] {
        let inv = ActionInvocation::new("emperor", "plot")
            .input("pcoa", pcoa)
            .metadata("metadata", &params.metadata.file)
            .output(StageOutput::visualization(
                "visualization",
                &format!("emperor_{metric}"),
            ))
            .in_dir(&d.output_dir);
        outputs.extend(runner.run(&inv)?);
    }
    Ok(outputs)
}

pub fn run(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let d = &params.diversity;
    let metadata = &params.metadata.file;
    require_inputs([d.tree.as_path(), d.table.as_path(), metadata.as_path()])?;
    require_metadata_columns(metadata, &d.beta_columns)?;

    let mut report = StageReport::new("diversity");
    let metrics = core_metrics(runner, params)?;
    report.extend(metrics.outputs.clone());
    alpha_group_significance(runner, params, &metrics, &mut report)?;
    report.extend(beta_group_significance(runner, params, &metrics)?);
    report.extend(ordination(runner, params, &metrics)?);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::test_support::*;
    use crate::stage::StageError;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;

    fn setup(dir: &Path) -> PipelineParameters {
        let mut params = PipelineParameters::default();
        params.diversity.tree = dir.join("asv_rooted_tree.qza");
        params.diversity.table = dir.join("filtered-table.qza");
        params.metadata.file = dir.join("metadata_for_q.csv");
        touch(&params.diversity.tree);
        touch(&params.diversity.table);
        fs::write(
            &params.metadata.file,
            "sample-id;disease_state;Horse;Type\nS1;healthy;H1;incisor\n",
        )
        .unwrap();
        params
    }

    #[test]
    fn test_core_metrics_outputs() {
        let outputs = core_metrics_outputs();
        assert_eq!(outputs.len(), 17);
        assert_eq!(
            outputs.iter().filter(|o| o.kind.extension() == "qzv").count(),
            4
        );
        assert_eq!(outputs[5].flag(), "--o-unweighted-unifrac-distance-matrix");
    }

    #[test]
    fn test_full_stage() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("calls.log");
        let params = setup(dir.path());
        let runner = StageRunner::new(recording_qiime(&log)).with_work_dir(dir.path());

        let report = run(&runner, &params)?;
        // 17 core metrics, 2 alpha, 2 beta, 2 emperor
        assert_eq!(report.outputs.len(), 23);
        assert!(report.failed_steps.is_empty());

        let results = dir.path().join("core_diversity_results");
        for f in [
            "core_metrics/faith_pd_vector.qza",
            "core_metrics/bray_curtis_emperor.qzv",
            "alpha_group_significance_faith_pd.qzv",
            "alpha_group_significance_evenness.qzv",
            "beta_group_significance_unweighted_unifrac_disease_state.qzv",
            "beta_group_significance_unweighted_unifrac_horse.qzv",
            "emperor_unweighted_unifrac.qzv",
            "emperor_bray_curtis.qzv",
        ] {
            assert!(results.join(f).exists(), "{f} missing");
        }

        let calls = recorded_calls(&log);
        assert_eq!(calls.len(), 7);
        assert!(calls[3].contains("--p-pairwise --m-metadata-file"));
        assert!(calls[3].contains("--m-metadata-column disease_state"));
        assert!(calls[4].contains("--m-metadata-column Horse"));
        Ok(())
    }

    #[test]
    fn test_alpha_failure_continues() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let params = setup(dir.path());
        let script = format!("[ \"$2\" = alpha-group-significance ] && exit 1\n{TOUCH_OUTPUTS}");
        let runner = StageRunner::new(fake_qiime(&script)).with_work_dir(dir.path());

        let report = run(&runner, &params)?;
        assert_eq!(report.failed_steps.len(), 2);
        assert_eq!(report.outputs.len(), 21);
        assert!(dir
            .path()
            .join("core_diversity_results/emperor_bray_curtis.qzv")
            .exists());
        Ok(())
    }

    #[test]
    fn test_beta_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let params = setup(dir.path());
        let script = format!("[ \"$2\" = beta-group-significance ] && exit 1\n{TOUCH_OUTPUTS}");
        let runner = StageRunner::new(fake_qiime(&script)).with_work_dir(dir.path());

        assert!(run(&runner, &params).is_err());
        assert!(!dir
            .path()
            .join("core_diversity_results/emperor_bray_curtis.qzv")
            .exists());
    }

    #[test]
    fn test_unknown_beta_column_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let mut params = setup(dir.path());
        params.diversity.beta_columns.push("Tooth".to_string());
        let runner = StageRunner::new(recording_qiime(&log)).with_work_dir(dir.path());

        let err = run(&runner, &params).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::Metadata(_))
        ));
        assert!(recorded_calls(&log).is_empty());
        assert!(!dir.path().join("core_diversity_results").exists());
    }
}
