use crate::stage::{require_inputs, ActionInvocation, StageReport, StageRunner};
use amp_types::{PipelineParameters, StageOutput};
use anyhow::Result;

pub const ALPHA_RAREFACTION: &str = "asv_alpha_rarefaction";

/// Alpha rarefaction curves up to the configured depth.
pub fn run(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let r = &params.rarefaction;
    let metadata = &params.metadata.file;
    require_inputs([r.table.as_path(), r.tree.as_path(), metadata.as_path()])?;

    let inv = ActionInvocation::new("diversity", "alpha-rarefaction")
        .input("table", &r.table)
        .input("phylogeny", &r.tree)
        .param("max_depth", r.max_depth)
        .metadata("metadata", metadata)
        .output(StageOutput::visualization("visualization", ALPHA_RAREFACTION));

    let mut report = StageReport::new("rarefaction");
    report.extend(runner.run(&inv)?);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::test_support::*;
    use crate::stage::StageError;
    use pretty_assertions::assert_eq;

    fn params(dir: &std::path::Path) -> PipelineParameters {
        let mut params = PipelineParameters::default();
        params.rarefaction.table = dir.join("filtered-table.qza");
        params.rarefaction.tree = dir.join("asv_rooted_tree.qza");
        params.metadata.file = dir.join("metadata_for_q.csv");
        params
    }

    #[test]
    fn test_rarefaction() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("calls.log");
        let params = params(dir.path());
        touch(&params.rarefaction.table);
        touch(&params.rarefaction.tree);
        touch(&params.metadata.file);

        let runner = StageRunner::new(recording_qiime(&log)).with_work_dir(dir.path());
        let report = run(&runner, &params)?;
        assert_eq!(
            report.outputs[0].path,
            dir.path().join("asv_alpha_rarefaction.qzv")
        );
        assert!(recorded_calls(&log)[0].contains("--p-max-depth 13000"));
        Ok(())
    }

    #[test]
    fn test_all_missing_inputs_are_named() {
        let dir = tempfile::tempdir().unwrap();
        let params = params(dir.path());
        touch(&params.metadata.file);
        let runner = StageRunner::new(fake_qiime(TOUCH_OUTPUTS)).with_work_dir(dir.path());

        let err = run(&runner, &params).unwrap_err();
        match err.downcast_ref::<StageError>() {
            Some(StageError::MissingInputs { paths }) => assert_eq!(
                paths,
                &vec![params.rarefaction.table.clone(), params.rarefaction.tree.clone()]
            ),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dir.path().join("asv_alpha_rarefaction.qzv").exists());
    }
}
