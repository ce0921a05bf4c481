use crate::stage::{require_inputs, ActionInvocation, StageReport, StageRunner};
use amp_types::{ArtifactType, PipelineParameters, StageOutput};
use anyhow::Result;

pub const TABLE: &str = "table";
pub const REP_SEQS: &str = "rep-seqs";
pub const DENOISING_STATS: &str = "denoising-stats";

/// Denoise paired-end reads into an ASV table with DADA2.
pub fn run(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let d = &params.denoise;
    require_inputs([d.demux.as_path()])?;

    let inv = ActionInvocation::new("dada2", "denoise-paired")
        .input("demultiplexed_seqs", &d.demux)
        .param("trim_left_f", d.trim_left_f)
        .param("trunc_len_f", d.trunc_len_f)
        .param("trim_left_r", d.trim_left_r)
        .param("trunc_len_r", d.trunc_len_r)
        .param("n_threads", d.n_threads)
        .output(StageOutput::artifact(
            "table",
            TABLE,
            ArtifactType::FeatureTableFrequency,
        ))
        .output(StageOutput::artifact(
            "representative_sequences",
            REP_SEQS,
            ArtifactType::RepresentativeSequences,
        ))
        .output(StageOutput::artifact(
            "denoising_stats",
            DENOISING_STATS,
            ArtifactType::Dada2Stats,
        ));

    let mut report = StageReport::new("denoise");
    report.extend(runner.run(&inv)?);
    Ok(report)
}
