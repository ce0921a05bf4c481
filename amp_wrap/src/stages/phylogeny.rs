use crate::stage::{require_inputs, ActionInvocation, StageReport, StageRunner};
use amp_types::{ArtifactType, PipelineParameters, StageOutput};
use anyhow::Result;

pub const ALIGNMENT: &str = "asv_aligned_rep_seqs";
pub const MASKED_ALIGNMENT: &str = "asv_masked_aligned_rep_seqs";
pub const UNROOTED_TREE: &str = "asv_unrooted_tree";
pub const ROOTED_TREE: &str = "asv_rooted_tree";

/// Align the representative sequences and build rooted and unrooted trees.
pub fn run(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let rep_seqs = &params.phylogeny.rep_seqs;
    require_inputs([rep_seqs.as_path()])?;

    let inv = ActionInvocation::new("phylogeny", "align-to-tree-mafft-fasttree")
        .input("sequences", rep_seqs)
        .output(StageOutput::artifact(
            "alignment",
            ALIGNMENT,
            ArtifactType::AlignedSequences,
        ))
        .output(StageOutput::artifact(
            "masked_alignment",
            MASKED_ALIGNMENT,
            ArtifactType::AlignedSequences,
        ))
        .output(StageOutput::artifact(
            "tree",
            UNROOTED_TREE,
            ArtifactType::UnrootedPhylogeny,
        ))
        .output(StageOutput::artifact(
            "rooted_tree",
            ROOTED_TREE,
            ArtifactType::RootedPhylogeny,
        ));

    let mut report = StageReport::new("phylogeny");
    report.extend(runner.run(&inv)?);
    Ok(report)
}
