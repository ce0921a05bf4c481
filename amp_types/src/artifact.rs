//! Declared types of the artifacts exchanged between stages.
//!
//! Artifacts are opaque containers owned by `qiime`. They are identified
//! by a path and a declared semantic type, and are never opened here.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// The semantic type of an artifact, as spelled by `qiime`.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ArtifactType {
    PairedEndSequencesWithQuality,
    EmpSingleEndSequences,
    SequencesWithQuality,
    ErrorCorrectionDetails,
    FeatureTableFrequency,
    RepresentativeSequences,
    AlignedSequences,
    Dada2Stats,
    ImmutableMetadata,
    UnrootedPhylogeny,
    RootedPhylogeny,
    AlphaDiversity,
    DistanceMatrix,
    PcoaResults,
    TaxonomicClassifier,
    Taxonomy,
    DifferentialAbundance,
}

impl ArtifactType {
    /// The type expression understood by `qiime tools import --type`.
    pub fn qiime_type(self) -> &'static str {
        use ArtifactType::*;
        match self {
            PairedEndSequencesWithQuality => "SampleData[PairedEndSequencesWithQuality]",
            EmpSingleEndSequences => "EMPSingleEndSequences",
            SequencesWithQuality => "SampleData[SequencesWithQuality]",
            ErrorCorrectionDetails => "ErrorCorrectionDetails",
            FeatureTableFrequency => "FeatureTable[Frequency]",
            RepresentativeSequences => "FeatureData[Sequence]",
            AlignedSequences => "FeatureData[AlignedSequence]",
            Dada2Stats => "SampleData[DADA2Stats]",
            ImmutableMetadata => "ImmutableMetadata",
            UnrootedPhylogeny => "Phylogeny[Unrooted]",
            RootedPhylogeny => "Phylogeny[Rooted]",
            AlphaDiversity => "SampleData[AlphaDiversity]",
            DistanceMatrix => "DistanceMatrix",
            PcoaResults => "PCoAResults",
            TaxonomicClassifier => "TaxonomicClassifier",
            Taxonomy => "FeatureData[Taxonomy]",
            DifferentialAbundance => "FeatureData[DifferentialAbundance]",
        }
    }
}

impl Display for ArtifactType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.qiime_type())
    }
}

/// What a stage output is, selected by tag rather than by probing the result.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutputKind {
    /// A typed data artifact, saved as `.qza`.
    Artifact(ArtifactType),
    /// A rendered report, saved as `.qzv`.
    Visualization,
}

impl OutputKind {
    pub fn extension(self) -> &'static str {
        match self {
            OutputKind::Artifact(_) => "qza",
            OutputKind::Visualization => "qzv",
        }
    }

    /// Where an output with this kind and `file_stem` is saved inside `dir`.
    pub fn persisted_path(self, dir: &Path, file_stem: &str) -> PathBuf {
        dir.join(format!("{file_stem}.{}", self.extension()))
    }
}

/// A declared output of one external action.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct StageOutput {
    /// Output name of the action, e.g. `rooted_tree`.
    pub name: String,
    /// Filename without extension, e.g. `asv_rooted_tree`.
    pub file_stem: String,
    pub kind: OutputKind,
}

impl StageOutput {
    pub fn artifact(name: &str, file_stem: &str, artifact_type: ArtifactType) -> Self {
        StageOutput {
            name: name.to_string(),
            file_stem: file_stem.to_string(),
            kind: OutputKind::Artifact(artifact_type),
        }
    }

    pub fn visualization(name: &str, file_stem: &str) -> Self {
        StageOutput {
            name: name.to_string(),
            file_stem: file_stem.to_string(),
            kind: OutputKind::Visualization,
        }
    }

    /// The `--o-...` flag naming this output on the `qiime` command line.
    pub fn flag(&self) -> String {
        format!("--o-{}", self.name.replace('_', "-"))
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        self.kind.persisted_path(dir, &self.file_stem)
    }
}

/// An output confirmed on disk after the external action returned.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct PersistedOutput {
    pub name: String,
    pub kind: OutputKind,
    pub path: PathBuf,
}

impl Display for PersistedOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            OutputKind::Artifact(t) => {
                write!(f, "Artifact {t} saved to {}", self.path.display())
            }
            OutputKind::Visualization => {
                write!(f, "Visualization saved to {}", self.path.display())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_paths_follow_kind() {
        let tree = StageOutput::artifact(
            "rooted_tree",
            "asv_rooted_tree",
            ArtifactType::RootedPhylogeny,
        );
        let viz = StageOutput::visualization("visualization", "taxonomy_barplot");
        let dir = Path::new("core_diversity_results");

        assert_eq!(
            tree.path_in(dir),
            PathBuf::from("core_diversity_results/asv_rooted_tree.qza")
        );
        assert_eq!(
            viz.path_in(dir),
            PathBuf::from("core_diversity_results/taxonomy_barplot.qzv")
        );
    }

    #[test]
    fn test_flag_uses_dashes() {
        let out = StageOutput::artifact(
            "representative_sequences",
            "rep-seqs",
            ArtifactType::RepresentativeSequences,
        );
        assert_eq!(out.flag(), "--o-representative-sequences");
    }

    #[test]
    fn test_persisted_output_display() {
        let out = PersistedOutput {
            name: "table".to_string(),
            kind: OutputKind::Artifact(ArtifactType::FeatureTableFrequency),
            path: PathBuf::from("table.qza"),
        };
        assert_eq!(
            out.to_string(),
            "Artifact FeatureTable[Frequency] saved to table.qza"
        );
    }
}
