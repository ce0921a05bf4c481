//! Literal inputs and numeric parameters of every pipeline stage.
//!
//! Values are read from `ampliseq.toml` (or a file named on the command line).
//! Every field has a default, so a parameters file only lists what it changes.

use anyhow::{ensure, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no file is named explicitly.
pub const PARAMETERS_FILENAME: &str = "ampliseq.toml";

const METADATA: &str = "../Data/metadata_for_q.csv";
const STEP2_DEMUX: &str = "../Step2_ImportingData/demux.qza";
const STEP4_DIR: &str = "../Step4_QCFeatureTableConstruction";
const STEP6_TABLE: &str = "../Step6_Decontamination/filtered-table.qza";

/// What to do when two files claim the same read slot of one sample.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Abort the build, naming the sample and both files.
    #[default]
    Error,
    /// Keep the file seen last.
    LastWins,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct QiimeParams {
    /// Executable invoked for every external action.
    pub program: String,
    /// Arguments placed before the action, e.g. for a container wrapper.
    pub leading_args: Vec<String>,
}

impl Default for QiimeParams {
    fn default() -> Self {
        QiimeParams {
            program: "qiime".to_string(),
            leading_args: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestParams {
    /// Filename suffixes of read files, without the leading dot.
    pub extensions: Vec<String>,
    /// Regex splitting a filename; the first field is the sample id.
    pub split_pattern: String,
    pub forward_pattern: String,
    pub reverse_pattern: String,
    /// Keep only files whose full path contains this substring.
    pub filter: Option<String>,
    pub duplicates: DuplicatePolicy,
}

impl Default for ManifestParams {
    fn default() -> Self {
        ManifestParams {
            extensions: vec!["fastq.gz".to_string(), "fq.gz".to_string()],
            split_pattern: "_".to_string(),
            forward_pattern: "_1.".to_string(),
            reverse_pattern: "_2.".to_string(),
            filter: None,
            duplicates: DuplicatePolicy::Error,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataParams {
    /// Sample metadata used by every stage that takes metadata.
    pub file: PathBuf,
    /// Tab-separated copy, used by demultiplexing.
    pub tsv: PathBuf,
    pub transform_input: PathBuf,
    pub transform_output: PathBuf,
    pub transform_delimiter: char,
}

impl Default for MetadataParams {
    fn default() -> Self {
        MetadataParams {
            file: METADATA.into(),
            tsv: "../Data/metadata.tsv".into(),
            transform_input: "Data/metadata_for_q.csv".into(),
            transform_output: "Data/metadata.tsv".into(),
            transform_delimiter: ';',
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct DemuxParams {
    pub seqs: PathBuf,
    pub barcode_column: String,
}

impl Default for DemuxParams {
    fn default() -> Self {
        DemuxParams {
            seqs: STEP2_DEMUX.into(),
            barcode_column: "barcode-sequence".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct DenoiseParams {
    pub demux: PathBuf,
    pub trim_left_f: u32,
    pub trunc_len_f: u32,
    pub trim_left_r: u32,
    pub trunc_len_r: u32,
    /// 0 lets the toolkit use every available core.
    pub n_threads: u32,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        DenoiseParams {
            demux: STEP2_DEMUX.into(),
            trim_left_f: 15,
            trunc_len_f: 280,
            trim_left_r: 0,
            trunc_len_r: 240,
            n_threads: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterParams {
    pub table: PathBuf,
    pub rep_seqs: PathBuf,
    pub perc_identity: f64,
    pub strand: String,
    pub threads: u32,
}

impl Default for ClusterParams {
    fn default() -> Self {
        ClusterParams {
            table: "table.qza".into(),
            rep_seqs: "rep-seqs.qza".into(),
            perc_identity: 0.97,
            strand: "plus".to_string(),
            threads: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSummaryParams {
    pub table: PathBuf,
    pub rep_seqs: PathBuf,
}

impl Default for ClusterSummaryParams {
    fn default() -> Self {
        ClusterSummaryParams {
            table: "table-dn-97.qza".into(),
            rep_seqs: "rep-seqs-dn-97.qza".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct FilterParams {
    pub asv_table: PathBuf,
    pub otu_table: PathBuf,
    /// Keep features present in at least this many samples.
    pub min_samples: u32,
}

impl Default for FilterParams {
    fn default() -> Self {
        FilterParams {
            asv_table: Path::new(STEP4_DIR).join("table.qza"),
            otu_table: Path::new(STEP4_DIR).join("table-dn-97.qza"),
            min_samples: 2,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSummaryParams {
    pub table: PathBuf,
}

impl Default for FilterSummaryParams {
    fn default() -> Self {
        FilterSummaryParams {
            table: "asv_table-filtered.qza".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct PhylogenyParams {
    pub rep_seqs: PathBuf,
}

impl Default for PhylogenyParams {
    fn default() -> Self {
        PhylogenyParams {
            rep_seqs: "../Step6_Decontamination/filtered-rep-seqs.qza".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct DiversityParams {
    pub tree: PathBuf,
    pub table: PathBuf,
    /// Rarefaction depth chosen from the table summary.
    pub sampling_depth: u32,
    pub output_dir: PathBuf,
    /// Categorical columns tested with PERMANOVA.
    pub beta_columns: Vec<String>,
    pub pairwise: bool,
}

impl Default for DiversityParams {
    fn default() -> Self {
        DiversityParams {
            tree: "asv_rooted_tree.qza".into(),
            table: STEP6_TABLE.into(),
            sampling_depth: 9000,
            output_dir: "core_diversity_results".into(),
            beta_columns: vec!["disease_state".to_string(), "Horse".to_string()],
            pairwise: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct RarefactionParams {
    pub table: PathBuf,
    pub tree: PathBuf,
    pub max_depth: u32,
}

impl Default for RarefactionParams {
    fn default() -> Self {
        RarefactionParams {
            table: STEP6_TABLE.into(),
            tree: "../Step7_PhylogeneticTree/asv_rooted_tree.qza".into(),
            max_depth: 13000,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct TaxonomyParams {
    pub reads: PathBuf,
    pub table: PathBuf,
    pub classifier: PathBuf,
    /// Where the classifier can be fetched from; only shown in error messages.
    pub classifier_url: String,
}

impl Default for TaxonomyParams {
    fn default() -> Self {
        TaxonomyParams {
            reads: Path::new(STEP4_DIR).join("rep-seqs.qza"),
            table: STEP6_TABLE.into(),
            classifier: "2024.09.backbone.v4.nb.sklearn-1.4.2.qza".into(),
            classifier_url: "https://data.qiime2.org/classifiers/sklearn-1.4.2/greengenes2/\
                             2024.09.backbone.v4.nb.sklearn-1.4.2.qza"
                .to_string(),
        }
    }
}

/// One ANCOM-BC test on the genus-collapsed table.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct AncombcContrast {
    pub formula: String,
    #[serde(default)]
    pub reference_levels: Vec<String>,
    /// Filename of the bar plot, without extension.
    pub output_stem: String,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct AbundanceParams {
    pub table: PathBuf,
    pub taxonomy: PathBuf,
    pub formula: String,
    pub significance_threshold: f64,
    /// Taxonomic level of the collapsed table; 6 is genus.
    pub collapse_level: u32,
    pub collapsed_significance_threshold: f64,
    pub contrasts: Vec<AncombcContrast>,
}

impl Default for AbundanceParams {
    fn default() -> Self {
        AbundanceParams {
            table: STEP6_TABLE.into(),
            taxonomy: "../Step9_TaxonomicAnalysis/taxonomy.qza".into(),
            formula: "disease_state".to_string(),
            significance_threshold: 0.001,
            collapse_level: 6,
            collapsed_significance_threshold: 0.05,
            contrasts: vec![
                AncombcContrast {
                    formula: "disease_state".to_string(),
                    reference_levels: vec!["disease_state::healthy".to_string()],
                    output_stem: "ancombc_disease_barplot".to_string(),
                },
                AncombcContrast {
                    formula: "Type".to_string(),
                    reference_levels: Vec::new(),
                    output_stem: "ancombc_tooth_barplot".to_string(),
                },
            ],
        }
    }
}

/// Parameters of the whole pipeline, one section per stage.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineParameters {
    pub qiime: QiimeParams,
    pub manifest: ManifestParams,
    pub metadata: MetadataParams,
    pub demux: DemuxParams,
    pub denoise: DenoiseParams,
    pub cluster: ClusterParams,
    pub cluster_summary: ClusterSummaryParams,
    pub filter: FilterParams,
    pub filter_summary: FilterSummaryParams,
    pub phylogeny: PhylogenyParams,
    pub diversity: DiversityParams,
    pub rarefaction: RarefactionParams,
    pub taxonomy: TaxonomyParams,
    pub abundance: AbundanceParams,
}

impl PipelineParameters {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let params: PipelineParameters = toml::from_str(s)?;
        params.validate()?;
        Ok(params)
    }

    /// Load the parameters file named by `path`, else `ampliseq.toml` in the
    /// working directory, else fall back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => {
                let p = Path::new(PARAMETERS_FILENAME);
                if !p.exists() {
                    warn!("could not find {PARAMETERS_FILENAME}, falling back to defaults");
                    return Ok(PipelineParameters::default());
                }
                p
            }
        };
        let s = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
        let params = Self::from_toml_str(&s).with_context(|| path.display().to_string())?;
        info!("loaded parameters from {}", path.display());
        params.warn_non_default();
        Ok(params)
    }

    /// The metadata transform delimiter as a byte.
    pub fn transform_delimiter(&self) -> u8 {
        // ASCII is enforced by validate()
        self.metadata.transform_delimiter as u8
    }

    fn warn_non_default(&self) {
        let defaults = PipelineParameters::default();
        macro_rules! check_section {
            ($params:expr, $defaults:expr; $($section:ident),*) => {
                $(
                    if $params.$section != $defaults.$section {
                        warn!("using non-default {} = {:?}", stringify!($section), $params.$section);
                    }
                )*
            };
        }
        check_section!(
            self,
            defaults;
            qiime,
            manifest,
            metadata,
            demux,
            denoise,
            cluster,
            cluster_summary,
            filter,
            filter_summary,
            phylogeny,
            diversity,
            rarefaction,
            taxonomy,
            abundance
        );
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.qiime.program.is_empty(), "qiime.program must not be empty");
        ensure!(
            !self.manifest.extensions.is_empty(),
            "manifest.extensions must list at least one suffix"
        );
        ensure!(
            self.metadata.transform_delimiter.is_ascii(),
            "metadata.transform_delimiter must be a single ASCII character"
        );

        let d = &self.denoise;
        for (side, trim, trunc) in [
            ("forward", d.trim_left_f, d.trunc_len_f),
            ("reverse", d.trim_left_r, d.trunc_len_r),
        ] {
            ensure!(
                trunc == 0 || trim < trunc,
                "denoise: {side} trim length {trim} must be smaller than the truncation length {trunc}"
            );
        }

        ensure!(
            self.cluster.perc_identity > 0.0 && self.cluster.perc_identity <= 1.0,
            "cluster.perc_identity must be in (0, 1], got {}",
            self.cluster.perc_identity
        );
        ensure!(
            matches!(self.cluster.strand.as_str(), "plus" | "both"),
            "cluster.strand must be 'plus' or 'both', got '{}'",
            self.cluster.strand
        );
        ensure!(self.diversity.sampling_depth > 0, "diversity.sampling_depth must be positive");
        ensure!(self.rarefaction.max_depth > 0, "rarefaction.max_depth must be positive");

        let a = &self.abundance;
        for (name, value) in [
            ("significance_threshold", a.significance_threshold),
            ("collapsed_significance_threshold", a.collapsed_significance_threshold),
        ] {
            ensure!(
                value > 0.0 && value < 1.0,
                "abundance.{name} must be in (0, 1), got {value}"
            );
        }
        ensure!(
            (1..=7).contains(&a.collapse_level),
            "abundance.collapse_level must be between 1 and 7, got {}",
            a.collapse_level
        );
        Ok(())
    }
}
