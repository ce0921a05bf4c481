//! ampliseq
#![deny(missing_docs)]

use amp_wrap::env::{init_logging, set_env_columns};
use amp_wrap::qiime_args::QiimeArgs;
use amp_wrap::stage::StageReport;
use amp_wrap::stages::{
    abundance, cluster, demux, denoise, diversity, filter, import, metadata, phylogeny,
    rarefaction, taxonomy,
};
use amp_wrap::utils::{failure_exit_code, print_error_chain};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

const CMD: &str = "ampliseq";

/// Run the steps of a paired-end 16S amplicon analysis with qiime
#[derive(Parser, Debug)]
#[clap(name = CMD, version)]
struct Ampliseq {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug)]
enum SubCommand {
    /// Tabulate the sample metadata as a visualization.
    #[clap(name = "metadata-tabulate")]
    MetadataTabulate(StageArgs),

    /// Rewrite the delimited sample metadata as tab-separated text.
    #[clap(name = "metadata-transform")]
    MetadataTransform(StageArgs),

    /// Build (or reuse) the FASTQ manifest and import the reads.
    #[clap(name = "import")]
    Import(ImportArgs),

    /// Demultiplex single-end reads by barcode.
    #[clap(name = "demux")]
    Demux(StageArgs),

    /// Denoise paired-end reads into ASVs with DADA2.
    #[clap(name = "denoise")]
    Denoise(StageArgs),

    /// Cluster ASVs de novo into OTUs.
    #[clap(name = "cluster")]
    Cluster(StageArgs),

    /// Summarize the clustered table and sequences.
    #[clap(name = "cluster-summary")]
    ClusterSummary(StageArgs),

    /// Drop features present in too few samples.
    #[clap(name = "filter")]
    Filter(StageArgs),

    /// Summarize the filtered ASV table.
    #[clap(name = "filter-summary")]
    FilterSummary(StageArgs),

    /// Align representative sequences and build phylogenetic trees.
    #[clap(name = "phylogeny")]
    Phylogeny(StageArgs),

    /// Core diversity metrics, significance tests and ordination plots.
    #[clap(name = "diversity")]
    Diversity(StageArgs),

    /// Alpha rarefaction curves.
    #[clap(name = "rarefaction")]
    Rarefaction(StageArgs),

    /// Classify representative sequences and plot taxa per sample.
    #[clap(name = "taxonomy")]
    Taxonomy(StageArgs),

    /// Differential abundance with ANCOM-BC.
    #[clap(name = "abundance")]
    Abundance(StageArgs),
}

#[derive(Parser, Debug, Clone)]
struct StageArgs {
    #[clap(flatten)]
    qiime: QiimeArgs,
}

#[derive(Parser, Debug, Clone)]
struct ImportArgs {
    /// Directory searched recursively for FASTQ files.
    #[clap(value_name = "INPUT_DIR")]
    input_dir: PathBuf,

    /// Manifest to write, or to reuse if it exists.
    #[clap(value_name = "MANIFEST", default_value = "manifest.tsv")]
    manifest: PathBuf,

    #[clap(flatten)]
    qiime: QiimeArgs,
}

impl SubCommand {
    fn qiime_args(&self) -> &QiimeArgs {
        use SubCommand::*;
        match self {
            Import(args) => &args.qiime,
            MetadataTabulate(args)
            | MetadataTransform(args)
            | Demux(args)
            | Denoise(args)
            | Cluster(args)
            | ClusterSummary(args)
            | Filter(args)
            | FilterSummary(args)
            | Phylogeny(args)
            | Diversity(args)
            | Rarefaction(args)
            | Taxonomy(args)
            | Abundance(args) => &args.qiime,
        }
    }
}

fn run_stage(subcmd: &SubCommand, qiime: &QiimeArgs) -> Result<Option<StageReport>> {
    let (params, runner) = qiime.runner()?;
    let report = match subcmd {
        SubCommand::MetadataTabulate(_) => metadata::tabulate(&runner, &params)?,
        SubCommand::MetadataTransform(_) => {
            if let Some(rows) = metadata::transform(&params, runner.is_dry_run())? {
                println!(
                    "Wrote {rows} rows to {}",
                    params.metadata.transform_output.display()
                );
            }
            return Ok(None);
        }
        SubCommand::Import(i) => import::run(&runner, &params.manifest, &i.input_dir, &i.manifest)?,
        SubCommand::Demux(_) => demux::run(&runner, &params)?,
        SubCommand::Denoise(_) => denoise::run(&runner, &params)?,
        SubCommand::Cluster(_) => cluster::run(&runner, &params)?,
        SubCommand::ClusterSummary(_) => cluster::summarize(&runner, &params)?,
        SubCommand::Filter(_) => filter::run(&runner, &params)?,
        SubCommand::FilterSummary(_) => filter::summarize(&runner, &params)?,
        SubCommand::Phylogeny(_) => phylogeny::run(&runner, &params)?,
        SubCommand::Diversity(_) => diversity::run(&runner, &params)?,
        SubCommand::Rarefaction(_) => rarefaction::run(&runner, &params)?,
        SubCommand::Taxonomy(_) => taxonomy::run(&runner, &params)?,
        SubCommand::Abundance(_) => abundance::run(&runner, &params)?,
    };
    // a dry run prints commands only
    Ok(if runner.is_dry_run() { None } else { Some(report) })
}

fn inner_main() -> Result<ExitCode> {
    set_env_columns();
    let opts = Ampliseq::parse();
    let qiime = opts.subcmd.qiime_args().clone();
    init_logging(qiime.verbose);

    if let Some(report) = run_stage(&opts.subcmd, &qiime)? {
        print!("{report}");
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match inner_main() {
        Ok(exit_code) => exit_code,
        Err(err) => {
            print_error_chain(&err);
            failure_exit_code(&err)
        }
    }
}
