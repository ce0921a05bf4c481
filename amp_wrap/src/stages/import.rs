//! Build or reuse the sample manifest and import the paired-end reads.

use crate::stage::{ActionInvocation, StageReport, StageRunner};
use amp_types::parameters::ManifestParams;
use amp_types::{ArtifactType, StageOutput};
use anyhow::{Context, Result};
use fastq_manifest::{ManifestBuilder, SampleManifest};
use log::{info, warn};
use std::path::{Path, PathBuf};

pub const DEMUX: &str = "demux";
const INPUT_FORMAT: &str = "PairedEndFastqManifestPhred33V2";

/// Write the manifest for `input_dir` to `manifest` unless that file exists.
/// `input_dir` is only read when a manifest is generated.
/// Returns the absolute manifest path.
pub fn prepare_manifest(
    params: &ManifestParams,
    input_dir: &Path,
    manifest: &Path,
    dry_run: bool,
) -> Result<PathBuf> {
    let manifest = std::path::absolute(manifest).with_context(|| manifest.display().to_string())?;
    if manifest.exists() {
        println!(
            "Manifest file {} already exists, skipping generation.",
            manifest.display()
        );
        match SampleManifest::read_tsv(&manifest) {
            Ok(m) => info!("reusing manifest with {} samples", m.len()),
            Err(e) => warn!("{e}"),
        }
        return Ok(manifest);
    }

    let input_dir =
        std::path::absolute(input_dir).with_context(|| input_dir.display().to_string())?;
    println!("Searching directory: {}", input_dir.display());
    let builder = ManifestBuilder::new(params)?;
    if dry_run {
        let m = builder.build(&input_dir)?;
        println!(
            "would write manifest with {} samples to {}",
            m.len(),
            manifest.display()
        );
    } else {
        builder.write_manifest(&input_dir, &manifest)?;
        println!("Manifest written to {}", manifest.display());
    }
    Ok(manifest)
}

pub fn import_invocation(manifest: &Path) -> ActionInvocation {
    let ty = ArtifactType::PairedEndSequencesWithQuality;
    ActionInvocation::new("tools", "import")
        .option("--type", ty.qiime_type())
        .option("--input-format", INPUT_FORMAT)
        .input_flag("--input-path", manifest)
        .output_flag("--output-path", StageOutput::artifact("demux", DEMUX, ty))
}

pub fn run(
    runner: &StageRunner,
    params: &ManifestParams,
    input_dir: &Path,
    manifest: &Path,
) -> Result<StageReport> {
    let manifest = prepare_manifest(params, input_dir, manifest, runner.is_dry_run())?;
    let mut report = StageReport::new("import");
    report.extend(runner.run(&import_invocation(&manifest))?);
    Ok(report)
}
