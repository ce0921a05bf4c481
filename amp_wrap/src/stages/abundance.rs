//! Differential abundance with ANCOM-BC.
//!
//! The full feature table is tested against the main formula first. The
//! table is then collapsed to one taxonomic level and each configured
//! contrast is tested on the collapsed table.

use crate::stage::{require_inputs, ActionInvocation, StageReport, StageRunner};
use crate::stages::require_metadata_columns;
use amp_types::parameters::AncombcContrast;
use amp_types::{ArtifactType, PipelineParameters, StageOutput};
use anyhow::Result;
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::path::Path;

pub const ANCOMBC_RESULTS: &str = "ancombc_results";
pub const ANCOMBC_BARPLOT: &str = "ancombc_barplot";
pub const COLLAPSED_TABLE: &str = "table_genus";

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"[A-Za-z_.][A-Za-z0-9_.]*").unwrap();
}

/// Metadata columns named by a model formula such as `disease_state + Horse`.
pub fn formula_columns(formula: &str) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for m in IDENTIFIER.find_iter(formula) {
        if !columns.iter().any(|c| c == m.as_str()) {
            columns.push(m.as_str().to_string());
        }
    }
    columns
}

/// The column of a `column::level` reference, e.g. `disease_state::healthy`.
fn reference_column(reference: &str) -> &str {
    reference.split("::").next().unwrap_or(reference)
}

/// Every metadata column the stage will name, main formula first.
fn required_columns(params: &PipelineParameters) -> Vec<String> {
    let a = &params.abundance;
    let mut columns = formula_columns(&a.formula);
    for contrast in &a.contrasts {
        let named = formula_columns(&contrast.formula).into_iter().chain(
            contrast
                .reference_levels
                .iter()
                .map(|r| reference_column(r).to_string()),
        );
        for c in named {
            if !columns.contains(&c) {
                columns.push(c);
            }
        }
    }
    columns
}

/// The differentials of a contrast are saved next to its bar plot.
fn differentials_stem(output_stem: &str) -> String {
    let base = output_stem.strip_suffix("_barplot").unwrap_or(output_stem);
    format!("{base}_differentials")
}

fn ancombc(
    table: impl Into<std::path::PathBuf>,
    metadata: &Path,
    formula: &str,
    reference_levels: &[String],
    file_stem: &str,
) -> ActionInvocation {
    let mut inv = ActionInvocation::new("composition", "ancombc")
        .input("table", table)
        .param("formula", formula);
    if !reference_levels.is_empty() {
        inv = inv.param("reference_levels", reference_levels.to_vec());
    }
    inv.metadata("metadata", metadata).output(StageOutput::artifact(
        "differentials",
        file_stem,
        ArtifactType::DifferentialAbundance,
    ))
}

fn da_barplot(
    differentials: impl Into<std::path::PathBuf>,
    threshold: f64,
    file_stem: &str,
) -> ActionInvocation {
    ActionInvocation::new("composition", "da-barplot")
        .input("data", differentials)
        .param("significance_threshold", threshold)
        .output(StageOutput::visualization("visualization", file_stem))
}

fn run_contrast(
    runner: &StageRunner,
    params: &PipelineParameters,
    collapsed: &Path,
    contrast: &AncombcContrast,
    report: &mut StageReport,
) -> Result<()> {
    let a = &params.abundance;
    info!("running ANCOM-BC on {} for '{}'", COLLAPSED_TABLE, contrast.formula);
    let test = ancombc(
        collapsed,
        &params.metadata.file,
        &contrast.formula,
        &contrast.reference_levels,
        &differentials_stem(&contrast.output_stem),
    );
    report.extend(runner.run(&test)?);

    let plot = da_barplot(
        runner.output_path(&test, "differentials"),
        a.collapsed_significance_threshold,
        &contrast.output_stem,
    );
    report.extend(runner.run(&plot)?);
    Ok(())
}

pub fn run(runner: &StageRunner, params: &PipelineParameters) -> Result<StageReport> {
    let a = &params.abundance;
    let metadata = &params.metadata.file;
    require_inputs([a.table.as_path(), a.taxonomy.as_path(), metadata.as_path()])?;
    require_metadata_columns(metadata, &required_columns(params))?;

    let mut report = StageReport::new("abundance");

    info!("running ANCOM-BC on {} for '{}'", a.table.display(), a.formula);
    let test = ancombc(&a.table, metadata, &a.formula, &[], ANCOMBC_RESULTS);
    report.extend(runner.run(&test)?);
    let plot = da_barplot(
        runner.output_path(&test, "differentials"),
        a.significance_threshold,
        ANCOMBC_BARPLOT,
    );
    report.extend(runner.run(&plot)?);

    let collapse = ActionInvocation::new("taxa", "collapse")
        .input("table", &a.table)
        .input("taxonomy", &a.taxonomy)
        .param("level", a.collapse_level)
        .output(StageOutput::artifact(
            "collapsed_table",
            COLLAPSED_TABLE,
            ArtifactType::FeatureTableFrequency,
        ));
    report.extend(runner.run(&collapse)?);
    let collapsed = runner.output_path(&collapse, "collapsed_table");

    for contrast in &a.contrasts {
        run_contrast(runner, params, &collapsed, contrast, &mut report)?;
    }
    Ok(report)
}
