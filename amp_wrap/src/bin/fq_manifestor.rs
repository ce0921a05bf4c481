//! fq_manifestor
#![deny(missing_docs)]

use amp_wrap::env::{init_logging, set_env_columns};
use amp_wrap::qiime_args::QiimeArgs;
use amp_wrap::stages::import;
use amp_wrap::utils::{failure_exit_code, print_error_chain};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Write a paired-end FASTQ manifest for a directory of reads, then import
/// the reads with qiime. An existing manifest is reused.
#[derive(Parser, Debug)]
#[clap(name = "fq_manifestor", version)]
struct FqManifestor {
    /// Directory searched recursively for FASTQ files.
    #[clap(value_name = "INPUT_DIR")]
    input_dir: PathBuf,

    /// Manifest to write.
    #[clap(value_name = "MANIFEST")]
    manifest: PathBuf,

    #[clap(flatten)]
    qiime: QiimeArgs,
}

fn inner_main() -> Result<ExitCode> {
    set_env_columns();
    let opts = FqManifestor::parse();
    init_logging(opts.qiime.verbose);

    let (params, runner) = opts.qiime.runner()?;
    let report = import::run(&runner, &params.manifest, &opts.input_dir, &opts.manifest)?;
    if !runner.is_dry_run() {
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
