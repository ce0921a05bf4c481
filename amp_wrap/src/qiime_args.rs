use crate::stage::{QiimeCommand, StageRunner};
use amp_types::PipelineParameters;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Flags shared by every subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct QiimeArgs {
    /// TOML file with stage inputs and parameters. Defaults to
    /// ampliseq.toml in the working directory when present.
    #[clap(long, value_name = "TOML")]
    pub params: Option<PathBuf>,

    /// Executable to run in place of the configured qiime program.
    /// Configured leading arguments are dropped.
    #[clap(long, value_name = "PATH")]
    pub qiime_bin: Option<String>,

    /// Log debug messages.
    #[clap(long)]
    pub verbose: bool,

    /// Print the qiime commands that would be run and exit without
    /// creating anything.
    #[clap(long)]
    pub dry: bool,
}

impl QiimeArgs {
    pub fn load_params(&self) -> Result<PipelineParameters> {
        PipelineParameters::load(self.params.as_deref())
    }

    pub fn qiime(&self, params: &PipelineParameters) -> QiimeCommand {
        let qiime = QiimeCommand::new(&params.qiime).dry_run(self.dry);
        match &self.qiime_bin {
            Some(program) => qiime.with_program(program),
            None => qiime,
        }
    }

    /// Load the parameters and build a runner writing into the working directory.
    pub fn runner(&self) -> Result<(PipelineParameters, StageRunner)> {
        let params = self.load_params()?;
        let runner = StageRunner::new(self.qiime(&params));
        Ok((params, runner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Parser, Debug)]
    struct Cmd {
        #[clap(flatten)]
        qiime: QiimeArgs,
    }

    #[test]
    fn test_qiime_bin_override() {
        let cmd = Cmd::parse_from(["ampliseq", "--qiime-bin", "/opt/q/bin/qiime", "--dry"]);
        let mut params = PipelineParameters::default();
        params.qiime.leading_args = vec!["exec".to_string()];
        let qiime = cmd.qiime.qiime(&params);
        assert!(qiime.is_dry_run());
        assert_eq!(
            qiime.display(&["info".to_string()]),
            "/opt/q/bin/qiime info"
        );

        let cmd = Cmd::parse_from(["ampliseq"]);
        assert_eq!(
            cmd.qiime.qiime(&params).display(&["info".to_string()]),
            "qiime exec info"
        );
    }

    #[test]
    fn test_explicit_params_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "[filter]\nmin_samples = 3\n")?;
        let cmd = Cmd::parse_from(["ampliseq", "--params", path.to_str().unwrap()]);
        assert_eq!(cmd.qiime.load_params()?.filter.min_samples, 3);
        Ok(())
    }
}
