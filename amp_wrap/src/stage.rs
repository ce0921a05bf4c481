//! Invoke one `qiime` action per pipeline step and confirm what it saved.
//!
//! An [`ActionInvocation`] declares the inputs, parameters, metadata and
//! outputs of one action. [`StageRunner::run`] checks the inputs and
//! metadata columns, runs the command, and returns the outputs found on
//! disk afterwards.

use amp_types::metadata::{MetadataError, MetadataTable};
use amp_types::parameters::QiimeParams;
use amp_types::{PersistedOutput, StageOutput};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::Serialize;
use shell_escape::escape;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(
        "Missing input file(s): {}",
        .paths.iter().map(|p| p.display().to_string()).join(", ")
    )]
    MissingInputs { paths: Vec<PathBuf> },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Failed to run `{command}`")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` failed with {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("{name} was not saved to {}", .path.display())]
    OutputNotPersisted { name: String, path: PathBuf },

    #[error("Could not create output directory {}", .path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Whether a failed step ends the stage or is logged and skipped.
#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum FailurePolicy {
    Abort,
    Continue,
}

/// A `--p-*` parameter value.
#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    /// Rendered as `--p-<name>` or `--p-no-<name>`.
    Bool(bool),
    List(Vec<String>),
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::List(v)
    }
}

#[derive(Serialize, Clone, Debug)]
struct LiteralOption {
    flag: String,
    value: String,
}

#[derive(Serialize, Clone, Debug)]
struct InputArg {
    flag: String,
    path: PathBuf,
}

#[derive(Serialize, Clone, Debug)]
struct MetadataArg {
    name: String,
    file: PathBuf,
    column: Option<String>,
    /// Columns that must exist in `file`; includes `column`.
    required: Vec<String>,
}

#[derive(Serialize, Clone, Debug)]
struct OutputArg {
    flag: String,
    output: StageOutput,
}

/// One external action with everything it is called with.
#[derive(Serialize, Clone, Debug)]
pub struct ActionInvocation {
    plugin: String,
    action: String,
    options: Vec<LiteralOption>,
    inputs: Vec<InputArg>,
    params: Vec<(String, ParamValue)>,
    metadata: Vec<MetadataArg>,
    outputs: Vec<OutputArg>,
    output_dir: PathBuf,
}

fn dashed(name: &str) -> String {
    name.replace('_', "-")
}

impl ActionInvocation {
    pub fn new(plugin: &str, action: &str) -> Self {
        ActionInvocation {
            plugin: plugin.to_string(),
            action: action.to_string(),
            options: Vec::new(),
            inputs: Vec::new(),
            params: Vec::new(),
            metadata: Vec::new(),
            outputs: Vec::new(),
            output_dir: PathBuf::new(),
        }
    }

    /// `plugin action`, as shown in progress messages.
    pub fn name(&self) -> String {
        format!("{} {}", self.plugin, self.action)
    }

    /// An artifact passed as `--i-<name>`.
    pub fn input(self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.input_flag(&format!("--i-{}", dashed(name)), path)
    }

    /// An input file passed under an arbitrary flag.
    pub fn input_flag(mut self, flag: &str, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(InputArg {
            flag: flag.to_string(),
            path: path.into(),
        });
        self
    }

    /// A literal `--<flag> <value>` pair.
    pub fn option(mut self, flag: &str, value: &str) -> Self {
        self.options.push(LiteralOption {
            flag: flag.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }

    /// A whole metadata file passed as `--m-<name>-file`.
    pub fn metadata(self, name: &str, file: impl Into<PathBuf>) -> Self {
        self.metadata_requiring(name, file, &[] as &[String])
    }

    /// A metadata file whose named columns must exist.
    pub fn metadata_requiring<S: AsRef<str>>(
        mut self,
        name: &str,
        file: impl Into<PathBuf>,
        columns: &[S],
    ) -> Self {
        self.metadata.push(MetadataArg {
            name: name.to_string(),
            file: file.into(),
            column: None,
            required: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        });
        self
    }

    /// A single metadata column passed as `--m-<name>-file` and `--m-<name>-column`.
    pub fn metadata_column(mut self, name: &str, file: impl Into<PathBuf>, column: &str) -> Self {
        self.metadata.push(MetadataArg {
            name: name.to_string(),
            file: file.into(),
            column: Some(column.to_string()),
            required: vec![column.to_string()],
        });
        self
    }

    pub fn output(mut self, output: StageOutput) -> Self {
        self.outputs.push(OutputArg {
            flag: output.flag(),
            output,
        });
        self
    }

    /// An output saved under an arbitrary flag.
    pub fn output_flag(mut self, flag: &str, output: StageOutput) -> Self {
        self.outputs.push(OutputArg {
            flag: flag.to_string(),
            output,
        });
        self
    }

    /// Save outputs into `dir`, relative to the runner's working directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Every file the action reads.
    pub fn input_paths(&self) -> impl Iterator<Item = &Path> {
        self.inputs
            .iter()
            .map(|i| i.path.as_path())
            .chain(self.metadata.iter().map(|m| m.file.as_path()))
    }

    /// The command line after the program name, with outputs under `work_dir`.
    pub fn args(&self, work_dir: &Path) -> Vec<String> {
        let mut args = vec![self.plugin.clone(), self.action.clone()];
        for opt in &self.options {
            args.extend([opt.flag.clone(), opt.value.clone()]);
        }
        for input in &self.inputs {
            args.extend([input.flag.clone(), input.path.display().to_string()]);
        }
        for (name, value) in &self.params {
            let name = dashed(name);
            match value {
                ParamValue::Bool(true) => args.push(format!("--p-{name}")),
                ParamValue::Bool(false) => args.push(format!("--p-no-{name}")),
                ParamValue::Int(v) => args.extend([format!("--p-{name}"), v.to_string()]),
                ParamValue::Float(v) => args.extend([format!("--p-{name}"), v.to_string()]),
                ParamValue::Str(v) => args.extend([format!("--p-{name}"), v.clone()]),
                ParamValue::List(vs) => {
                    args.push(format!("--p-{name}"));
                    args.extend(vs.iter().cloned());
                }
            }
        }
        for m in &self.metadata {
            let name = dashed(&m.name);
            args.extend([format!("--m-{name}-file"), m.file.display().to_string()]);
            if let Some(column) = &m.column {
                args.extend([format!("--m-{name}-column"), column.clone()]);
            }
        }
        let dir = work_dir.join(&self.output_dir);
        for out in &self.outputs {
            args.extend([
                out.flag.clone(),
                out.output.path_in(&dir).display().to_string(),
            ]);
        }
        args
    }

    /// Where the output called `name` is saved.
    pub fn output_path(&self, work_dir: &Path, name: &str) -> Option<PathBuf> {
        self.outputs
            .iter()
            .find(|o| o.output.name == name)
            .map(|o| o.output.path_in(&work_dir.join(&self.output_dir)))
    }
}

/// The executable standing in for `qiime`, and whether to run it at all.
#[derive(Serialize, Clone, Debug)]
pub struct QiimeCommand {
    program: String,
    leading_args: Vec<String>,
    dry_run: bool,
}

impl QiimeCommand {
    pub fn new(params: &QiimeParams) -> Self {
        QiimeCommand {
            program: params.program.clone(),
            leading_args: params.leading_args.clone(),
            dry_run: false,
        }
    }

    /// Replace the program; its leading arguments are dropped too.
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self.leading_args.clear();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// The full command, quoted for a shell.
    pub fn display(&self, args: &[String]) -> String {
        std::iter::once(&self.program)
            .chain(&self.leading_args)
            .chain(args)
            .map(|a| escape(a.as_str().into()))
            .join(" ")
    }

    /// Run to completion with inherited stdio.
    pub fn run(&self, args: &[String]) -> Result<(), StageError> {
        let command = self.display(args);
        if self.dry_run {
            println!("{command}");
            return Ok(());
        }
        info!("running {command}");
        let status = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .status()
            .map_err(|source| StageError::Launch {
                command: command.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(StageError::CommandFailed { command, status })
        }
    }
}

/// Fail unless every path exists.
pub fn require_inputs<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<(), StageError> {
    let missing: Vec<PathBuf> = paths
        .into_iter()
        .filter(|p| !p.exists())
        .map(Path::to_path_buf)
        .unique()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StageError::MissingInputs { paths: missing })
    }
}

/// Runs actions with one `qiime` command, saving outputs under `work_dir`.
pub struct StageRunner {
    qiime: QiimeCommand,
    work_dir: PathBuf,
}

impl StageRunner {
    pub fn new(qiime: QiimeCommand) -> Self {
        StageRunner {
            qiime,
            work_dir: PathBuf::from("."),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn qiime(&self) -> &QiimeCommand {
        &self.qiime
    }

    pub fn is_dry_run(&self) -> bool {
        self.qiime.is_dry_run()
    }

    /// Where `inv` saves the output called `name`.
    /// Panics if `inv` declares no such output.
    pub fn output_path(&self, inv: &ActionInvocation, name: &str) -> PathBuf {
        inv.output_path(&self.work_dir, name)
            .unwrap_or_else(|| panic!("{} declares no output {name}", inv.name()))
    }

    /// Run `inv` and return its outputs as found on disk.
    ///
    /// In a dry run the command is only printed and nothing is returned.
    /// Inputs are not checked then, since earlier actions of the stage
    /// have not written them.
    pub fn run(&self, inv: &ActionInvocation) -> Result<Vec<PersistedOutput>, StageError> {
        debug!(
            "{}",
            serde_json::to_string(inv).unwrap_or_else(|_| inv.name())
        );
        if !self.is_dry_run() {
            require_inputs(inv.input_paths())?;
            for m in inv.metadata.iter().filter(|m| !m.required.is_empty()) {
                MetadataTable::load(&m.file)?.require_columns(&m.required[..])?;
            }
        }

        let out_dir = self.work_dir.join(&inv.output_dir);
        if !self.is_dry_run() {
            std::fs::create_dir_all(&out_dir).map_err(|source| StageError::OutputDir {
                path: out_dir.clone(),
                source,
            })?;
        }

        self.qiime.run(&inv.args(&self.work_dir))?;
        if self.is_dry_run() {
            return Ok(Vec::new());
        }

        let mut persisted = Vec::with_capacity(inv.outputs.len());
        for out in &inv.outputs {
            let path = out.output.path_in(&out_dir);
            if !path.is_file() {
                return Err(StageError::OutputNotPersisted {
                    name: out.output.name.clone(),
                    path,
                });
            }
            let p = PersistedOutput {
                name: out.output.name.clone(),
                kind: out.output.kind,
                path,
            };
            info!("{p}");
            persisted.push(p);
        }
        Ok(persisted)
    }

    /// Run `inv`; under [`FailurePolicy::Continue`] a failure is logged and
    /// `None` returned instead.
    pub fn run_with_policy(
        &self,
        inv: &ActionInvocation,
        policy: FailurePolicy,
    ) -> Result<Option<Vec<PersistedOutput>>, StageError> {
        match (self.run(inv), policy) {
            (Ok(outputs), _) => Ok(Some(outputs)),
            (Err(err), FailurePolicy::Continue) => {
                warn!("{} failed, continuing: {err}", inv.name());
                Ok(None)
            }
            (Err(err), FailurePolicy::Abort) => Err(err),
        }
    }
}

/// What one stage saved, plus the steps it skipped after a failure.
#[derive(Serialize, Clone, Debug, Default)]
pub struct StageReport {
    pub stage: String,
    pub outputs: Vec<PersistedOutput>,
    pub failed_steps: Vec<String>,
}

impl StageReport {
    pub fn new(stage: &str) -> Self {
        StageReport {
            stage: stage.to_string(),
            ..StageReport::default()
        }
    }

    pub fn extend(&mut self, outputs: Vec<PersistedOutput>) {
        self.outputs.extend(outputs);
    }

    /// Record a step run under [`FailurePolicy::Continue`].
    pub fn record(&mut self, step: &ActionInvocation, result: Option<Vec<PersistedOutput>>) {
        match result {
            Some(outputs) => self.extend(outputs),
            None => self.failed_steps.push(step.name()),
        }
    }
}

impl Display for StageReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} finished, {} output(s) saved", self.stage, self.outputs.len())?;
        for out in &self.outputs {
            writeln!(f, "  {out}")?;
        }
        for step in &self.failed_steps {
            writeln!(f, "  {step} failed and was skipped")?;
        }
        Ok(())
    }
}
