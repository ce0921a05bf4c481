use crate::stage::StageError;
use crate::IntoExitCode;
use itertools::Itertools;
use std::process::ExitCode;

/// Convert an io::error to a string and strip "(os error 4)" from the end.
fn io_error_to_string(err: &std::io::Error) -> String {
    let s = err.to_string();
    s.strip_suffix(&format!(" (os error {})", err.raw_os_error().unwrap_or(0)))
        .unwrap_or(&s)
        .to_string()
}

/// Print an error chain.
pub fn print_error_chain(err: &anyhow::Error) {
    let error_chain = err.chain().join("\n\tCaused by: ");
    if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
        let io_err_str = io_error_to_string(io_err);
        match err.chain().len() {
            1 => println!("ERROR: {io_err_str}"),
            2 => println!("ERROR: {io_err_str}: {err}"),
            _ => println!("ERROR: {error_chain}"),
        };
    } else {
        println!("ERROR: {error_chain}");
    };
}

/// The process exit code for a failed run.
/// A `qiime` command that exited non-zero passes its own code through.
pub fn failure_exit_code(err: &anyhow::Error) -> ExitCode {
    err.chain()
        .find_map(|e| match e.downcast_ref::<StageError>() {
            Some(StageError::CommandFailed { status, .. }) => Some(status.into_exit_code()),
            _ => None,
        })
        .unwrap_or(ExitCode::FAILURE)
}
