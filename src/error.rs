//! Command-line error handling.

use derive_more::{Display, Error};
use std::path::PathBuf;
use std::process::ExitCode;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("update failed")]
    Update,
    #[display("could not clear the cache")]
    Clean,
    #[display("lookup failed")]
    Query,
    #[display("could not write {}", _0.display())]
    Output(#[error(not(source))] PathBuf),
    #[display("could not encode output")]
    Encode,
    /// The command ran but found problems worth a non-zero exit.
    #[display("{_0}")]
    Unhealthy(#[error(not(source))] String),
}

/// Print the full error tree and pick an exit code.
pub fn report(err: &Error) -> ExitCode {
    eprintln!("Error: {err:?}");
    match &**err {
        ErrorKind::Unhealthy(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
