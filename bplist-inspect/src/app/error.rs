/*!
Errors that can happen during the application's runtime
*/

use std::{
    fmt::{Display, Formatter, Result},
    io::Error as IoError,
    path::PathBuf,
};

use bplist_codec::error::bplist::BinaryPlistError;

/// Errors that can happen during the application's runtime
#[derive(Debug)]
pub enum RuntimeError {
    InvalidOptions(String),
    ReadError(IoError, PathBuf),
    DiskError(IoError),
    PlistError(BinaryPlistError),
    VerificationFailed(String),
}

impl Display for RuntimeError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            RuntimeError::InvalidOptions(why) => write!(fmt, "Invalid options!\n{why}"),
            RuntimeError::ReadError(why, path) => write!(fmt, "{why}: {path:?}"),
            RuntimeError::DiskError(why) => write!(fmt, "{why}"),
            RuntimeError::PlistError(why) => write!(fmt, "Unable to process property list: {why}"),
            RuntimeError::VerificationFailed(why) => write!(fmt, "Round trip failed: {why}"),
        }
    }
}
