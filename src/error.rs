// SPDX-License-Identifier: MPL-2.0
use std::fmt;

/// Errors surfaced synchronously to callers.
///
/// The background fill loop never propagates errors across the thread
/// boundary; transient decode failures are logged and retried there. This
/// type covers the operations that run on the caller's own thread, chiefly
/// opening and seeking a source.
#[derive(Debug, Clone)]
pub enum Error {
    Io(String),
    Source(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O Error: {}", e),
            Error::Source(e) => write!(f, "Source Error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
