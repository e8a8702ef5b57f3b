use std::fmt;
use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid digest length: expected {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

impl TypeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

/// Classification shared by every error in the workspace.
///
/// Callers branch on the kind, never on the rendered message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Filesystem or device error reported by the operating system.
    Io,
    /// A path, object, or environment variable that must exist does not.
    Missing,
    /// A resource that must not pre-exist already does.
    Exists,
    /// The file is not an object image carrying debug information.
    NotAnImage,
    /// The debug tables are internally inconsistent.
    DebugInfoCorrupt,
    /// A source file entry carries no compiler-recorded digest.
    MissingDigest,
    /// Caller-supplied data fails a precondition.
    InvalidArgument,
    /// A stored object does not hash to its address.
    Corrupt,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Io => "io error",
            Self::Missing => "missing",
            Self::Exists => "already exists",
            Self::NotAnImage => "not an image",
            Self::DebugInfoCorrupt => "debug info corrupt",
            Self::MissingDigest => "missing digest",
            Self::InvalidArgument => "invalid argument",
            Self::Corrupt => "corrupt object",
        };
        f.write_str(name)
    }
}

/// Render an I/O error with its symbolic errno name when it carries one,
/// e.g. `ENOENT: No such file or directory`.
pub fn io_message(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => Errno::from_raw(code).to_string(),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_errors_are_invalid_arguments() {
        let err = TypeError::InvalidHex("zz".into());
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = TypeError::InvalidLength { expected: 32, actual: 4 };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("expected 32"));
    }

    #[test]
    fn io_message_names_the_errno() {
        let err = io::Error::from_raw_os_error(Errno::ENOENT as i32);
        assert_eq!(io_message(&err), "ENOENT: No such file or directory");

        let err = io::Error::new(io::ErrorKind::WriteZero, "short write");
        assert_eq!(io_message(&err), "short write");
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::Exists.to_string(), "already exists");
        assert_eq!(ErrorKind::MissingDigest.to_string(), "missing digest");
    }
}
