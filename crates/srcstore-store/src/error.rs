use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use srcstore_types::{io_message, Digest, ErrorKind};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A system call on the repository failed.
    ///
    /// The message carries the symbolic errno name, e.g.
    /// `mkdir /x/objects: EACCES: Permission denied`.
    #[error("{op} {}: {errno}", path.display())]
    Os {
        op: &'static str,
        path: PathBuf,
        #[source]
        errno: Errno,
    },

    /// I/O error while moving object bytes.
    #[error("{op} {}: {}", path.display(), io_message(source))]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The path has no `objects/` directory.
    #[error("not a repository: {} has no objects directory", .0.display())]
    NotARepository(PathBuf),

    /// `initialize` found an existing `objects/` directory.
    #[error("repository already exists at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(Digest),

    /// Stored bytes do not hash to their address.
    #[error("hash mismatch for {id}: contents hash to {computed}")]
    HashMismatch { id: Digest, computed: Digest },

    /// Something other than a regular file sits at an object's address.
    #[error("object {0} is not a regular file")]
    NotARegularFile(Digest),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Os { .. } | Self::Io { .. } => ErrorKind::Io,
            Self::NotARepository(_) | Self::NotFound(_) => ErrorKind::Missing,
            Self::AlreadyInitialized(_) => ErrorKind::Exists,
            Self::HashMismatch { .. } | Self::NotARegularFile(_) => ErrorKind::Corrupt,
        }
    }

    pub(crate) fn os(op: &'static str, path: impl Into<PathBuf>, errno: Errno) -> Self {
        Self::Os {
            op,
            path: path.into(),
            errno,
        }
    }

    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
