use std::io;
use std::path::PathBuf;

use srcstore_types::{io_message, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("can not detect default repository root: XDG_CACHE_HOME and HOME environment variables are not set")]
    NoDefaultRoot,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("cannot read {}: {}", path.display(), io_message(source))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write output: {}", io_message(.0))]
    Output(#[source] io::Error),

    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Store(#[from] srcstore_store::StoreError),

    #[error("{}: {source}", path.display())]
    DebugInfo {
        path: PathBuf,
        #[source]
        source: srcstore_debuginfo::DebugInfoError,
    },
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDefaultRoot => ErrorKind::Missing,
            Self::InvalidArgument(_) | Self::Config { .. } => ErrorKind::InvalidArgument,
            Self::Read { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorKind::Missing
            }
            Self::Read { .. } | Self::Output(_) => ErrorKind::Io,
            Self::Store(e) => e.kind(),
            Self::DebugInfo { source, .. } => source.kind(),
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
