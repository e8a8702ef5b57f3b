use std::io;
use std::path::PathBuf;

use srcstore_types::{io_message, ErrorKind};

/// Errors from debug-information extraction.
#[derive(Debug, thiserror::Error)]
pub enum DebugInfoError {
    /// The file could not be opened or mapped.
    #[error("cannot open {}: {}", path.display(), io_message(source))]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The bytes are not a recognized object file format.
    #[error("not an object image: {0}")]
    NotAnImage(String),

    /// The image parsed but carries no `.debug_info` section.
    #[error("image carries no debug information")]
    NoDebugInfo,

    /// A debug section could not be read (e.g. bad compression header).
    #[error("cannot read section {name}: {reason}")]
    Section { name: &'static str, reason: String },

    /// A line-table file entry has no compiler-recorded MD5.
    #[error("compilation unit {unit}: source file '{file}' has no recorded md5 digest")]
    MissingDigest { unit: usize, file: String },

    /// gimli rejected the debug tables.
    #[error("corrupt debug information: {0}")]
    Corrupt(#[from] gimli::Error),
}

impl DebugInfoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } | Self::NotAnImage(_) | Self::NoDebugInfo => ErrorKind::NotAnImage,
            Self::MissingDigest { .. } => ErrorKind::MissingDigest,
            Self::Section { .. } | Self::Corrupt(_) => ErrorKind::DebugInfoCorrupt,
        }
    }
}

/// Convenience alias used throughout the extractor.
pub type Result<T> = std::result::Result<T, DebugInfoError>;
