//! Ingest flows for Source Store.
//!
//! This is the only crate that combines local source I/O with the object
//! store: it reads files, digests them, commits them, and lists the sources
//! an executable references.

pub mod config;
pub mod error;
pub mod ingest;

pub use config::{default_repository_root, resolve_repository_root, StoreConfig, CONFIG_FILE};
pub use error::{IngestError, IngestResult};
pub use ingest::{add_sources, list_sources, md5sum, read_source, Ingested};
