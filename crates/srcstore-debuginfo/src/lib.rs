//! Source file discovery from DWARF debug information.
//!
//! Given an executable built with DWARF 5 line tables, [`extract`] walks every
//! compilation unit and yields one [`SourceReference`] per file-table entry:
//! the file name as recorded and the MD5 digest the compiler stored for it
//! (clang emits these with `-gdwarf-5`).
//!
//! Parsing is done by `object` and `gimli`; the image is memory-mapped
//! read-only and every borrowed view is released when [`extract`] returns.

pub mod error;
pub mod extract;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{DebugInfoError, Result};
pub use extract::{extract, extract_from_bytes};
pub use srcstore_types::SourceReference;
