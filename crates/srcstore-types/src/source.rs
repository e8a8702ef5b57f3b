use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// A source file named by an executable's debug information, together with
/// the digest the compiler recorded for it at build time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceReference {
    /// The filename exactly as recorded in the line table.
    pub filename: String,
    /// The compiler-asserted digest of the file's contents.
    pub digest: Digest,
}

impl SourceReference {
    pub fn new(filename: impl Into<String>, digest: Digest) -> Self {
        Self {
            filename: filename.into(),
            digest,
        }
    }
}

/// Renders the `list_source_files` line: `'<filename>', md5 value: <hex>`.
impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}', md5 value: {}", self.filename, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_listing_format() {
        let digest: Digest = "0123456789abcdef0123456789abcdef".parse().unwrap();
        let reference = SourceReference::new("src/main.c", digest);
        assert_eq!(
            reference.to_string(),
            "'src/main.c', md5 value: 0123456789abcdef0123456789abcdef"
        );
    }
}
