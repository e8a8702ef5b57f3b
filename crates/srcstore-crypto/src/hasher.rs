use srcstore_types::Digest;

use crate::md5::Md5;

/// Content hasher used to address and verify store objects.
///
/// Unlike a general-purpose hasher there is no domain tag: the address of an
/// object must equal the digest a compiler records for the same file, so
/// the raw RFC 1321 digest of the bytes is used as-is.
pub struct ContentHasher;

impl ContentHasher {
    /// Digest of `data`.
    pub fn hash(data: &[u8]) -> Digest {
        Md5::digest(data)
    }

    /// Verify that data produces the expected digest.
    pub fn verify(data: &[u8], expected: &Digest) -> bool {
        Self::hash(data) == *expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::hash(data), ContentHasher::hash(data));
        assert_eq!(
            ContentHasher::hash(data).to_string(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn verify_correct_data() {
        let id = ContentHasher::hash(b"test data");
        assert!(ContentHasher::verify(b"test data", &id));
    }

    #[test]
    fn verify_incorrect_data() {
        let id = ContentHasher::hash(b"original");
        assert!(!ContentHasher::verify(b"tampered", &id));
    }
}
