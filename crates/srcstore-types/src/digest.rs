use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Content address of a stored object.
///
/// A `Digest` is the 128-bit MD5 of an object's bytes. Identical content
/// always produces the same `Digest`; it is the only key the store knows.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 16]);

impl Digest {
    /// Length of the raw digest in bytes.
    pub const LEN: usize = 16;
    /// Length of the canonical hex form.
    pub const HEX_LEN: usize = 32;

    /// Wrap a pre-computed 16-byte digest.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The raw 16 bytes, byte 0 first.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Canonical 32-character lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 32-character hex string. Upper-case input is accepted.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != Self::HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: Self::HEX_LEN,
                actual: s.len(),
            });
        }
        let mut arr = [0u8; 16];
        hex::decode_to_slice(s, &mut arr).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self(arr))
    }

    /// Returns `true` if `name` is exactly the canonical form of some digest.
    ///
    /// Any other name inside `objects/` is foreign to the store.
    pub fn is_canonical_name(name: &str) -> bool {
        name.len() == Self::HEX_LEN
            && name
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 16]> for Digest {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; 16] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
