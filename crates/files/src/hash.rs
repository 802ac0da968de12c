//! Content digests used to detect duplicate uploads.

use crate::FilesError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// SHA-256 digest of an upload, held as 64 lowercase hex characters.
///
/// The digest is only used to find byte-identical uploads in a directory, not to
/// prove integrity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes `bytes`. Identical input always yields an identical digest.
    pub fn compute(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(hex::encode(digest))
    }

    /// Validates an externally supplied digest.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidHash`] unless `input` is exactly 64 lowercase
    /// hex characters.
    pub fn parse(input: &str) -> Result<Self, FilesError> {
        let valid = input.len() == 64
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(FilesError::InvalidHash(input.to_owned()));
        }
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = FilesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentHash::parse(s)
    }
}

impl serde::Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ContentHash::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_is_deterministic() {
        let a = ContentHash::compute(b"The Name of the Rose");
        let b = ContentHash::compute(b"The Name of the Rose");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_single_bit_flip_changes_digest() {
        let original = vec![0b0000_0000u8; 32];
        let mut flipped = original.clone();
        flipped[17] ^= 0b0000_0100;

        assert_ne!(ContentHash::compute(&original), ContentHash::compute(&flipped));
    }

    #[test]
    fn test_known_digest_of_empty_input() {
        assert_eq!(
            ContentHash::compute(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_parse_accepts_computed_digest() {
        let computed = ContentHash::compute(b"catalog");
        let parsed = ContentHash::parse(computed.as_str()).unwrap();
        assert_eq!(parsed, computed);
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        let upper = "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855";
        assert!(matches!(
            ContentHash::parse(upper),
            Err(FilesError::InvalidHash(_))
        ));
        assert!(ContentHash::parse("abc123").is_err());
        assert!(ContentHash::parse(&"g".repeat(64)).is_err());
    }
}
