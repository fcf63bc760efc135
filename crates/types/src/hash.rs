//! 32-byte content hash.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 32-byte blake3 hash identifying a block.
///
/// The zero hash is reserved for the parent of genesis blocks.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

/// Error parsing a hash from hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// Input was not 64 hex characters.
    #[error("expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    /// Input contained a non-hex character.
    #[error("invalid hex digit at position {0}")]
    InvalidDigit(usize),
}

impl Hash {
    /// The all-zero hash (parent of genesis blocks).
    pub const ZERO: Self = Hash([0u8; 32]);

    /// Hash arbitrary bytes with blake3.
    pub fn digest(data: &[u8]) -> Self {
        Hash(*blake3::hash(data).as_bytes())
    }

    /// Raw bytes of the hash.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the reserved zero hash.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex chars are plenty for log correlation.
        write!(
            f,
            "Hash({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl FromStr for Hash {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(HexError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hi = hex_value(chunk[0]).ok_or(HexError::InvalidDigit(i * 2))?;
            let lo = hex_value(chunk[1]).ok_or(HexError::InvalidDigit(i * 2 + 1))?;
            bytes[i] = hi << 4 | lo;
        }
        Ok(Hash(bytes))
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = Hash::digest(b"trellis");
        let b = Hash::digest(b"trellis");
        assert_eq!(a, b);
        assert_ne!(a, Hash::digest(b"trellis2"));
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = Hash::digest(b"round trip");
        let parsed: Hash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_hex_rejects_bad_input() {
        assert_eq!("abcd".parse::<Hash>(), Err(HexError::InvalidLength(4)));
        let bad = "zz".repeat(32);
        assert_eq!(bad.parse::<Hash>(), Err(HexError::InvalidDigit(0)));
    }

    #[test]
    fn test_zero_hash() {
        assert!(Hash::ZERO.is_zero());
        assert!(!Hash::digest(b"x").is_zero());
    }
}
